// 🙌 Recognition Service - credit transfer sender -> recipient
//
// Checked in order, each a distinct failure:
//   1. amount > 0                                  Validation
//   2. sender != recipient                         Validation
//   3. both students exist                         NotFound
//   4. sender.available_credits >= amount          InsufficientCredits
//   5. amount <= limit - sender.monthly_sent       LimitExceeded
// Checks 4 and 5 run against the post-reset snapshots.

use tracing::info;

use super::load_current_student;
use crate::config::LedgerConfig;
use crate::db::{self, Event};
use crate::entities::{
    RecognitionEntry, RecognitionFilter, RecognitionReceipt, Student, MAX_MESSAGE_LEN,
    RECOGNITION_LIST_LIMIT,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;

/// Pure transfer rule: the new (sender, recipient) snapshots, or why not
///
/// Allowance moves into `monthly_sent` on the sender and lands in the
/// recipient's received pool; nothing flows back to the sender.
pub fn plan_transfer(
    sender: &Student,
    recipient: &Student,
    amount: i64,
    config: &LedgerConfig,
) -> LedgerResult<(Student, Student)> {
    if sender.available_credits < amount {
        return Err(LedgerError::InsufficientCredits {
            available: sender.available_credits,
            requested: amount,
        });
    }

    let remaining = config.monthly_sending_limit - sender.monthly_sent;
    if amount > remaining {
        return Err(LedgerError::LimitExceeded {
            remaining: remaining.max(0),
            requested: amount,
        });
    }

    Ok((sender.after_sending(amount), recipient.after_receiving(amount)))
}

fn validate_request(
    sender_id: i64,
    recipient_id: i64,
    amount: i64,
    message: Option<&str>,
) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::Validation("amount must be > 0".to_string()));
    }
    if sender_id == recipient_id {
        return Err(LedgerError::Validation(
            "self-recognition is not allowed".to_string(),
        ));
    }
    if let Some(msg) = message {
        if msg.chars().count() > MAX_MESSAGE_LEN {
            return Err(LedgerError::Validation(format!(
                "message must be at most {} characters",
                MAX_MESSAGE_LEN
            )));
        }
    }
    Ok(())
}

impl Ledger {
    /// Transfer `amount` credits of allowance from sender to recipient
    pub fn recognize(
        &mut self,
        sender_id: i64,
        recipient_id: i64,
        amount: i64,
        message: Option<&str>,
    ) -> LedgerResult<RecognitionReceipt> {
        validate_request(sender_id, recipient_id, amount, message)?;

        let config = self.config;
        let period = self.current_period();
        let now = self.now();

        let receipt = self.store.write(|tx| {
            // existence first, so a missing party is NotFound before any reset is written
            let sender_exists = db::get_student(tx, sender_id)?.is_some();
            let recipient_exists = db::get_student(tx, recipient_id)?.is_some();
            if !sender_exists || !recipient_exists {
                return Err(LedgerError::NotFound(
                    "sender or recipient not found".to_string(),
                ));
            }

            let sender = load_current_student(tx, sender_id, period, &config, "recognition")?;
            let recipient = load_current_student(tx, recipient_id, period, &config, "recognition")?;

            let (sender, recipient) = plan_transfer(&sender, &recipient, amount, &config)?;

            db::update_student(tx, &sender)?;
            db::update_student(tx, &recipient)?;
            let recognition =
                db::insert_recognition(tx, sender_id, recipient_id, amount, message, now)?;

            db::insert_event(
                tx,
                &Event::new(
                    "recognition_created",
                    "recognition",
                    recognition.id,
                    serde_json::json!({
                        "sender_id": sender_id,
                        "recipient_id": recipient_id,
                        "amount": amount,
                    }),
                    "recognition",
                ),
            )?;

            Ok(RecognitionReceipt {
                recognition,
                sender,
                recipient,
            })
        })?;

        info!(
            recognition_id = receipt.recognition.id,
            sender_id,
            recipient_id,
            amount,
            "recognition committed"
        );
        Ok(receipt)
    }

    /// Newest first, at most 200, optionally filtered by sender/recipient
    pub fn list_recognitions(
        &mut self,
        filter: RecognitionFilter,
    ) -> LedgerResult<Vec<RecognitionEntry>> {
        self.store
            .read(|tx| db::list_recognitions(tx, &filter, RECOGNITION_LIST_LIMIT))
    }

    pub fn get_recognition(&mut self, id: i64) -> LedgerResult<RecognitionEntry> {
        self.store.read(|tx| {
            let recognition = db::get_recognition(tx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("recognition {}", id)))?;
            let endorsements = db::count_endorsements(tx, id)?;
            Ok(RecognitionEntry {
                recognition,
                endorsements,
            })
        })
    }
}
