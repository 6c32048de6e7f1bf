// 🎟️ Redemption Service
// Received balance -> voucher value. Period-independent: the monthly reset
// only concerns the sending allowance, so it is NOT applied here.

use tracing::info;

use crate::config::LedgerConfig;
use crate::db::{self, Event};
use crate::entities::{Redemption, Student};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;

/// Pure redemption rule: the new student snapshot and the voucher value
pub fn plan_redemption(
    student: &Student,
    amount: i64,
    config: &LedgerConfig,
) -> LedgerResult<(Student, i64)> {
    if student.received_balance < amount {
        return Err(LedgerError::InsufficientBalance {
            balance: student.received_balance,
            requested: amount,
        });
    }

    let voucher_value = amount.checked_mul(config.redemption_rate).ok_or_else(|| {
        LedgerError::Validation("voucher value out of range".to_string())
    })?;

    Ok((student.after_redeeming(amount), voucher_value))
}

impl Ledger {
    pub fn redeem(&mut self, student_id: i64, amount: i64) -> LedgerResult<Redemption> {
        if amount <= 0 {
            return Err(LedgerError::Validation("amount must be > 0".to_string()));
        }

        let config = self.config;
        let now = self.now();

        let redemption = self.store.write(|tx| {
            let student = db::get_student(tx, student_id)?
                .ok_or_else(|| LedgerError::NotFound(format!("student {}", student_id)))?;

            let (student, voucher_value) = plan_redemption(&student, amount, &config)?;

            db::update_student(tx, &student)?;
            let redemption = db::insert_redemption(tx, student_id, amount, voucher_value, now)?;

            db::insert_event(
                tx,
                &Event::new(
                    "redemption_created",
                    "student",
                    student_id,
                    serde_json::json!({
                        "redemption_id": redemption.id,
                        "amount": amount,
                        "voucher_value": voucher_value,
                        "received_balance": student.received_balance,
                    }),
                    "redemption",
                ),
            )?;

            Ok(redemption)
        })?;

        info!(
            student_id,
            amount,
            voucher_value = redemption.voucher_value,
            "redemption committed"
        );
        Ok(redemption)
    }

    /// Past redemptions for one student, newest first
    pub fn redemptions_for(&mut self, student_id: i64) -> LedgerResult<Vec<Redemption>> {
        self.store.read(|tx| db::redemptions_for(tx, student_id))
    }
}
