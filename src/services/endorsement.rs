// 👍 Endorsement Service
// Compare-and-insert on the (recognition_id, endorser_id) key. No balances move.

use tracing::info;

use crate::db::{self, Event};
use crate::entities::EndorsementReceipt;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;

impl Ledger {
    /// Endorse a recognition once; returns the recognition's new total
    pub fn endorse(
        &mut self,
        recognition_id: i64,
        endorser_id: i64,
    ) -> LedgerResult<EndorsementReceipt> {
        let now = self.now();
        let duplicate = || LedgerError::DuplicateEndorsement {
            recognition_id,
            endorser_id,
        };

        let receipt = self.store.write(|tx| {
            if db::get_recognition(tx, recognition_id)?.is_none() {
                return Err(LedgerError::NotFound(format!(
                    "recognition {}",
                    recognition_id
                )));
            }
            if db::get_student(tx, endorser_id)?.is_none() {
                return Err(LedgerError::NotFound(format!("endorser {}", endorser_id)));
            }
            if db::find_endorsement(tx, recognition_id, endorser_id)?.is_some() {
                return Err(duplicate());
            }

            let endorsement = db::insert_endorsement(tx, recognition_id, endorser_id, now)
                .map_err(|err| {
                    if err.is_constraint_violation() {
                        duplicate()
                    } else {
                        err
                    }
                })?;

            db::insert_event(
                tx,
                &Event::new(
                    "endorsement_created",
                    "recognition",
                    recognition_id,
                    serde_json::json!({
                        "endorsement_id": endorsement.id,
                        "endorser_id": endorser_id,
                    }),
                    "endorsement",
                ),
            )?;

            let total_endorsements = db::count_endorsements(tx, recognition_id)?;
            Ok(EndorsementReceipt {
                endorsement,
                total_endorsements,
            })
        })?;

        info!(
            recognition_id,
            endorser_id,
            total = receipt.total_endorsements,
            "endorsement committed"
        );
        Ok(receipt)
    }
}
