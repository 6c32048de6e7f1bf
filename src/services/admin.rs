// 🛠️ Admin bulk reset
// Applies the monthly reset to every stale student in one transaction.
// Idempotent within a period: students already current are skipped.
// Periods only move forward: a target before the clock's month is refused,
// and a student stored in a later period than the target is left alone.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::persist_reset;
use crate::db;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::period::Period;
use crate::reset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub period: Period,
    pub processed_count: usize,
    pub updated_ids: Vec<i64>,
}

impl Ledger {
    pub fn admin_reset_all(&mut self, period: Period) -> LedgerResult<ResetSummary> {
        let config = self.config;
        let current = self.current_period();
        if period < current {
            return Err(LedgerError::Validation(format!(
                "cannot reset to {}, ledger is already in {}",
                period, current
            )));
        }

        let summary = self.store.write(|tx| {
            let students = db::all_students(tx)?;
            let mut updated_ids = Vec::new();

            for student in &students {
                if let Some(next) = reset::monthly_reset(student, period, &config) {
                    persist_reset(tx, student, &next, &config, "admin")?;
                    updated_ids.push(student.id);
                }
            }

            Ok(ResetSummary {
                period,
                processed_count: students.len(),
                updated_ids,
            })
        })?;

        info!(
            period = %summary.period,
            processed = summary.processed_count,
            updated = summary.updated_ids.len(),
            "bulk monthly reset finished"
        );
        Ok(summary)
    }

    /// Bulk reset into the ledger clock's current period
    pub fn reset_current_month(&mut self) -> LedgerResult<ResetSummary> {
        let period = self.current_period();
        self.admin_reset_all(period)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::error::LedgerError;
    use crate::ledger::Ledger;
    use crate::period::{ManualClock, Period};
    use std::sync::Arc;

    #[test]
    fn test_reset_all_is_idempotent() {
        let jan = Period::new(2025, 1).unwrap();
        let clock = Arc::new(ManualClock::at_period(jan));
        let mut ledger = Ledger::open_in_memory(LedgerConfig::default())
            .unwrap()
            .with_clock(clock.clone());

        let a = ledger.create_student("A").unwrap();
        let b = ledger.create_student("B").unwrap();
        ledger.recognize(a.id, b.id, 20, None).unwrap();

        // same period: nothing to do
        let summary = ledger.admin_reset_all(jan).unwrap();
        assert_eq!(summary.processed_count, 2);
        assert!(summary.updated_ids.is_empty());

        let feb = jan.next();
        let first = ledger.admin_reset_all(feb).unwrap();
        assert_eq!(first.processed_count, 2);
        assert_eq!(first.updated_ids, vec![a.id, b.id]);

        let second = ledger.admin_reset_all(feb).unwrap();
        assert_eq!(second.processed_count, 2);
        assert_eq!(second.updated_ids, Vec::<i64>::new());

        let students = ledger.list_students().unwrap();
        // A: 80 left -> 100 + 50; B: 100 left -> 100 + 50
        assert!(students.iter().all(|s| s.available_credits == 150));
        assert!(students.iter().all(|s| s.monthly_sent == 0));
        assert!(students.iter().all(|s| s.last_reset_period == feb));
        assert_eq!(students[1].received_balance, 20);
    }

    #[test]
    fn test_reset_current_month_uses_clock() {
        let jan = Period::new(2025, 1).unwrap();
        let clock = Arc::new(ManualClock::at_period(jan));
        let mut ledger = Ledger::open_in_memory(LedgerConfig::default())
            .unwrap()
            .with_clock(clock.clone());
        ledger.create_student("A").unwrap();

        clock.advance_month();
        let summary = ledger.reset_current_month().unwrap();
        assert_eq!(summary.period, jan.next());
        assert_eq!(summary.updated_ids.len(), 1);
    }

    #[test]
    fn test_reset_all_on_empty_ledger() {
        let mut ledger = Ledger::open_in_memory(LedgerConfig::default()).unwrap();
        let summary = ledger.admin_reset_all(Period::new(2030, 6).unwrap()).unwrap();
        assert_eq!(summary.processed_count, 0);
        assert!(summary.updated_ids.is_empty());
    }

    #[test]
    fn test_reset_to_past_period_is_refused() {
        let jan = Period::new(2025, 1).unwrap();
        let clock = Arc::new(ManualClock::at_period(jan));
        let mut ledger = Ledger::open_in_memory(LedgerConfig::default())
            .unwrap()
            .with_clock(clock.clone());

        let a = ledger.create_student("A").unwrap();
        let b = ledger.create_student("B").unwrap();
        clock.advance_month();
        ledger.recognize(a.id, b.id, 100, None).unwrap();

        assert!(matches!(
            ledger.admin_reset_all(jan),
            Err(LedgerError::Validation(_))
        ));

        // the spent quota stays spent for the rest of February
        assert!(matches!(
            ledger.recognize(a.id, b.id, 1, None),
            Err(LedgerError::LimitExceeded { remaining: 0, requested: 1 })
        ));
        let sender = ledger.get_student(a.id).unwrap();
        assert_eq!(sender.monthly_sent, 100);
        assert_eq!(sender.last_reset_period, jan.next());
    }

    #[test]
    fn test_reset_never_moves_a_student_backwards() {
        let jan = Period::new(2025, 1).unwrap();
        let clock = Arc::new(ManualClock::at_period(jan));
        let mut ledger = Ledger::open_in_memory(LedgerConfig::default())
            .unwrap()
            .with_clock(clock.clone());

        let a = ledger.create_student("A").unwrap();
        let b = ledger.create_student("B").unwrap();

        // A bulk reset into March runs ahead of the clock
        let march = jan.next().next();
        assert_eq!(ledger.admin_reset_all(march).unwrap().updated_ids.len(), 2);

        clock.advance_month();
        let summary = ledger.reset_current_month().unwrap();
        assert_eq!(summary.processed_count, 2);
        assert!(summary.updated_ids.is_empty());

        // lazy touches in February leave March alone too
        assert_eq!(ledger.get_student(a.id).unwrap().last_reset_period, march);
        assert_eq!(ledger.get_student(b.id).unwrap().last_reset_period, march);
    }
}
