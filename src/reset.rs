// 🔄 Monthly Reset Policy
// Refreshes a student's sending allowance when their stored period is stale.
//
// carry     = clamp(available_credits, 0, carry_forward_cap)
// available = monthly_base_credits + carry
// sent      = 0
//
// Applied lazily by whichever operation first touches the record in a new
// period. Periods only move forward: a snapshot stored in a later period
// than `current` is left as it is. A student idle for several periods still gets ONE step: carry is
// computed from the last stored snapshot only.

use crate::config::LedgerConfig;
use crate::entities::Student;
use crate::period::Period;

/// Refreshed snapshot, or None when the student is already current
pub fn monthly_reset(student: &Student, current: Period, config: &LedgerConfig) -> Option<Student> {
    if student.last_reset_period >= current {
        return None;
    }

    let carry = student.available_credits.clamp(0, config.carry_forward_cap);

    Some(Student {
        available_credits: config.monthly_base_credits + carry,
        monthly_sent: 0,
        last_reset_period: current,
        ..student.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan() -> Period {
        Period::new(2025, 1).unwrap()
    }

    fn feb() -> Period {
        Period::new(2025, 2).unwrap()
    }

    fn student_with(available: i64, sent: i64) -> Student {
        Student {
            id: 1,
            name: "Asha".to_string(),
            available_credits: available,
            monthly_sent: sent,
            last_reset_period: jan(),
            received_balance: 35,
        }
    }

    #[test]
    fn test_same_period_is_noop() {
        let cfg = LedgerConfig::default();
        assert!(monthly_reset(&student_with(10, 90), jan(), &cfg).is_none());
    }

    #[test]
    fn test_carry_forward_is_capped() {
        let cfg = LedgerConfig::default();
        let next = monthly_reset(&student_with(80, 20), feb(), &cfg).unwrap();

        assert_eq!(next.available_credits, 100 + 50);
        assert_eq!(next.monthly_sent, 0);
        assert_eq!(next.last_reset_period, feb());
    }

    #[test]
    fn test_carry_forward_below_cap() {
        let cfg = LedgerConfig::default();
        let next = monthly_reset(&student_with(30, 70), feb(), &cfg).unwrap();
        assert_eq!(next.available_credits, 130);
    }

    #[test]
    fn test_negative_allowance_carries_nothing() {
        let cfg = LedgerConfig::default();
        let next = monthly_reset(&student_with(-5, 0), feb(), &cfg).unwrap();
        assert_eq!(next.available_credits, 100);
    }

    #[test]
    fn test_received_balance_untouched() {
        let cfg = LedgerConfig::default();
        let next = monthly_reset(&student_with(0, 100), feb(), &cfg).unwrap();
        assert_eq!(next.received_balance, 35);
        assert_eq!(next.name, "Asha");
    }

    #[test]
    fn test_multi_period_gap_is_single_step() {
        let cfg = LedgerConfig::default();
        let june = Period::new(2025, 6).unwrap();
        let next = monthly_reset(&student_with(80, 20), june, &cfg).unwrap();

        // one step from the stored snapshot, not five compounded steps
        assert_eq!(next.available_credits, 150);
        assert_eq!(next.last_reset_period, june);
    }

    #[test]
    fn test_custom_policy() {
        let cfg = LedgerConfig {
            monthly_base_credits: 20,
            carry_forward_cap: 5,
            ..LedgerConfig::default()
        };
        let next = monthly_reset(&student_with(12, 0), feb(), &cfg).unwrap();
        assert_eq!(next.available_credits, 25);
    }

    #[test]
    fn test_earlier_period_is_noop() {
        let cfg = LedgerConfig::default();
        let mut s = student_with(0, 100);
        s.last_reset_period = feb();
        assert!(monthly_reset(&s, jan(), &cfg).is_none());
    }
}
