// 🎓 Student Entity - allowance pool + received pool
//
// Two pools that never mix:
// - available_credits: what the student may still SEND this period
// - received_balance:  what others have sent them, redeemable for vouchers
//
// Every mutation is a value-returning function over a snapshot. The store
// commits the returned value; nothing here touches persistence.

use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::period::Period;

/// Longest accepted student name
pub const MAX_NAME_LEN: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    pub id: i64,

    /// Unique, case-sensitive
    pub name: String,

    // ========================================================================
    // SENDING SIDE (resets monthly)
    // ========================================================================
    pub available_credits: i64,
    pub monthly_sent: i64,
    pub last_reset_period: Period,

    // ========================================================================
    // RECEIVING SIDE (period-independent)
    // ========================================================================
    pub received_balance: i64,
}

impl Student {
    /// Snapshot of a freshly registered student (id assigned by the store)
    pub fn registered(id: i64, name: String, period: Period, config: &LedgerConfig) -> Self {
        Student {
            id,
            name,
            available_credits: config.monthly_base_credits,
            monthly_sent: 0,
            last_reset_period: period,
            received_balance: 0,
        }
    }

    /// Quota left before the monthly sending limit, never negative
    pub fn remaining_monthly_limit(&self, config: &LedgerConfig) -> i64 {
        (config.monthly_sending_limit - self.monthly_sent).max(0)
    }

    /// Voucher value if the whole received balance were redeemed now
    pub fn redeemable_value(&self, config: &LedgerConfig) -> i64 {
        self.received_balance.saturating_mul(config.redemption_rate)
    }

    /// Sender side of a transfer
    pub fn after_sending(&self, amount: i64) -> Student {
        Student {
            available_credits: self.available_credits - amount,
            monthly_sent: self.monthly_sent + amount,
            ..self.clone()
        }
    }

    /// Recipient side of a transfer
    pub fn after_receiving(&self, amount: i64) -> Student {
        Student {
            received_balance: self.received_balance + amount,
            ..self.clone()
        }
    }

    pub fn after_redeeming(&self, amount: i64) -> Student {
        Student {
            received_balance: self.received_balance - amount,
            ..self.clone()
        }
    }

    /// All balance invariants hold for this snapshot
    pub fn is_consistent(&self, config: &LedgerConfig) -> bool {
        self.available_credits >= 0
            && self.monthly_sent >= 0
            && self.monthly_sent <= config.monthly_sending_limit
            && self.received_balance >= 0
    }
}

/// Validate a registration name: non-empty, bounded length
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name is required".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("name must be at most {} characters", MAX_NAME_LEN));
    }
    Ok(())
}
