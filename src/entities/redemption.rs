// 🎟️ Redemption - received credits converted into voucher value

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: i64,
    pub student_id: i64,
    pub amount: i64,
    /// amount × redemption rate, fixed at redemption time
    pub voucher_value: i64,
    pub created_at: DateTime<Utc>,
}
