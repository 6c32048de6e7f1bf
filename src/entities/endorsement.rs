// 👍 Endorsement - social signal on a recognition
// No balance effect. At most one per (recognition, endorser).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    pub id: i64,
    pub recognition_id: i64,
    pub endorser_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementReceipt {
    pub endorsement: Endorsement,
    /// Endorsements on the recognition after this one was committed
    pub total_endorsements: i64,
}
