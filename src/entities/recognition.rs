// 🙌 Recognition - one-way credit transfer event
// Immutable once written. Never updated, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::student::Student;

/// Longest accepted recognition message
pub const MAX_MESSAGE_LEN: usize = 500;

/// Hard cap on how many recognitions one listing returns
pub const RECOGNITION_LIST_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recognition {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A recognition with its current endorsement count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionEntry {
    #[serde(flatten)]
    pub recognition: Recognition,
    pub endorsements: i64,
}

/// Outcome of a committed transfer: the record plus both parties as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionReceipt {
    pub recognition: Recognition,
    pub sender: Student,
    pub recipient: Student,
}

/// Optional sender/recipient filter for listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionFilter {
    pub sender_id: Option<i64>,
    pub recipient_id: Option<i64>,
}

impl RecognitionFilter {
    pub fn sent_by(sender_id: i64) -> Self {
        RecognitionFilter {
            sender_id: Some(sender_id),
            recipient_id: None,
        }
    }

    pub fn received_by(recipient_id: i64) -> Self {
        RecognitionFilter {
            sender_id: None,
            recipient_id: Some(recipient_id),
        }
    }
}
