// Entity Models
// Students are the only mutable records. Recognitions, endorsements and
// redemptions are append-only facts that reference students by id.

pub mod student;
pub mod recognition;
pub mod endorsement;
pub mod redemption;

pub use student::{Student, validate_name, MAX_NAME_LEN};
pub use recognition::{
    Recognition, RecognitionEntry, RecognitionFilter, RecognitionReceipt,
    MAX_MESSAGE_LEN, RECOGNITION_LIST_LIMIT,
};
pub use endorsement::{Endorsement, EndorsementReceipt};
pub use redemption::Redemption;
