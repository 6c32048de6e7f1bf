// Recognition Ledger - Core Library
// Peer-recognition credits: monthly sending allowance with capped
// carry-forward, redeemable received balance, endorsements, leaderboard.
// Exposes all modules for use in the CLI, the API server, and tests.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod ledger;
pub mod period;
pub mod reset;
pub mod roster;
pub mod services;

// Re-export commonly used types
pub use config::{AppConfig, DatabaseConfig, LedgerConfig, ServerConfig};
pub use db::{Event, LeaderboardEntry, Store, setup_database};
pub use entities::{
    Endorsement, EndorsementReceipt, Recognition, RecognitionEntry, RecognitionFilter,
    RecognitionReceipt, Redemption, Student,
};
pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use period::{Clock, ManualClock, Period, SystemClock};
pub use reset::monthly_reset;
pub use roster::{import_roster, RosterImport};
pub use services::{
    clamp_limit, plan_redemption, plan_transfer, ResetSummary, DEFAULT_LEADERBOARD_LIMIT,
    MAX_LEADERBOARD_LIMIT,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
