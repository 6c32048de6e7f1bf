// 🏆 Leaderboard Query
// Read-only ranking by total credits received. Runs in a deferred
// transaction, so it sees one committed snapshot and never blocks writers.

use crate::db::{self, LeaderboardEntry};
use crate::error::LedgerResult;
use crate::ledger::Ledger;

pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
pub const MAX_LEADERBOARD_LIMIT: i64 = 100;

/// Clamp a requested page size into [1, 100]
pub fn clamp_limit(limit: i64) -> usize {
    // clamped into 1..=100, so the cast is lossless
    limit.clamp(1, MAX_LEADERBOARD_LIMIT) as usize
}

impl Ledger {
    pub fn leaderboard(&mut self, limit: i64) -> LedgerResult<Vec<LeaderboardEntry>> {
        let limit = clamp_limit(limit);
        self.store.read(|tx| db::leaderboard_rows(tx, limit))
    }
}
