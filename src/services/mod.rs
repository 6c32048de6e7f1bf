// Ledger Services
// Each service is one `impl Ledger` block. Every mutating operation follows
// the same shape inside a single store transaction:
//
//   load students -> explicit monthly reset -> validate -> pure transition
//   -> write students -> append record + audit event -> commit

pub mod students;
pub mod recognition;
pub mod endorsement;
pub mod redemption;
pub mod leaderboard;
pub mod admin;

pub use admin::ResetSummary;
pub use leaderboard::{clamp_limit, DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT};
pub use recognition::plan_transfer;
pub use redemption::plan_redemption;

use rusqlite::Connection;
use tracing::debug;

use crate::config::LedgerConfig;
use crate::db::{self, Event};
use crate::entities::Student;
use crate::error::{LedgerError, LedgerResult};
use crate::period::Period;
use crate::reset;

/// Load a student and bring their allowance into `period`, persisting the
/// reset (and its audit event) when one was due
pub(crate) fn load_current_student(
    conn: &Connection,
    id: i64,
    period: Period,
    config: &LedgerConfig,
    actor: &str,
) -> LedgerResult<Student> {
    let stored =
        db::get_student(conn, id)?.ok_or_else(|| LedgerError::NotFound(format!("student {}", id)))?;

    match reset::monthly_reset(&stored, period, config) {
        Some(next) => {
            persist_reset(conn, &stored, &next, config, actor)?;
            Ok(next)
        }
        None => Ok(stored),
    }
}

/// Write a reset snapshot and record it in the audit trail
pub(crate) fn persist_reset(
    conn: &Connection,
    before: &Student,
    after: &Student,
    config: &LedgerConfig,
    actor: &str,
) -> LedgerResult<()> {
    db::update_student(conn, after)?;
    db::insert_event(
        conn,
        &Event::new(
            "monthly_reset",
            "student",
            after.id,
            serde_json::json!({
                "from_period": before.last_reset_period,
                "to_period": after.last_reset_period,
                "carried_credits": before.available_credits.clamp(0, config.carry_forward_cap),
                "available_credits": after.available_credits,
            }),
            actor,
        ),
    )?;

    debug!(
        student_id = after.id,
        from = %before.last_reset_period,
        to = %after.last_reset_period,
        available_credits = after.available_credits,
        "monthly reset applied"
    );
    Ok(())
}
