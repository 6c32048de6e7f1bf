// 📒 Ledger - store + policy + clock
// The handle every operation hangs off. Service logic lives in
// `services::*` as `impl Ledger` blocks, one per concern.
//
// One Ledger owns one connection. Concurrent callers open their own
// Ledger on the same database file; isolation is the store's job.

use chrono::{DateTime, SubsecRound, Utc};
use std::path::Path;
use std::sync::Arc;

use crate::config::{AppConfig, DatabaseConfig, LedgerConfig};
use crate::db::{self, Event, Store};
use crate::error::LedgerResult;
use crate::period::{Clock, Period, SystemClock};

pub struct Ledger {
    pub(crate) store: Store,
    pub(crate) config: LedgerConfig,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    /// Open a file-backed ledger
    pub fn open(
        path: impl AsRef<Path>,
        settings: &DatabaseConfig,
        config: LedgerConfig,
    ) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Ledger {
            store: Store::open(path, settings)?,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Open the ledger described by the application config
    pub fn from_app_config(app: &AppConfig) -> LedgerResult<Self> {
        Ledger::open(&app.database.path, &app.database, app.ledger)
    }

    /// Throwaway ledger for tests and experiments
    pub fn open_in_memory(config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Ledger {
            store: Store::open_in_memory()?,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock (tests use a ManualClock to cross month boundaries)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn current_period(&self) -> Period {
        self.clock.current_period()
    }

    /// Current time at the precision the store keeps (microseconds)
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    /// Audit trail for one entity, newest first
    pub fn events_for(&mut self, entity_type: &str, entity_id: i64) -> LedgerResult<Vec<Event>> {
        let entity_id = entity_id.to_string();
        self.store
            .read(|tx| db::get_events_for_entity(tx, entity_type, &entity_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::period::ManualClock;

    #[test]
    fn test_rejects_invalid_policy() {
        let cfg = LedgerConfig {
            redemption_rate: -1,
            ..LedgerConfig::default()
        };
        assert!(matches!(
            Ledger::open_in_memory(cfg),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_clock_drives_period() {
        let jan = Period::new(2025, 1).unwrap();
        let clock = Arc::new(ManualClock::at_period(jan));
        let ledger = Ledger::open_in_memory(LedgerConfig::default())
            .unwrap()
            .with_clock(clock.clone());

        assert_eq!(ledger.current_period(), jan);
        clock.advance_month();
        assert_eq!(ledger.current_period(), jan.next());
    }
}
