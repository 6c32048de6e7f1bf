// ⚙️ Configuration
// Ledger policy constants plus runtime settings for the binaries.
//
// Policy is an explicit immutable value handed to the Ledger at
// construction, so tests can vary it without touching globals.

use crate::error::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// LEDGER POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Fresh allowance granted at the start of every period
    #[serde(default = "default_monthly_base_credits")]
    pub monthly_base_credits: i64,

    /// Maximum a student may send within one period
    #[serde(default = "default_monthly_sending_limit")]
    pub monthly_sending_limit: i64,

    /// Upper bound on unused allowance carried into the next period
    #[serde(default = "default_carry_forward_cap")]
    pub carry_forward_cap: i64,

    /// Voucher value per redeemed credit
    #[serde(default = "default_redemption_rate")]
    pub redemption_rate: i64,
}

fn default_monthly_base_credits() -> i64 {
    100
}

fn default_monthly_sending_limit() -> i64 {
    100
}

fn default_carry_forward_cap() -> i64 {
    50
}

fn default_redemption_rate() -> i64 {
    5
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            monthly_base_credits: default_monthly_base_credits(),
            monthly_sending_limit: default_monthly_sending_limit(),
            carry_forward_cap: default_carry_forward_cap(),
            redemption_rate: default_redemption_rate(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.monthly_base_credits < 0 {
            return Err(LedgerError::Validation(
                "monthly_base_credits must be >= 0".to_string(),
            ));
        }
        if self.monthly_sending_limit < 0 {
            return Err(LedgerError::Validation(
                "monthly_sending_limit must be >= 0".to_string(),
            ));
        }
        if self.carry_forward_cap < 0 {
            return Err(LedgerError::Validation(
                "carry_forward_cap must be >= 0".to_string(),
            ));
        }
        if self.redemption_rate <= 0 {
            return Err(LedgerError::Validation(
                "redemption_rate must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// RUNTIME SETTINGS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,

    /// How long one connection waits on a held lock before reporting busy
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Whole-operation retries after lock contention before giving up
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_db_path() -> String {
    "recognition_ledger.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    250
}

fn default_max_conflict_retries() -> u32 {
    3
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Load from `config/default`, `config/{RUN_MODE}`, then `LEDGER__*` env vars
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("LEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_published_constants() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.monthly_base_credits, 100);
        assert_eq!(cfg.monthly_sending_limit, 100);
        assert_eq!(cfg.carry_forward_cap, 50);
        assert_eq!(cfg.redemption_rate, 5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        let cfg = LedgerConfig {
            redemption_rate: 0,
            ..LedgerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(LedgerError::Validation(_))));

        let cfg = LedgerConfig {
            carry_forward_cap: -1,
            ..LedgerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_partial_ledger_section_uses_defaults() {
        let cfg: LedgerConfig =
            serde_json::from_value(serde_json::json!({ "redemption_rate": 10 })).unwrap();
        assert_eq!(cfg.redemption_rate, 10);
        assert_eq!(cfg.monthly_base_credits, 100);
    }

    #[test]
    fn test_app_config_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.database.path, "recognition_ledger.db");
        assert_eq!(cfg.database.max_conflict_retries, 3);
        assert_eq!(cfg.server.port, 5000);
    }
}
