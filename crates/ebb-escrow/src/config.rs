//! Ledger initialization configuration.

use ebb_core::constants::{MAXTIME, MIN_LOCK_FLOOR};
use ebb_core::error::ConfigError;
use ebb_core::types::Address;
use serde::{Deserialize, Serialize};

/// Configuration supplied once at ledger construction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EscrowConfig {
    /// Account allowed to manage the whitelist and trigger global unlock.
    /// Also the initial controller.
    pub admin: Address,
    /// Reference to the underlying locked asset.
    pub asset: Address,
    /// Shortest allowed lock duration in seconds.
    #[serde(default = "default_min_lock")]
    pub min_lock_duration: u64,
}

fn default_min_lock() -> u64 {
    MIN_LOCK_FLOOR
}

impl EscrowConfig {
    /// Configuration with the minimum lock duration at its floor.
    pub fn new(admin: Address, asset: Address) -> Self {
        Self { admin, asset, min_lock_duration: MIN_LOCK_FLOOR }
    }

    /// Override the minimum lock duration.
    pub fn with_min_lock_duration(mut self, secs: u64) -> Self {
        self.min_lock_duration = secs;
        self
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroAsset`] / [`ConfigError::ZeroAdmin`] for zero addresses
    /// - [`ConfigError::MinLockTooShort`] below the two-week floor
    /// - [`ConfigError::MinLockTooLong`] above the maximum lock duration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.asset.is_zero() {
            return Err(ConfigError::ZeroAsset);
        }
        if self.admin.is_zero() {
            return Err(ConfigError::ZeroAdmin);
        }
        if self.min_lock_duration < MIN_LOCK_FLOOR {
            return Err(ConfigError::MinLockTooShort {
                got: self.min_lock_duration,
                floor: MIN_LOCK_FLOOR,
            });
        }
        if self.min_lock_duration > MAXTIME {
            return Err(ConfigError::MinLockTooLong {
                got: self.min_lock_duration,
                max: MAXTIME,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::constants::WEEK;

    fn config() -> EscrowConfig {
        EscrowConfig::new(Address::from_seed(1), Address::from_seed(2))
    }

    #[test]
    fn default_min_lock_is_floor() {
        assert_eq!(config().min_lock_duration, MIN_LOCK_FLOOR);
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_zero_asset() {
        let cfg = EscrowConfig { asset: Address::ZERO, ..config() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAsset));
    }

    #[test]
    fn rejects_zero_admin() {
        let cfg = EscrowConfig { admin: Address::ZERO, ..config() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAdmin));
    }

    #[test]
    fn rejects_short_min_lock() {
        let cfg = config().with_min_lock_duration(WEEK);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::MinLockTooShort { got: WEEK, floor: MIN_LOCK_FLOOR })
        );
    }

    #[test]
    fn rejects_min_lock_above_max() {
        let cfg = config().with_min_lock_duration(MAXTIME + 1);
        assert!(matches!(cfg.validate(), Err(ConfigError::MinLockTooLong { .. })));
    }

    #[test]
    fn accepts_longer_min_lock() {
        assert!(config().with_min_lock_duration(4 * WEEK).validate().is_ok());
    }

    #[test]
    fn deserialize_fills_default_min_lock() {
        let json = format!(
            r#"{{"admin":"{}","asset":"{}"}}"#,
            Address::from_seed(1),
            Address::from_seed(2)
        );
        let cfg: EscrowConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, config());
    }
}
