use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Deployment-wide defaults loaded from `EngineConfig.toml`, independent
/// of any single swap's `SwapConfig`. Missing fields fall back to the
/// defaults below; a missing file falls back entirely, with a warning.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bitcoin_mainnet_endpoint: String,
    pub bitcoin_testnet_endpoint: String,
    pub bitshares_mainnet_endpoint: String,
    pub bitshares_testnet_endpoint: String,
    pub confirmation_horizon: u32,
    pub check_api_interval_secs: u64,
    pub bts_wait_timeout_secs: u64,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bitcoin_mainnet_endpoint: "https://blockstream.info/api".into(),
            bitcoin_testnet_endpoint: "https://blockstream.info/testnet/api".into(),
            bitshares_mainnet_endpoint: "wss://api.dex.trading/".into(),
            bitshares_testnet_endpoint: "wss://testnet.dex.trading/".into(),
            confirmation_horizon: 6,
            check_api_interval_secs: 4,
            bts_wait_timeout_secs: 1800,
            log_level: "info".into(),
        }
    }
}

impl EngineConfig {
    pub fn check_api_interval(&self) -> Duration {
        Duration::from_secs(self.check_api_interval_secs)
    }

    pub fn bts_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.bts_wait_timeout_secs)
    }

    /// Reads `path` if present; returns the documented defaults,
    /// logging a warning, if it's missing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "engine config not found, using built-in defaults");
            return Self::default();
        }
        match std::fs::read_to_string(path).and_then(|contents| {
            toml::from_str(&contents).map_err(|e| std::io::Error::other(e.to_string()))
        }) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse engine config, using built-in defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = EngineConfig::load_or_default("/nonexistent/EngineConfig.toml");
        assert_eq!(config.confirmation_horizon, 6);
        assert_eq!(config.check_api_interval_secs, 4);
        assert_eq!(config.bts_wait_timeout_secs, 1800);
    }
}
