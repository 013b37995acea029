//! Configuration for the tontine tool

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tontine_runtime::EngineConfig;

/// Main tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Engine tunables
    #[serde(default)]
    pub engine: EngineConfig,

    /// Snapshot file operated on
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Currency code shown next to amounts
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            snapshot_path: default_snapshot_path(),
            currency: default_currency(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("tontine-snapshot.json")
}

fn default_currency() -> String {
    "XAF".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CliConfig {
    /// Layer defaults, an optional TOML file and `TONTINE__*` variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CliConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Keys contain underscores, so nesting uses a double separator:
        // TONTINE__ENGINE__ALLOW_ZERO_REFUSAL=false
        builder = builder.add_source(
            config::Environment::with_prefix("TONTINE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.engine
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid engine configuration: {}", e))?;
        if self.currency.trim().is_empty() {
            anyhow::bail!("currency must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.snapshot_path, PathBuf::from("tontine-snapshot.json"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.currency, "XAF");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file() {
        let config = CliConfig::load(None).unwrap();
        assert_eq!(config.engine.max_redistribution_beneficiaries, 50);
        assert_eq!(config.snapshot_path, PathBuf::from("tontine-snapshot.json"));
        assert_eq!(config.currency, "XAF");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_from_toml() {
        let dir = std::env::temp_dir().join(format!("tontine-cli-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tontine.toml");
        std::fs::write(
            &path,
            "snapshot_path = \"/var/lib/tontine/state.json\"\ncurrency = \"XOF\"\n\n[engine]\nallow_zero_refusal = false\n",
        )
        .unwrap();

        let config = CliConfig::load(path.to_str()).unwrap();
        assert_eq!(config.currency, "XOF");
        assert!(!config.engine.allow_zero_refusal);
        assert_eq!(
            config.snapshot_path,
            PathBuf::from("/var/lib/tontine/state.json")
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_currency_rejected() {
        let config = CliConfig {
            currency: "  ".to_string(),
            ..CliConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
