use meter_core::{MeterError, ProviderKind, Result};
use serde::{Deserialize, Serialize};

/// Root configuration structure parsed from `cpumeter.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Sampling interval in milliseconds.
    pub interval_ms: u64,
    /// CPU-usage backend to bind to.
    pub provider: ProviderKind,
    /// Stop automatically after this many milliseconds (`None` = until Ctrl-C).
    pub duration_ms: Option<u64>,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// How the final summary is printed.
    pub output: OutputFormat,
}

impl MeterConfig {
    pub const DEFAULT_INTERVAL_MS: u64 = 1000;

    /// Reject values the sampling session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(MeterError::Config("interval_ms must be greater than zero".into()));
        }
        if self.duration_ms == Some(0) {
            return Err(MeterError::Config("duration_ms must be greater than zero".into()));
        }
        Ok(())
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::DEFAULT_INTERVAL_MS,
            provider: ProviderKind::Auto,
            duration_ms: None,
            log_level: "info".to_string(),
            output: OutputFormat::Text,
        }
    }
}

/// Summary output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: MeterConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, MeterConfig::default());
        assert_eq!(cfg.interval_ms, 1000);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let cfg: MeterConfig = toml::from_str(
            r#"
            interval_ms = 250
            provider = "proc-stat"
            output = "json"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.interval_ms, 250);
        assert_eq!(cfg.provider, ProviderKind::ProcStat);
        assert_eq!(cfg.output, OutputFormat::Json);
        assert_eq!(cfg.duration_ms, None);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cfg = MeterConfig {
            interval_ms: 0,
            ..MeterConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(MeterError::Config(_))));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let cfg = MeterConfig {
            duration_ms: Some(0),
            ..MeterConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(MeterConfig::default().validate().is_ok());
    }
}
