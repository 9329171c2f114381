pub mod schema;
pub mod watcher;

pub use schema::{MeterConfig, OutputFormat};
pub use watcher::ConfigWatcher;

use meter_core::{MeterError, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file.  Returns `MeterConfig::default()` if
/// the file doesn't exist so the meter always has sensible defaults.
pub fn load(path: impl AsRef<Path>) -> Result<MeterConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "Config file not found at '{}'; using defaults.",
            path.display()
        );
        return Ok(MeterConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| MeterError::Config(format!("cannot read '{}': {e}", path.display())))?;

    let config: MeterConfig =
        toml::from_str(&raw).map_err(|e| MeterError::Config(format!("TOML parse error: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Return the default config path, honouring `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("cpumeter").join("cpumeter.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, MeterConfig::default());
    }

    #[test]
    fn loads_values_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interval_ms = 500\nduration_ms = 3000").unwrap();
        let cfg = load(file.path()).unwrap();
        assert_eq!(cfg.interval_ms, 500);
        assert_eq!(cfg.duration_ms, Some(3000));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interval_ms = \"fast\"").unwrap();
        assert!(matches!(load(file.path()), Err(MeterError::Config(_))));
    }

    #[test]
    fn invalid_values_are_rejected_on_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interval_ms = 0").unwrap();
        assert!(matches!(load(file.path()), Err(MeterError::Config(_))));
    }

    #[test]
    fn default_path_ends_with_app_file() {
        assert!(default_path().ends_with("cpumeter/cpumeter.toml"));
    }
}
