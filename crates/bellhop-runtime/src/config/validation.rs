//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{AdapterConfig, BellhopConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &BellhopConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    for (name, adapter) in &config.adapters {
        validate_adapter_config(name, adapter)?;
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.file_name().is_none() {
        return Err(ConfigError::validation(format!(
            "Log file path {} does not name a file",
            logging.file_path.display()
        )));
    }

    if let Some(target) = logging.filters.keys().find(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter target must not be empty (got {target:?})"
        )));
    }

    Ok(())
}

/// Validates the settings of adapter `name`.
pub fn validate_adapter_config(name: &str, adapter: &AdapterConfig) -> ConfigResult<()> {
    if adapter.max_concurrent == 0 {
        return Err(ConfigError::validation(format!(
            "adapters.{name}.max_concurrent must be greater than 0"
        )));
    }

    if adapter.queue_size == 0 {
        return Err(ConfigError::validation(format!(
            "adapters.{name}.queue_size must be greater than 0"
        )));
    }

    if adapter.idle_interval_ms == 0 {
        return Err(ConfigError::validation(format!(
            "adapters.{name}.idle_interval_ms must be greater than 0"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&BellhopConfig::default()).is_ok());
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut config = BellhopConfig::default();
        config.adapters.insert(
            "console".into(),
            AdapterConfig {
                queue_size: 0,
                ..AdapterConfig::default()
            },
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("adapters.console.queue_size"));

        let zero_workers = AdapterConfig {
            max_concurrent: 0,
            ..AdapterConfig::default()
        };
        assert!(validate_adapter_config("x", &zero_workers).is_err());
    }

    #[test]
    fn rejects_bad_logging() {
        let mut config = BellhopConfig::default();
        config.logging.output = LogOutput::File;
        config.logging.file_path = PathBuf::from("/");
        assert!(validate_config(&config).is_err());

        let mut config = BellhopConfig::default();
        config.logging.filters.insert(" ".into(), LogLevel::Debug);
        assert!(validate_config(&config).is_err());
    }
}
