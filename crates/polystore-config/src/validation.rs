//! Configuration validation
//!
//! Validates configuration values and ensures consistency. An unknown
//! backend name is fatal at startup; everything else that can be defaulted
//! is defaulted at deserialization time instead.

use crate::{Config, ObservabilityConfig, StoreConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid backend: {0} (must be one of: memory, postgres, sqlserver, mongodb)")]
    InvalidBackend(String),

    #[error("Missing database name for backend: {0}")]
    MissingDatabase(String),

    #[error("Missing credentials for backend: {0}")]
    MissingCredentials(String),

    #[error("Invalid retry attempts: {0} (must be > 0)")]
    InvalidRetryAttempts(u32),

    #[error("Invalid log level: {0} (must be one of: trace, debug, info, warn, error)")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0} (must be 'text' or 'json')")]
    InvalidLogFormat(String),

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate complete configuration
pub fn validate(config: &Config) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_store(&config.store) {
        errors.push(e);
    }
    if let Err(e) = validate_observability(&config.observability) {
        errors.push(e);
    }

    if errors.is_empty() {
        Ok(())
    } else if errors.len() == 1 {
        Err(errors.into_iter().next().expect("len checked"))
    } else {
        Err(ValidationError::Multiple(errors))
    }
}

/// Validate store configuration
pub fn validate_store(config: &StoreConfig) -> ValidationResult<()> {
    let backend = config
        .backend()
        .map_err(|_| ValidationError::InvalidBackend(config.backend.clone()))?;

    if backend == polystore_types::Backend::Memory {
        return Ok(());
    }
    // A full connection string carries its own credentials and database
    if config.connection_string.is_some() {
        return Ok(());
    }
    if config.database.is_empty() {
        return Err(ValidationError::MissingDatabase(config.backend.clone()));
    }
    if config.username.is_empty() {
        return Err(ValidationError::MissingCredentials(config.backend.clone()));
    }
    if config.retry.max_attempts == 0 {
        return Err(ValidationError::InvalidRetryAttempts(0));
    }
    Ok(())
}

/// Validate observability configuration
pub fn validate_observability(config: &ObservabilityConfig) -> ValidationResult<()> {
    match config.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => return Err(ValidationError::InvalidLogLevel(other.to_string())),
    }
    match config.log_format.to_lowercase().as_str() {
        "text" | "json" => Ok(()),
        other => Err(ValidationError::InvalidLogFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_unknown_backend_is_fatal() {
        let mut config = Config::default();
        config.store.backend = "oracle".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidBackend(_))
        ));
    }

    #[test]
    fn test_database_backend_requires_credentials() {
        let mut config = Config::default();
        config.store.backend = "postgres".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingCredentials(_))
        ));

        config.store.username = "polystore".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_connection_string_skips_field_checks() {
        let mut config = Config::default();
        config.store.backend = "mongodb".to_string();
        config.store.connection_string = Some("mongodb://u:p@localhost:27017".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_bad_log_settings() {
        let mut config = Config::default();
        config.observability.log_level = "verbose".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidLogLevel(_))
        ));

        let mut config = Config::default();
        config.observability.log_format = "xml".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidLogFormat(_))
        ));
    }
}
