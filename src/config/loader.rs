//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::directive::{parse_block, DirectiveError};
use crate::config::schema::{HostConfig, ServiceConfig};
use crate::config::validation::{validate_config, validate_service, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Directive error: {0}")]
    Directive(#[from] DirectiveError),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate a TOML host configuration.
pub fn parse_config(content: &str) -> Result<HostConfig, ConfigError> {
    let config: HostConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate a `pocketbase { ... }` block.
pub fn parse_service_block(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config = parse_block(content)?;
    validate_service(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load a `pocketbase { ... }` block from a file.
pub fn load_service_block(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_service_block(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:8080\"\n\n[pocketbase]\nlisten = \"127.0.0.1:8090\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.pocketbase.listen.as_deref(), Some("127.0.0.1:8090"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_block_validation_runs() {
        let err = parse_service_block("pocketbase {\n  origins not-a-url\n}").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("pocketbase.origins"));
    }

    #[test]
    fn test_block_unknown_key() {
        let err = parse_service_block("pocketbase {\n  port 80\n}").unwrap_err();
        assert!(matches!(err, ConfigError::Directive(_)));
        assert!(err.to_string().contains("'port'"));
    }
}
