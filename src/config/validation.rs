//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Socket addresses parse, timeouts are positive
//! - CORS origins are `*` or absolute http(s) origins
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{HostConfig, ServiceConfig};

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole host configuration.
pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new("listener.max_body_size", "must be greater than 0"));
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if let Some(key) = &config.admin.api_key {
            if key.trim().is_empty() {
                errors.push(ValidationError::new("admin.api_key", "must not be blank when set"));
            }
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.shutdown_secs == 0 {
        errors.push(ValidationError::new("timeouts.shutdown_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled {
        if let Err(e) = config.observability.metrics_address.parse::<SocketAddr>() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("invalid socket address: {}", e),
            ));
        }
    }

    errors.extend(service_errors(&config.pocketbase));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate only the embedded service block.
pub fn validate_service(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let errors = service_errors(config);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn service_errors(config: &ServiceConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(listen) = &config.listen {
        check_socket_addr(&mut errors, "pocketbase.listen", listen);
    }
    if let Some(dir) = &config.data_dir {
        if dir.as_os_str().is_empty() {
            errors.push(ValidationError::new("pocketbase.data_dir", "must not be empty"));
        }
    }

    for origin in &config.origins {
        if let Err(msg) = check_origin(origin) {
            errors.push(ValidationError::new(
                "pocketbase.origins",
                format!("{:?}: {}", origin, msg),
            ));
        }
    }

    errors
}

/// Accept `host:port` where host may be a name; resolution is not required to
/// succeed here, only the shape.
fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_ok() {
        return;
    }
    let shaped = value
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if !shaped {
        errors.push(ValidationError::new(
            field,
            format!("invalid socket address {:?}", value),
        ));
    }
}

fn check_origin(origin: &str) -> Result<(), String> {
    if origin == "*" {
        return Ok(());
    }
    let url = url::Url::parse(origin).map_err(|e| e.to_string())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".into());
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err("origin must not carry a path, query or fragment".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&HostConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = HostConfig::default();
        config.listener.bind_address = "nonsense".into();
        config.timeouts.shutdown_secs = 0;
        config.pocketbase.listen = Some("127.0.0.1:99999".into());
        config.pocketbase.origins = vec!["ftp://x.example".into(), "https://ok.example".into()];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "timeouts.shutdown_secs",
                "pocketbase.listen",
                "pocketbase.origins",
            ]
        );
    }

    #[test]
    fn test_origins() {
        assert!(check_origin("*").is_ok());
        assert!(check_origin("https://app.example.com").is_ok());
        assert!(check_origin("http://localhost:5173").is_ok());
        assert!(check_origin("https://app.example.com/path").is_err());
        assert!(check_origin("app.example.com").is_err());
    }

    #[test]
    fn test_blank_api_key() {
        let mut config = HostConfig::default();
        config.admin.api_key = Some("  ".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");
    }
}
