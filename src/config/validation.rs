//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses parse and names are usable
//! - Detect listeners competing for one bind address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Shared tracker names are legal: their counts aggregate

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::ConntrackConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener {index}: name must not be empty")]
    EmptyName { index: usize },
    #[error("listener {index}: invalid bind address {address:?}")]
    BadBindAddress { index: usize, address: String },
    #[error("listener {index}: bind address {address} already used")]
    DuplicateBindAddress { index: usize, address: String },
    #[error("invalid debug address {0:?}")]
    BadDebugAddress(String),
}

pub fn validate_config(config: &ConntrackConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut bound = HashSet::new();

    for (index, listener) in config.listeners.iter().enumerate() {
        if listener.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName { index });
        }

        match listener.bind_address.parse::<SocketAddr>() {
            // Port 0 asks the OS for a fresh port, so it never collides.
            Ok(addr) if addr.port() != 0 && !bound.insert(addr) => {
                errors.push(ValidationError::DuplicateBindAddress {
                    index,
                    address: addr.to_string(),
                });
            }
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::BadBindAddress {
                index,
                address: listener.bind_address.clone(),
            }),
        }
    }

    if config.observability.debug_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadDebugAddress(
            config.observability.debug_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ListenerConfig;

    fn listener(name: &str, bind: &str) -> ListenerConfig {
        ListenerConfig {
            name: name.into(),
            bind_address: bind.into(),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ConntrackConfig::default()).is_ok());
    }

    #[test]
    fn shared_names_are_allowed() {
        let mut config = ConntrackConfig::default();
        config.listeners.push(listener("svc", "127.0.0.1:7001"));
        config.listeners.push(listener("svc", "127.0.0.1:7002"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ConntrackConfig::default();
        config.listeners.push(listener("", "127.0.0.1:7001"));
        config.listeners.push(listener("b", "not-an-address"));
        config.listeners.push(listener("c", "127.0.0.1:7001"));
        config.observability.debug_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyName { index: 0 },
                ValidationError::BadBindAddress { index: 1, address: "not-an-address".into() },
                ValidationError::DuplicateBindAddress { index: 2, address: "127.0.0.1:7001".into() },
                ValidationError::BadDebugAddress("nowhere".into()),
            ]
        );
    }

    #[test]
    fn ephemeral_ports_never_collide() {
        let mut config = ConntrackConfig::default();
        config.listeners.push(listener("a", "127.0.0.1:0"));
        config.listeners.push(listener("b", "127.0.0.1:0"));
        assert!(validate_config(&config).is_ok());
    }
}
