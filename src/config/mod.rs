//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ConntrackConfig (validated, immutable)
//!     → each ListenerConfig becomes a TrackOptions at wrap time
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; tracking options cannot change after wrapping
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ConntrackConfig, ListenerConfig, LogFormat, ObservabilityConfig};
pub use validation::ValidationError;
