//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TapConfig (validated, immutable)
//!     → OutputConfig::publisher_config() → output::Publisher
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no runtime reconfiguration
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, LogFormat, ObservabilityConfig, OutputConfig, TapConfig};
pub use validation::{validate_config, ValidationError};
