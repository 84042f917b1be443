//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! headunit.toml → headunit.<env>.toml → HEADUNIT_* vars → --set overrides
//!     → loader.rs (merge layers & deserialize)
//!     → validation.rs (semantic checks, run by the config provider)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc through the service registry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no reactive reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_layered, ConfigError, ConfigSources};
pub use schema::{
    AppConfig, HardwareConfig, HealthConfig, LoggingConfig, PluginManifest, PluginsConfig,
    Rotation, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
