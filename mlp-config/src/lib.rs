//! Configuration loading for the pipeline metadata service.
//!
//! Configuration is layered: a base YAML file, an environment-specific YAML
//! file, and `APP_*` environment variable overrides, in that order. Typed
//! configuration structs shared between crates live in [`shared`].

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::Environment;
pub use load::load_config;
pub use secret::SerializableSecretString;
