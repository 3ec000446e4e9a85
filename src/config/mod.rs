//! Configuration model for drivelease.
//!
//! This module defines the Config struct that represents
//! `/etc/drivelease/config.yaml`. Unknown fields are ignored and every field
//! has a default, so an empty or missing file is a valid configuration.

mod model;
mod operations;
pub mod types;


pub use model::Config;
pub use operations::resolve_config_path;
pub use types::DEFAULT_CONFIG_PATH;
