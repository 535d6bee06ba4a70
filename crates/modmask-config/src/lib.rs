//! Configuration parsing for modmask
//!
//! This crate handles parsing the KDL file that describes the target surface,
//! robot timing, and which modifier scenarios the harness runs.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{load_config, parse_config, parse_config_str, DEFAULT_CONFIG_PATH};
