//! Configuration loading and validation (spec.md §6).

pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config};
pub use schema::{ClientConfig, Config, Transport};
