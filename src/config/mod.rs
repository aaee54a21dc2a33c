// src/config/mod.rs

//! Graph files for the command-line front end.
//!
//! - `model.rs`: the TOML data model and how the `[executor]` section maps
//!   onto executor settings.
//! - `loader.rs`: reading a file from disk.
//! - `validate.rs`: checks that do not need the engine.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{ExecutorSection, GraphFile, TaskConfig};
pub use validate::{validate_graph_file, validate_targets};
