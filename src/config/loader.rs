// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::GraphFile;
use crate::config::validate::validate_graph_file;
use crate::errors::ConfigError;

/// Read and deserialize a graph file. No semantic validation happens here;
/// see [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<GraphFile, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    debug!(path = %path.display(), "loaded graph file");
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<GraphFile, ConfigError> {
    Ok(toml::from_str(contents)?)
}

/// Read a graph file and check it:
/// - at least one task,
/// - every `after` entry names an existing task other than the task itself.
///
/// Cycles are reported when the graph is built.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphFile, ConfigError> {
    let graph = load_from_path(path)?;
    validate_graph_file(&graph)?;
    Ok(graph)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskgraph.toml")
}
