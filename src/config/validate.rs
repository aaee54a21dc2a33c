// src/config/validate.rs

use crate::config::model::GraphFile;
use crate::errors::ConfigError;

pub fn validate_graph_file(graph: &GraphFile) -> Result<(), ConfigError> {
    ensure_has_tasks(graph)?;
    validate_task_dependencies(graph)?;
    Ok(())
}

/// Every requested target must be a task of `graph`.
pub fn validate_targets(graph: &GraphFile, targets: &[String]) -> Result<(), ConfigError> {
    match targets.iter().find(|target| !graph.task.contains_key(*target)) {
        Some(unknown) => Err(ConfigError::Invalid(format!("unknown target task '{unknown}'"))),
        None => Ok(()),
    }
}

fn ensure_has_tasks(graph: &GraphFile) -> Result<(), ConfigError> {
    if graph.task.is_empty() {
        return Err(ConfigError::Invalid(
            "graph file must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_dependencies(graph: &GraphFile) -> Result<(), ConfigError> {
    for (name, task) in &graph.task {
        for dep in &task.after {
            if dep == name {
                return Err(ConfigError::Invalid(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
            if !graph.task.contains_key(dep) {
                return Err(ConfigError::Invalid(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}
