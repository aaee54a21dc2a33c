// src/exec/command.rs

//! Shell command tasks.
//!
//! The command-line front end registers a single factory under
//! [`command_factory_key`]: its argument is a task name, its value the
//! task's [`CommandOutput`]. Each node binds the tasks listed in its `after`
//! and hands their stdout to the command as `TASKGRAPH_INPUT_<NAME>`.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::process::Command;
use tracing::{debug, info};

use crate::builder::{
    CollectingTaskGraphBuilder, DefaultGroup, TaskFactory, TaskFactoryConfig, TaskFactoryProperties,
    TaskGraphBuilder, TaskInputRef, TaskNodeCreateArgs,
};
use crate::cancel::CancellationToken;
use crate::config::{GraphFile, TaskConfig};
use crate::engine::RestrictableTaskGraphExecutorFactory;
use crate::errors::TaskError;
use crate::key::{TaskFactoryKey, TaskNodeKey};
use crate::node::CancelableFunction;

/// Prefix of the environment variables carrying dependency output.
pub const INPUT_ENV_PREFIX: &str = "TASKGRAPH_INPUT_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub task: String,
    /// Standard output with trailing newlines removed.
    pub stdout: String,
}

pub fn command_factory_key() -> TaskFactoryKey {
    TaskFactoryKey::new::<CommandOutput, String>("command")
}

pub fn command_node_key(task: &str) -> TaskNodeKey {
    command_factory_key().node_key(task.to_string())
}

/// `TASKGRAPH_INPUT_` followed by the task name upper-cased, with anything
/// but ASCII letters and digits replaced by `_`.
pub fn input_env_var(task: &str) -> String {
    let name: String = task
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{INPUT_ENV_PREFIX}{name}")
}

/// Creates one shell command node per task of a graph file.
#[derive(Debug, Clone)]
pub struct CommandTaskFactory {
    tasks: Arc<BTreeMap<String, TaskConfig>>,
}

impl CommandTaskFactory {
    pub fn new(tasks: Arc<BTreeMap<String, TaskConfig>>) -> Self {
        Self { tasks }
    }
}

impl TaskFactory<CommandOutput, String> for CommandTaskFactory {
    fn create_task_node(
        &self,
        _cancel: &CancellationToken,
        args: &mut TaskNodeCreateArgs<'_, String>,
    ) -> Result<CancelableFunction<CommandOutput>, TaskError> {
        let name = args.factory_arg().clone();
        let task = self
            .tasks
            .get(&name)
            .cloned()
            .ok_or_else(|| TaskError::failed(anyhow!("unknown task '{name}'")))?;

        let inputs = task
            .after
            .iter()
            .map(|dep| args.inputs().bind_input::<CommandOutput>(command_node_key(dep)))
            .collect::<Result<Vec<TaskInputRef<CommandOutput>>, _>>()?;

        Ok(CancelableFunction::new(move |cancel| async move {
            let mut env = Vec::with_capacity(inputs.len());
            for input in inputs {
                let output = input.consume_input().await?;
                env.push((input_env_var(&output.task), output.stdout));
            }
            run_command(&name, &task.cmd, env, cancel).await
        }))
    }
}

/// A builder knowing every task of `graph`, configured from its
/// `[executor]` section. No roots are added.
pub fn command_graph_builder(
    graph: &GraphFile,
) -> CollectingTaskGraphBuilder<RestrictableTaskGraphExecutorFactory> {
    let tasks = Arc::new(graph.task.clone());
    let config = TaskFactoryConfig::new::<CommandOutput, String, _, _>(
        command_factory_key(),
        Arc::new(DefaultGroup),
        move |_: &TaskFactoryProperties| Ok(CommandTaskFactory::new(Arc::clone(&tasks))),
    );

    let mut builder = CollectingTaskGraphBuilder::new([config], graph.executor.executor_factory());
    builder
        .properties()
        .default_factory_properties_mut()
        .set_default_executor(graph.executor.task_executor());
    builder
}

/// Run `cmd` through the platform shell and capture its stdout.
///
/// A non-zero exit fails the task. If `cancel` fires first, the process is
/// killed and [`TaskError::Canceled`] returned.
pub async fn run_command(
    task: &str,
    cmd: &str,
    env: Vec<(String, String)>,
    cancel: CancellationToken,
) -> Result<CommandOutput, TaskError> {
    info!(task, cmd, "starting task process");

    let mut command = shell_command(cmd);
    command.envs(env).kill_on_drop(true);

    // Dropping the `output` future drops the child, which kills it.
    let output = tokio::select! {
        output = command.output() => {
            output.with_context(|| format!("running process of task '{task}'"))?
        }
        _ = cancel.cancelled() => {
            info!(task, "cancellation requested for running task; killing process");
            return Err(TaskError::Canceled);
        }
    };

    for line in String::from_utf8_lossy(&output.stderr).lines() {
        debug!(task, "stderr: {}", line);
    }

    let code = output.status.code().unwrap_or(-1);
    info!(
        task,
        exit_code = code,
        success = output.status.success(),
        "task process exited"
    );

    if !output.status.success() {
        return Err(TaskError::failed(anyhow!(
            "task '{task}' exited with code {code}"
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    Ok(CommandOutput {
        task: task.to_string(),
        stdout,
    })
}

fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}
