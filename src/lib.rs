// src/lib.rs

pub mod builder;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod graph;
pub mod key;
pub mod logging;
pub mod node;
pub mod strategy;
pub mod types;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

pub use builder::{
    CollectingTaskGraphBuilder, TaskFactory, TaskFactoryConfig, TaskGraphBuilder,
    TaskGraphExecutorFactory, TaskInputRef, TaskNodeCreateArgs, task_factory,
};
pub use cancel::CancellationToken;
pub use engine::{
    ExecutionResultType, RestrictableTaskGraphExecutor, RestrictableTaskGraphExecutorFactory,
    TaskGraphExecutionResult, TaskGraphExecutor,
};
pub use errors::{CycleError, TaskError, TaskGraphError};
pub use graph::{DependencyDag, DirectedGraph};
pub use key::{TaskFactoryKey, TaskNodeKey};
pub use node::{CancelableFunction, TaskErrorHandler, TaskNode};

use crate::cli::CliArgs;
use crate::config::{GraphFile, load_and_validate, validate_targets};
use crate::exec::command::{CommandOutput, command_graph_builder, command_node_key};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - graph file loading
/// - graph discovery from the selected targets
/// - execution of the discovered shell commands
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let graph_file = load_and_validate(&args.config)
        .with_context(|| format!("loading graph file {}", args.config.display()))?;

    let targets = if args.targets.is_empty() {
        graph_file.end_tasks()
    } else {
        validate_targets(&graph_file, &args.targets)?;
        args.targets.clone()
    };
    info!(?targets, "targets to run");

    let mut builder = command_graph_builder(&graph_file);
    for target in &targets {
        builder.add_node(command_node_key(target));
    }

    // Ctrl-C → cancel discovery and execution.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("interrupted, canceling remaining tasks");
            cancel.cancel();
        });
    }

    let mut executor = builder.build_graph(cancel.clone()).await?;

    if args.dry_run {
        print_dry_run(&graph_file, &executor, &targets);
        return Ok(());
    }

    executor
        .properties()
        .add_result_node_keys(targets.iter().map(|target| command_node_key(target)));
    let result = executor.execute(cancel).await?;

    for target in &targets {
        match result.result::<CommandOutput>(&command_node_key(target)) {
            Ok(output) => {
                println!("== {} ==", output.task);
                if !output.stdout.is_empty() {
                    println!("{}", output.stdout);
                }
            }
            Err(err) => eprintln!("== {target} == {err}"),
        }
    }

    if !result.is_success() {
        bail!(
            "task graph finished {:?}; failed tasks: {:?}",
            result.result_type(),
            result.failed_nodes()
        );
    }
    Ok(())
}

/// Print the discovered graph without running anything.
fn print_dry_run(graph_file: &GraphFile, executor: &RestrictableTaskGraphExecutor, targets: &[String]) {
    println!("taskgraph dry-run");
    println!("  executor = {:?}", graph_file.executor);
    println!("  targets = {targets:?}");
    println!();

    let nodes: Vec<_> = executor.nodes().collect();
    println!("tasks ({}):", nodes.len());
    for node in nodes {
        let Some(name) = node.key().factory_arg().downcast_ref::<String>() else {
            continue;
        };
        println!("  - {name}");
        if let Some(task) = graph_file.task.get(name) {
            println!("      cmd: {}", task.cmd);
            if !task.after.is_empty() {
                println!("      after: {:?}", task.after);
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
