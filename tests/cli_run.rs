// tests/cli_run.rs

mod common;

use common::TestResult;
use taskgraph::cancel;
use taskgraph::cli::CliArgs;
use taskgraph::config::{ExecutorSection, load_and_validate, load_from_str};
use taskgraph::errors::ConfigError;
use taskgraph::exec::command::{CommandOutput, command_graph_builder, command_node_key};
use taskgraph::{TaskGraphBuilder, TaskGraphError, TaskGraphExecutor};
use taskgraph_test_utils::builders::{GraphFileBuilder, write_graph_file};
use taskgraph_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;

fn args_for(config: &std::path::Path, targets: &[&str], dry_run: bool) -> CliArgs {
    CliArgs {
        config: config.to_path_buf(),
        targets: targets.iter().map(|t| t.to_string()).collect(),
        log_level: None,
        dry_run,
    }
}

#[test]
fn graph_file_parses_executor_and_tasks() -> TestResult {
    let graph = load_from_str(
        r#"
        [executor]
        stop_on_failure = true
        max_retained_leaf_nodes = 3

        [task.build]
        cmd = "make"

        [task.test]
        cmd = "make test"
        after = ["build"]
        "#,
    )?;

    assert!(graph.executor.stop_on_failure);
    assert!(!graph.executor.deliver_result_on_failure);
    assert_eq!(graph.executor.max_retained_leaf_nodes, 3);
    assert_eq!(graph.executor.max_concurrency, 0);
    assert_eq!(graph.task["test"].after, vec!["build".to_string()]);
    assert_eq!(graph.end_tasks(), vec!["test".to_string()]);
    Ok(())
}

#[test]
fn unknown_executor_keys_are_rejected() {
    let err = load_from_str(
        r#"
        [executor]
        retries = 3

        [task.a]
        cmd = "true"
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::Toml(_)), "{err:?}");
}

#[test]
fn validation_rejects_empty_and_dangling_graphs() -> TestResult {
    let dir = tempdir()?;

    let empty = write_graph_file(dir.path(), "[executor]\nstop_on_failure = false\n");
    let err = load_and_validate(&empty).unwrap_err();
    assert!(err.to_string().contains("at least one"), "{err}");

    let dangling = write_graph_file(
        dir.path(),
        r#"
        [task.a]
        cmd = "true"
        after = ["missing"]
        "#,
    );
    let err = load_and_validate(&dangling).unwrap_err();
    assert!(err.to_string().contains("unknown dependency 'missing'"), "{err}");

    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)), "{err:?}");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn dependency_stdout_reaches_dependents_through_env() -> TestResult {
    init_tracing();

    let graph = GraphFileBuilder::new()
        .with_task("greet", "echo hello", &[])
        .with_task("name", "printf world", &[])
        .with_task(
            "combine",
            "echo \"$TASKGRAPH_INPUT_GREET $TASKGRAPH_INPUT_NAME\"",
            &["greet", "name"],
        )
        .build();

    let mut builder = command_graph_builder(&graph);
    builder.add_node(command_node_key("combine"));
    let mut executor = builder.build_graph(cancel::uncancelable()).await?;
    executor
        .properties()
        .add_result_node_key(command_node_key("combine"));

    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;
    let output: CommandOutput = result.result(&command_node_key("combine"))?;
    assert_eq!(output.task, "combine");
    assert_eq!(output.stdout, "hello world");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_skips_its_dependents() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let marker = dir.path().join("ran");
    let graph = GraphFileBuilder::new()
        .with_task("broken", "exit 2", &[])
        .with_task("after", &format!("touch {}", marker.display()), &["broken"])
        .with_executor(ExecutorSection {
            max_concurrency: 2,
            ..ExecutorSection::default()
        })
        .build();

    let mut builder = command_graph_builder(&graph);
    builder.add_node(command_node_key("after"));
    let executor = builder.build_graph(cancel::uncancelable()).await?;

    let err = with_timeout(executor.execute(cancel::uncancelable()))
        .await
        .unwrap_err();
    match err {
        TaskGraphError::ExecutionFailed { failed } => {
            assert_eq!(failed, vec![command_node_key("broken")]);
        }
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
    assert!(!marker.exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn run_executes_default_targets() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let marker = dir.path().join("done");
    let config = write_graph_file(
        dir.path(),
        &format!(
            r#"
            [task.prepare]
            cmd = "echo ready"

            [task.finish]
            cmd = "test \"$TASKGRAPH_INPUT_PREPARE\" = ready && touch {}"
            after = ["prepare"]
            "#,
            marker.display()
        ),
    );

    with_timeout(taskgraph::run(args_for(&config, &[], false))).await?;
    assert!(marker.exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn dry_run_discovers_without_executing() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let marker = dir.path().join("touched");
    let config = write_graph_file(
        dir.path(),
        &format!(
            r#"
            [task.only]
            cmd = "touch {}"
            "#,
            marker.display()
        ),
    );

    with_timeout(taskgraph::run(args_for(&config, &["only"], true))).await?;
    assert!(!marker.exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn run_fails_on_unknown_target_and_failing_task() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let config = write_graph_file(
        dir.path(),
        r#"
        [task.ok]
        cmd = "true"

        [task.bad]
        cmd = "false"
        "#,
    );

    let err = with_timeout(taskgraph::run(args_for(&config, &["ghost"], false)))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("unknown target task 'ghost'"), "{err:#}");

    let err = with_timeout(taskgraph::run(args_for(&config, &["ok", "bad"], false)))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("failed"), "{err:#}");
    Ok(())
}
