// tests/executor_failures.rs

mod common;

use std::sync::Arc;

use common::{TestResult, build_eager, build_with};
use taskgraph::builder::{
    CollectingTaskGraphBuilder, DefaultGroup, TaskFactoryConfig, TaskGraphBuilder, task_factory,
};
use taskgraph::cancel::{self, CancellationToken};
use taskgraph::engine::{ExecutionResultType, RestrictableTaskGraphExecutorFactory};
use taskgraph::{CancelableFunction, TaskError, TaskFactoryKey, TaskGraphError, TaskGraphExecutor};
use taskgraph_test_utils::builders::{TestFactories, test_node};
use taskgraph_test_utils::fake_executor::InlineExecutor;
use taskgraph_test_utils::handlers::RecordingErrorHandler;
use taskgraph_test_utils::{init_tracing, with_timeout};

/// Top:t -> Mid:m -> Bad:b, plus an unrelated Fine:f.
fn failing_chain() -> TestFactories {
    TestFactories::new()
        .add("Top", |_| vec![test_node("Mid", "m")])
        .add("Mid", |_| vec![test_node("Bad", "b")])
        .add_failing("Bad", |_| Vec::new(), "disk full")
        .add_leaf("Fine")
}

const LONG_CHAIN: usize = 10_000;

/// Link:n binds Link:(n-1), Link:1 binds the failing Broken:0.
fn long_failing_chain() -> TestFactories {
    TestFactories::new()
        .add("Link", |arg| {
            let n: usize = arg.parse().expect("numeric link");
            if n == 1 {
                vec![test_node("Broken", "0")]
            } else {
                vec![test_node("Link", &(n - 1).to_string())]
            }
        })
        .add_failing("Broken", |_| Vec::new(), "chain root failed")
}

fn depth_key() -> TaskFactoryKey {
    TaskFactoryKey::new::<u64, u32>("Depth")
}

/// Node `Depth:n` binds `Depth:(n-1)` and outputs its distance from `Depth:0`.
fn depth_chain() -> TaskFactoryConfig {
    TaskFactoryConfig::new::<u64, u32, _, _>(depth_key(), Arc::new(DefaultGroup), |_| {
        Ok(task_factory::<u64, u32, _>(|_cancel, args| {
            let n = *args.factory_arg();
            let input = if n == 0 {
                None
            } else {
                Some(args.inputs().bind_input::<u64>(depth_key().node_key(n - 1))?)
            };
            Ok(CancelableFunction::new(move |_| async move {
                match input {
                    None => Ok(0),
                    Some(input) => Ok(input.consume_input().await? + 1),
                }
            }))
        }))
    })
}

#[tokio::test]
async fn failure_cascades_to_dependents_without_running_them() -> TestResult {
    init_tracing();

    let factories = failing_chain();
    let handler = RecordingErrorHandler::new();
    let mut executor_factory = RestrictableTaskGraphExecutorFactory::eager();
    executor_factory
        .properties()
        .set_compute_error_handler(handler.handler());

    let executor = build_with(
        factories.configs(),
        &[test_node("Top", "t"), test_node("Fine", "f")],
        executor_factory,
    )
    .await?;

    let err = with_timeout(executor.execute(cancel::uncancelable()))
        .await
        .unwrap_err();

    match err {
        TaskGraphError::ExecutionFailed { failed } => {
            assert_eq!(failed, vec![test_node("Bad", "b")]);
        }
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }

    assert_eq!(factories.run_count(&test_node("Mid", "m")), 0);
    assert_eq!(factories.run_count(&test_node("Top", "t")), 0);
    assert_eq!(factories.run_count(&test_node("Fine", "f")), 1);
    assert_eq!(handler.keys(), vec![test_node("Bad", "b")]);

    let top = executor.node(&test_node("Top", "t")).expect("top node exists");
    let top_error = top.error().expect("top settled with an error");
    assert_eq!(top_error.to_string(), "disk full");
    Ok(())
}

#[tokio::test]
async fn results_are_delivered_on_failure_when_asked() -> TestResult {
    init_tracing();

    let factories = failing_chain();
    let mut executor_factory = RestrictableTaskGraphExecutorFactory::eager();
    executor_factory
        .properties()
        .set_deliver_result_on_failure(true)
        .add_result_node_keys([test_node("Top", "t"), test_node("Fine", "f")]);

    let executor = build_with(
        factories.configs(),
        &[test_node("Top", "t"), test_node("Fine", "f")],
        executor_factory,
    )
    .await?;
    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;

    assert_eq!(result.result_type(), ExecutionResultType::Errored);
    assert!(!result.is_success());
    assert_eq!(result.failed_nodes(), &[test_node("Bad", "b")]);
    assert_eq!(result.result::<String>(&test_node("Fine", "f"))?, "f");

    let err = result.result::<String>(&test_node("Top", "t")).unwrap_err();
    assert!(matches!(err, TaskGraphError::Task(TaskError::Failed(_))), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn stop_on_failure_cancels_the_rest_of_the_graph() -> TestResult {
    init_tracing();

    let factories = TestFactories::new()
        .add_failing("Bad", |_| Vec::new(), "exploded")
        .add_blocking("Slow")
        .add("After", |_| vec![test_node("Slow", "s")]);
    let mut executor_factory = RestrictableTaskGraphExecutorFactory::eager();
    executor_factory
        .properties()
        .set_stop_on_failure(true)
        .set_deliver_result_on_failure(true);

    let executor = build_with(
        factories.configs(),
        &[test_node("Bad", "b"), test_node("After", "a")],
        executor_factory,
    )
    .await?;
    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;

    // Failure outranks the cancellation it caused.
    assert_eq!(result.result_type(), ExecutionResultType::Errored);
    assert_eq!(result.failed_nodes(), &[test_node("Bad", "b")]);
    assert_eq!(factories.run_count(&test_node("After", "a")), 0);

    let after = executor.node(&test_node("After", "a")).expect("after node exists");
    assert!(after.error().is_some_and(|err| err.is_canceled()));
    Ok(())
}

#[tokio::test]
async fn canceling_the_run_reports_cancellation() -> TestResult {
    init_tracing();

    let factories = TestFactories::new()
        .add_blocking("Slow")
        .add("After", |_| vec![test_node("Slow", "s")]);
    let handler = RecordingErrorHandler::new();
    let mut executor_factory = RestrictableTaskGraphExecutorFactory::eager();
    executor_factory
        .properties()
        .set_compute_error_handler(handler.handler());

    let executor = build_with(factories.configs(), &[test_node("After", "a")], executor_factory).await?;

    let cancel = CancellationToken::new();
    let canceler = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            cancel.cancel();
        })
    };

    let err = with_timeout(executor.execute(cancel)).await.unwrap_err();
    canceler.await?;

    assert!(matches!(err, TaskGraphError::ExecutionCanceled), "{err:?}");
    assert_eq!(factories.run_count(&test_node("After", "a")), 0);
    assert_eq!(handler.count(), 0);
    Ok(())
}

#[tokio::test]
async fn already_canceled_run_never_starts_a_node() -> TestResult {
    init_tracing();

    let factories = TestFactories::new().add_leaf("A").add("B", |_| vec![test_node("A", "a")]);
    let executor = build_eager(factories.configs(), &[test_node("B", "b")]).await?;

    let err = with_timeout(executor.execute(cancel::canceled()))
        .await
        .unwrap_err();

    assert!(matches!(err, TaskGraphError::ExecutionCanceled), "{err:?}");
    assert!(factories.runs().is_empty());
    Ok(())
}

#[tokio::test]
async fn unrequested_results_are_refused() -> TestResult {
    init_tracing();

    let factories = TestFactories::new().add_leaf("A");
    let executor = build_eager(factories.configs(), &[test_node("A", "a")]).await?;
    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;

    assert!(result.is_success());
    let err = result.result::<String>(&test_node("A", "a")).unwrap_err();
    assert!(matches!(err, TaskGraphError::ResultNotRequested(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn requested_result_of_the_wrong_type_is_a_type_mismatch() -> TestResult {
    init_tracing();

    let factories = TestFactories::new().add_leaf("A");
    let mut executor = build_eager(factories.configs(), &[test_node("A", "a")]).await?;
    executor.properties().add_result_node_key(test_node("A", "a"));
    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;

    let err = result.result::<u64>(&test_node("A", "a")).unwrap_err();
    assert!(
        matches!(err, TaskGraphError::Task(TaskError::TypeMismatch { .. })),
        "{err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn executing_twice_does_not_rerun_nodes() -> TestResult {
    init_tracing();

    let factories = TestFactories::new().add_leaf("A").add("B", |_| vec![test_node("A", "a")]);
    let mut executor = build_eager(factories.configs(), &[test_node("B", "b")]).await?;
    executor.properties().add_result_node_key(test_node("B", "b"));

    let first = with_timeout(executor.execute(cancel::uncancelable())).await?;
    let second = with_timeout(executor.execute(cancel::uncancelable())).await?;

    assert_eq!(first.result::<String>(&test_node("B", "b"))?, "b(a)");
    assert_eq!(second.result::<String>(&test_node("B", "b"))?, "b(a)");
    assert_eq!(factories.runs().len(), 2);
    Ok(())
}

#[tokio::test]
async fn failure_at_the_bottom_of_a_long_chain_settles_every_link() -> TestResult {
    init_tracing();

    let factories = long_failing_chain();
    let top = test_node("Link", &LONG_CHAIN.to_string());
    let mut executor_factory = RestrictableTaskGraphExecutorFactory::eager();
    executor_factory
        .properties()
        .set_deliver_result_on_failure(true)
        .add_result_node_key(top.clone());

    let executor = build_with(factories.configs(), &[top.clone()], executor_factory).await?;
    assert_eq!(executor.nodes().count(), LONG_CHAIN + 1);

    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;

    assert_eq!(result.result_type(), ExecutionResultType::Errored);
    assert_eq!(result.failed_nodes(), &[test_node("Broken", "0")]);
    assert_eq!(factories.runs(), vec![test_node("Broken", "0")]);

    let err = result.result::<String>(&top).unwrap_err();
    assert_eq!(err.to_string(), "chain root failed");
    assert!(executor.nodes().all(|node| node.error().is_some()));
    Ok(())
}

#[tokio::test]
async fn long_chain_on_an_inline_executor_completes() -> TestResult {
    init_tracing();

    let inline = InlineExecutor::new();
    let top = depth_key().node_key(LONG_CHAIN as u32);
    let mut builder =
        CollectingTaskGraphBuilder::new([depth_chain()], RestrictableTaskGraphExecutorFactory::eager());
    builder
        .properties()
        .default_factory_properties_mut()
        .set_default_executor(Arc::new(inline.clone()));
    builder.add_node(top.clone());

    let mut executor = builder.build_graph(cancel::uncancelable()).await?;
    executor.properties().add_result_node_key(top.clone());

    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;

    assert!(result.is_success());
    assert_eq!(result.result::<u64>(&top)?, LONG_CHAIN as u64);
    assert_eq!(inline.executed(), LONG_CHAIN + 1);
    Ok(())
}
