// tests/weak_leafs_execution.rs

mod common;

use std::sync::Arc;

use common::{TestResult, build_with};
use taskgraph::cancel;
use taskgraph::config::ExecutorSection;
use taskgraph::engine::RestrictableTaskGraphExecutorFactory;
use taskgraph::strategy::WeakLeafsOfEndNodeRestrictingStrategy;
use taskgraph::{TaskGraphError, TaskGraphExecutor, TaskNodeKey};
use taskgraph_test_utils::builders::{TestFactories, test_node};
use taskgraph_test_utils::{init_tracing, with_timeout};

/// End:e1 needs Leaf:l1 and Leaf:l2, End:e2 needs Leaf:l3.
fn two_end_nodes() -> TestFactories {
    TestFactories::new()
        .add("End", |arg| match arg {
            "e1" => vec![test_node("Leaf", "l1"), test_node("Leaf", "l2")],
            _ => vec![test_node("Leaf", "l3")],
        })
        .add_leaf("Leaf")
}

fn position(runs: &[TaskNodeKey], key: &TaskNodeKey) -> usize {
    runs.iter()
        .position(|run| run == key)
        .unwrap_or_else(|| panic!("{key} never ran"))
}

#[tokio::test]
async fn bound_of_one_holds_back_leafs_of_the_next_end_node() -> TestResult {
    init_tracing();

    let factories = two_end_nodes();
    let mut executor_factory =
        RestrictableTaskGraphExecutorFactory::new(Arc::new(WeakLeafsOfEndNodeRestrictingStrategy::new(1)));
    executor_factory
        .properties()
        .add_result_node_keys([test_node("End", "e1"), test_node("End", "e2")]);

    let executor = build_with(
        factories.configs(),
        &[test_node("End", "e1"), test_node("End", "e2")],
        executor_factory,
    )
    .await?;
    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;

    assert_eq!(result.result::<String>(&test_node("End", "e1"))?, "e1(l1,l2)");
    assert_eq!(result.result::<String>(&test_node("End", "e2"))?, "e2(l3)");

    let runs = factories.runs();
    assert_eq!(runs.len(), 5);
    assert!(position(&runs, &test_node("End", "e1")) < position(&runs, &test_node("Leaf", "l3")));
    Ok(())
}

#[tokio::test]
async fn executor_section_selects_the_weak_leafs_strategy() -> TestResult {
    init_tracing();

    let section = ExecutorSection {
        max_retained_leaf_nodes: 2,
        ..ExecutorSection::default()
    };
    let factories = two_end_nodes();
    let mut executor_factory = section.executor_factory();
    executor_factory
        .properties()
        .add_result_node_key(test_node("End", "e2"));

    let executor = build_with(
        factories.configs(),
        &[test_node("End", "e1"), test_node("End", "e2")],
        executor_factory,
    )
    .await?;
    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;

    assert!(result.is_success());
    assert_eq!(result.result::<String>(&test_node("End", "e2"))?, "e2(l3)");
    assert_eq!(factories.runs().len(), 5);
    Ok(())
}

#[tokio::test]
async fn failed_end_node_still_releases_the_next_one() -> TestResult {
    init_tracing();

    let factories = TestFactories::new()
        .add_failing("Bad", |_| vec![test_node("Leaf", "l1")], "bad end node")
        .add("Good", |_| vec![test_node("Leaf", "l2")])
        .add_leaf("Leaf");
    let mut executor_factory =
        RestrictableTaskGraphExecutorFactory::new(Arc::new(WeakLeafsOfEndNodeRestrictingStrategy::new(1)));
    executor_factory.properties().set_deliver_result_on_failure(true);

    let executor = build_with(
        factories.configs(),
        &[test_node("Bad", "b"), test_node("Good", "g")],
        executor_factory,
    )
    .await?;
    let result = with_timeout(executor.execute(cancel::uncancelable())).await?;

    assert_eq!(result.failed_nodes(), &[test_node("Bad", "b")]);
    assert_eq!(factories.run_count(&test_node("Good", "g")), 1);
    assert_eq!(factories.run_count(&test_node("Leaf", "l2")), 1);
    Ok(())
}

#[tokio::test]
async fn without_delivery_a_failure_is_an_error() -> TestResult {
    init_tracing();

    let factories = TestFactories::new().add_failing("Bad", |_| Vec::new(), "nope");
    let executor_factory =
        RestrictableTaskGraphExecutorFactory::new(Arc::new(WeakLeafsOfEndNodeRestrictingStrategy::new(1)));

    let executor = build_with(factories.configs(), &[test_node("Bad", "b")], executor_factory).await?;
    let err = with_timeout(executor.execute(cancel::uncancelable()))
        .await
        .unwrap_err();

    assert!(matches!(err, TaskGraphError::ExecutionFailed { .. }), "{err:?}");
    Ok(())
}
