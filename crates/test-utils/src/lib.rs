//! Shared fixtures for the `taskgraph` integration tests: factory registries,
//! fake executors and recording error handlers.

pub mod builders;
pub mod fake_executor;
pub mod handlers;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use taskgraph::logging::LOG_ENV_VAR;
use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for any single awaited graph operation in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// The filter comes from `TASKGRAPH_LOG`, then `RUST_LOG`, then `warn`, e.g.
/// `TASKGRAPH_LOG=taskgraph::engine=debug cargo test`. Output is only shown
/// for failing tests unless `--nocapture` is passed.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`]. A hung graph
/// fails the test instead of stalling the suite.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test future did not finish within {TEST_TIMEOUT:?}"),
    }
}
