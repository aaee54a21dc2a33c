// src/engine/executor.rs

//! Runs a built task graph.
//!
//! A node is scheduled once three things happened:
//! - its restriction strategy released it,
//! - the executor finished handing every node to the strategy,
//! - each of its dependencies settled.
//!
//! Each of these is one tick of a per-node countdown; the tick that brings it
//! to zero schedules the node. When a node settles without a value, its
//! dependents are settled with the same error (or canceled) right away, so a
//! failure never leaves work queued behind it.
//!
//! Settling a node can settle others synchronously (failure cascades, inline
//! executors). Settled keys therefore go through a queue drained by whichever
//! caller got there first, keeping the stack flat for arbitrarily long chains.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use indexmap::IndexMap;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::builder::TaskGraphExecutorFactory;
use crate::cancel::{self, CancellationToken};
use crate::engine::properties::TaskGraphExecutorProperties;
use crate::engine::result::{ExecutionResultType, TaskGraphExecutionResult};
use crate::errors::{Result, TaskError, TaskGraphError};
use crate::graph::{DependencyDag, DirectedGraph};
use crate::key::TaskNodeKey;
use crate::node::{AnyTaskNode, TaskErrorHandler};
use crate::strategy::{
    EagerTaskExecutionRestrictionStrategy, RestrictableNode, TaskExecutionRestrictionStrategy,
    TaskExecutionRestrictionStrategyFactory,
};
use crate::types::BoxFuture;

pub trait TaskGraphExecutor {
    fn properties(&mut self) -> &mut TaskGraphExecutorProperties;

    /// Run every node of the graph and wait until all of them settled.
    fn execute(&self, cancel: CancellationToken) -> BoxFuture<'_, Result<TaskGraphExecutionResult>>;
}

pub struct RestrictableTaskGraphExecutor {
    dag: DependencyDag<TaskNodeKey>,
    nodes: IndexMap<TaskNodeKey, Arc<dyn AnyTaskNode>>,
    strategy_factory: Arc<dyn TaskExecutionRestrictionStrategyFactory>,
    properties: TaskGraphExecutorProperties,
}

impl std::fmt::Debug for RestrictableTaskGraphExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestrictableTaskGraphExecutor").finish_non_exhaustive()
    }
}

impl RestrictableTaskGraphExecutor {
    pub fn new(
        dag: DependencyDag<TaskNodeKey>,
        nodes: Vec<Arc<dyn AnyTaskNode>>,
        strategy_factory: Arc<dyn TaskExecutionRestrictionStrategyFactory>,
    ) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|node| (node.key().clone(), node))
            .collect();
        Self {
            dag,
            nodes,
            strategy_factory,
            properties: TaskGraphExecutorProperties::default(),
        }
    }

    pub fn with_properties(mut self, properties: TaskGraphExecutorProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn graph(&self) -> &DependencyDag<TaskNodeKey> {
        &self.dag
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<dyn AnyTaskNode>> {
        self.nodes.values()
    }

    pub fn node(&self, key: &TaskNodeKey) -> Option<&Arc<dyn AnyTaskNode>> {
        self.nodes.get(key)
    }

    async fn run(&self, cancel: CancellationToken) -> Result<TaskGraphExecutionResult> {
        if self.nodes.is_empty() {
            debug!("empty task graph, nothing to execute");
            return self.finish(RunSummary::default());
        }

        let run_cancel = cancel.child_token();
        let abort_on_drop = run_cancel.clone().drop_guard();
        let (done_tx, done_rx) = oneshot::channel();

        let dependencies = self.dag.dependency_graph();
        let pending = self
            .nodes
            .keys()
            .map(|key| {
                let ticks = dependencies.children(key).len() + 2;
                (key.clone(), AtomicUsize::new(ticks))
            })
            .collect();

        let state = Arc::new(RunState {
            nodes: self.nodes.clone(),
            dependents: self.dag.reverse_graph(),
            pending,
            remaining: AtomicUsize::new(self.nodes.len()),
            cancel: run_cancel.clone(),
            stop_on_failure: self.properties.stop_on_failure(),
            compute_error_handler: Arc::clone(self.properties.compute_error_handler()),
            strategy: OnceLock::new(),
            summary: Mutex::new(RunSummary::default()),
            done: Mutex::new(Some(done_tx)),
            settled: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        });

        for node in self.nodes.values() {
            let weak = Arc::downgrade(&state);
            let key = node.key().clone();
            node.on_settled(Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.enqueue_settled(key);
                }
            }));
        }

        let restrictable = self
            .nodes
            .keys()
            .map(|key| {
                let weak = Arc::downgrade(&state);
                let released = key.clone();
                RestrictableNode::new(key.clone(), move || release(&weak, &released))
            })
            .collect();
        let strategy = self.strategy_factory.build_strategy(&self.dag, restrictable);
        let _ = state.strategy.set(strategy);

        debug!(nodes = self.nodes.len(), "releasing task graph");
        for key in self.nodes.keys() {
            state.tick(key);
        }

        let weak = Arc::downgrade(&state);
        let listener = match cancel::on_cancel(&run_cancel, move || {
            if let Some(state) = weak.upgrade() {
                state.cancel_unscheduled();
            }
        }) {
            Ok(listener) => Some(listener),
            Err(err) => {
                warn!(error = %err, "cannot watch for cancellation of the graph execution");
                None
            }
        };

        // The sender lives in `state`, which this function keeps alive.
        let _ = done_rx.await;

        if let Some(listener) = listener {
            listener.unregister();
        }
        let _ = abort_on_drop.disarm();

        let summary = std::mem::take(&mut *state.summary());
        self.finish(summary)
    }

    fn finish(&self, summary: RunSummary) -> Result<TaskGraphExecutionResult> {
        let result_type = if summary.errored {
            ExecutionResultType::Errored
        } else if summary.canceled {
            ExecutionResultType::Canceled
        } else {
            ExecutionResultType::Success
        };

        info!(
            nodes = self.nodes.len(),
            failed = summary.failed.len(),
            result = ?result_type,
            "task graph executed"
        );

        if !self.properties.deliver_result_on_failure() {
            match result_type {
                ExecutionResultType::Errored => {
                    return Err(TaskGraphError::ExecutionFailed {
                        failed: summary.failed,
                    });
                }
                ExecutionResultType::Canceled => return Err(TaskGraphError::ExecutionCanceled),
                ExecutionResultType::Success => {}
            }
        }

        let requested = self
            .properties
            .result_node_keys()
            .iter()
            .filter_map(|key| {
                self.nodes
                    .get(key)
                    .map(|node| (key.clone(), Arc::clone(node)))
            })
            .collect::<HashMap<_, _>>();

        Ok(TaskGraphExecutionResult::new(
            result_type,
            summary.failed,
            requested,
        ))
    }
}

impl TaskGraphExecutor for RestrictableTaskGraphExecutor {
    fn properties(&mut self) -> &mut TaskGraphExecutorProperties {
        &mut self.properties
    }

    fn execute(&self, cancel: CancellationToken) -> BoxFuture<'_, Result<TaskGraphExecutionResult>> {
        Box::pin(self.run(cancel))
    }
}

#[derive(Debug, Default)]
struct RunSummary {
    errored: bool,
    canceled: bool,
    failed: Vec<TaskNodeKey>,
}

/// Shared bookkeeping of one `execute` call.
struct RunState {
    nodes: IndexMap<TaskNodeKey, Arc<dyn AnyTaskNode>>,
    dependents: DirectedGraph<TaskNodeKey>,
    pending: HashMap<TaskNodeKey, AtomicUsize>,
    remaining: AtomicUsize,
    cancel: CancellationToken,
    stop_on_failure: bool,
    compute_error_handler: Arc<dyn TaskErrorHandler>,
    strategy: OnceLock<Box<dyn TaskExecutionRestrictionStrategy>>,
    summary: Mutex<RunSummary>,
    done: Mutex<Option<oneshot::Sender<()>>>,
    /// Settled keys not processed yet.
    settled: Mutex<VecDeque<TaskNodeKey>>,
    draining: AtomicBool,
}

fn release(state: &Weak<RunState>, key: &TaskNodeKey) {
    if let Some(state) = state.upgrade() {
        state.tick(key);
    }
}

impl RunState {
    fn summary(&self) -> MutexGuard<'_, RunSummary> {
        self.summary.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(self: &Arc<Self>, key: &TaskNodeKey) {
        let Some(pending) = self.pending.get(key) else {
            return;
        };
        if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.schedule(key);
        }
    }

    fn schedule(self: &Arc<Self>, key: &TaskNodeKey) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        let handler: Arc<dyn TaskErrorHandler> = Arc::clone(self) as Arc<dyn TaskErrorHandler>;
        if let Err(err) = node.ensure_schedule_computed(&self.cancel, handler) {
            debug!(node = %key, error = %err, "node could not be scheduled");
        }
    }

    fn settled_queue(&self) -> MutexGuard<'_, VecDeque<TaskNodeKey>> {
        self.settled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue_settled(self: &Arc<Self>, key: TaskNodeKey) {
        self.settled_queue().push_back(key);

        loop {
            if self.draining.swap(true, Ordering::AcqRel) {
                // The active drainer picks the key up.
                return;
            }

            loop {
                let next = self.settled_queue().pop_front();
                match next {
                    Some(key) => self.node_settled(&key),
                    None => break,
                }
            }

            self.draining.store(false, Ordering::Release);
            // A key pushed between the last pop and the store would be stranded.
            if self.settled_queue().is_empty() {
                return;
            }
        }
    }

    fn node_settled(self: &Arc<Self>, key: &TaskNodeKey) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };

        if let Some(err) = node.error() {
            let canceled = err.is_canceled();
            {
                let mut summary = self.summary();
                if canceled {
                    summary.canceled = true;
                } else {
                    summary.errored = true;
                }
            }
            self.settle_dependents(key, &err);
        }

        if let Some(strategy) = self.strategy.get() {
            strategy.set_node_computed(key);
        }
        for dependent in self.dependents.children(key) {
            self.tick(dependent);
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let done = self.done.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(done) = done {
                let _ = done.send(());
            }
        }
    }

    fn settle_dependents(&self, key: &TaskNodeKey, err: &TaskError) {
        for dependent in self.dependents.children(key) {
            let Some(node) = self.nodes.get(dependent) else {
                continue;
            };
            if err.is_canceled() {
                node.cancel();
            } else {
                node.propagate_failure(err.clone());
            }
        }
    }

    fn cancel_unscheduled(&self) {
        let canceled = self
            .nodes
            .values()
            .filter(|node| node.cancel_unscheduled())
            .count();
        debug!(nodes = canceled, "graph execution canceled");
    }
}

impl TaskErrorHandler for RunState {
    fn on_error(&self, key: &TaskNodeKey, error: &TaskError) {
        if error.is_canceled() {
            return;
        }
        self.summary().failed.push(key.clone());
        if self.stop_on_failure && !self.cancel.is_cancelled() {
            info!(node = %key, "stopping graph execution after failure");
            self.cancel.cancel();
        }
        self.compute_error_handler.on_error(key, error);
    }
}

/// Creates a [`RestrictableTaskGraphExecutor`] for every graph a builder
/// produces.
#[derive(Clone)]
pub struct RestrictableTaskGraphExecutorFactory {
    strategy_factory: Arc<dyn TaskExecutionRestrictionStrategyFactory>,
    properties: TaskGraphExecutorProperties,
}

impl RestrictableTaskGraphExecutorFactory {
    pub fn new(strategy_factory: Arc<dyn TaskExecutionRestrictionStrategyFactory>) -> Self {
        Self {
            strategy_factory,
            properties: TaskGraphExecutorProperties::default(),
        }
    }

    pub fn eager() -> Self {
        Self::new(Arc::new(EagerTaskExecutionRestrictionStrategy))
    }

    /// Properties every created executor starts with.
    pub fn properties(&mut self) -> &mut TaskGraphExecutorProperties {
        &mut self.properties
    }
}

impl Default for RestrictableTaskGraphExecutorFactory {
    fn default() -> Self {
        Self::eager()
    }
}

impl TaskGraphExecutorFactory for RestrictableTaskGraphExecutorFactory {
    type Executor = RestrictableTaskGraphExecutor;

    fn create_executor(
        &self,
        dag: DependencyDag<TaskNodeKey>,
        nodes: Vec<Arc<dyn AnyTaskNode>>,
    ) -> Result<Self::Executor> {
        Ok(
            RestrictableTaskGraphExecutor::new(dag, nodes, Arc::clone(&self.strategy_factory))
                .with_properties(self.properties.clone()),
        )
    }
}
