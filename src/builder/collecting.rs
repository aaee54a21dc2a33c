// src/builder/collecting.rs

//! Discovers a task graph from its root keys.
//!
//! Starting from the keys passed to [`TaskGraphBuilder::add_node`], every key
//! is handed to the factory registered for its factory key. Inputs the factory
//! binds are queued and materialized in turn until nothing is left; the
//! collected nodes and edges are validated as a [`DependencyDag`] and handed to
//! a [`TaskGraphExecutorFactory`].

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::builder::factory::TaskFactoryConfig;
use crate::builder::inputs::DiscoverySession;
use crate::builder::properties::{TaskFactoryProperties, TaskGraphBuilderProperties};
use crate::cancel::CancellationToken;
use crate::errors::{Result, TaskGraphError};
use crate::graph::{DependencyDag, DirectedGraph};
use crate::key::{TaskFactoryKey, TaskNodeKey};
use crate::node::AnyTaskNode;
use crate::types::BoxFuture;

/// Turns a validated graph and its nodes into something that runs them.
pub trait TaskGraphExecutorFactory: Send + Sync {
    type Executor;

    fn create_executor(
        &self,
        dag: DependencyDag<TaskNodeKey>,
        nodes: Vec<Arc<dyn AnyTaskNode>>,
    ) -> Result<Self::Executor>;
}

pub trait TaskGraphBuilder {
    type Executor;

    /// Declare a root of the graph. Adding a key twice has no effect.
    fn add_node(&mut self, key: TaskNodeKey);

    fn properties(&mut self) -> &mut TaskGraphBuilderProperties;

    /// Discover every node reachable from the roots and create the executor.
    fn build_graph(&self, cancel: CancellationToken) -> BoxFuture<'_, Result<Self::Executor>>;
}

pub struct CollectingTaskGraphBuilder<E> {
    properties: TaskGraphBuilderProperties,
    factories: HashMap<TaskFactoryKey, TaskFactoryConfig>,
    executor_factory: E,
    roots: IndexSet<TaskNodeKey>,
}

impl<E> CollectingTaskGraphBuilder<E>
where
    E: TaskGraphExecutorFactory,
{
    /// A later config for an already registered factory key replaces the
    /// earlier one.
    pub fn new(factories: impl IntoIterator<Item = TaskFactoryConfig>, executor_factory: E) -> Self {
        let factories = factories
            .into_iter()
            .map(|config| (config.factory_key().clone(), config))
            .collect();
        Self {
            properties: TaskGraphBuilderProperties::default(),
            factories,
            executor_factory,
            roots: IndexSet::new(),
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = &TaskNodeKey> {
        self.roots.iter()
    }

    pub fn executor_factory(&self) -> &E {
        &self.executor_factory
    }

    async fn collect(&self, cancel: CancellationToken) -> Result<E::Executor> {
        let mut session = DiscoverySession::default();
        for root in &self.roots {
            session.enqueue(root);
        }

        let defaults = self.properties.default_factory_properties();
        let mut group_properties: HashMap<usize, TaskFactoryProperties> = HashMap::new();
        let mut graph = DirectedGraph::builder();
        let mut nodes: Vec<Arc<dyn AnyTaskNode>> = Vec::new();

        while let Some(key) = session.next_key() {
            if cancel.is_cancelled() {
                debug!(discovered = session.discovered(), "graph build canceled");
                return Err(TaskGraphError::BuildCanceled);
            }

            let Some(config) = self.factories.get(key.factory_key()) else {
                warn!(node = %key, "no factory registered for node");
                return Err(TaskGraphError::UnknownFactory {
                    factory: key.factory_key().clone(),
                    key,
                });
            };

            let properties = group_properties
                .entry(config.group_id())
                .or_insert_with(|| config.factory_properties(defaults));

            let node = match config.def().create_node(&cancel, &key, properties, &mut session) {
                Ok(node) => node,
                Err(err) => {
                    if let TaskGraphError::FactorySetup { source, .. }
                    | TaskGraphError::NodeCreation { source, .. } = &err
                    {
                        self.properties.node_create_error_handler().on_error(&key, source);
                    }
                    return Err(err);
                }
            };

            debug!(node = %key, inputs = node.inputs().len(), "node created");
            graph.add_children(key, node.inputs().iter().cloned());
            nodes.push(node);

            tokio::task::yield_now().await;
        }

        let dag = DependencyDag::new(graph.build())?;
        info!(
            nodes = nodes.len(),
            edges = dag.dependency_graph().edge_count(),
            "task graph built"
        );
        self.executor_factory.create_executor(dag, nodes)
    }
}

impl<E> TaskGraphBuilder for CollectingTaskGraphBuilder<E>
where
    E: TaskGraphExecutorFactory,
    E::Executor: Send,
{
    type Executor = E::Executor;

    fn add_node(&mut self, key: TaskNodeKey) {
        self.roots.insert(key);
    }

    fn properties(&mut self) -> &mut TaskGraphBuilderProperties {
        &mut self.properties
    }

    fn build_graph(&self, cancel: CancellationToken) -> BoxFuture<'_, Result<Self::Executor>> {
        Box::pin(self.collect(cancel))
    }
}
