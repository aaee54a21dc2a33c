// src/builder/inputs.rs

//! What a factory sees while it creates a node: the factory argument, the
//! node's properties and the binder declaring the node's inputs.

use std::any::{Any, type_name};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::builder::properties::TaskNodeProperties;
use crate::errors::TaskError;
use crate::key::TaskNodeKey;
use crate::node::NodeFuture;

/// Discovery state of one `build_graph` call: the work-list of keys still to
/// materialize and the result cells shared between a node and the input
/// references pointing at it.
#[derive(Default)]
pub(crate) struct DiscoverySession {
    cells: HashMap<TaskNodeKey, Arc<dyn Any + Send + Sync>>,
    queue: VecDeque<TaskNodeKey>,
    seen: HashSet<TaskNodeKey>,
}

impl DiscoverySession {
    /// Queue `key` unless it was queued before.
    pub(crate) fn enqueue(&mut self, key: &TaskNodeKey) {
        if self.seen.insert(key.clone()) {
            self.queue.push_back(key.clone());
        }
    }

    pub(crate) fn next_key(&mut self) -> Option<TaskNodeKey> {
        self.queue.pop_front()
    }

    pub(crate) fn discovered(&self) -> usize {
        self.seen.len()
    }

    /// Result cell of `key`, created on first use.
    pub(crate) fn future_for<R>(&mut self, key: &TaskNodeKey) -> Result<Arc<NodeFuture<R>>, TaskError>
    where
        R: Clone + Send + Sync + 'static,
    {
        let cell = self
            .cells
            .entry(key.clone())
            .or_insert_with(|| Arc::new(NodeFuture::<R>::new(key.clone())) as Arc<dyn Any + Send + Sync>);

        Arc::clone(cell)
            .downcast::<NodeFuture<R>>()
            .map_err(|_| TaskError::TypeMismatch {
                key: key.clone(),
                expected: type_name::<R>(),
                actual: key.factory_key().output_type().name(),
            })
    }
}

/// Declares the inputs of the node being created.
pub struct TaskInputBinder<'a> {
    session: &'a mut DiscoverySession,
    inputs: IndexSet<TaskNodeKey>,
}

impl<'a> TaskInputBinder<'a> {
    pub(crate) fn new(session: &'a mut DiscoverySession) -> Self {
        Self {
            session,
            inputs: IndexSet::new(),
        }
    }

    /// Make `key` a dependency of the node being created.
    ///
    /// The returned reference yields the dependency's value once it is
    /// consumed from within the node's function. Fails if `key` does not
    /// produce `R`.
    pub fn bind_input<R>(&mut self, key: TaskNodeKey) -> Result<TaskInputRef<R>, TaskError>
    where
        R: Clone + Send + Sync + 'static,
    {
        let output_type = key.factory_key().output_type();
        if !output_type.is::<R>() {
            return Err(TaskError::TypeMismatch {
                key,
                expected: type_name::<R>(),
                actual: output_type.name(),
            });
        }

        let future = self.session.future_for::<R>(&key)?;
        self.session.enqueue(&key);
        self.inputs.insert(key.clone());
        Ok(TaskInputRef { key, future })
    }

    pub fn bound_inputs(&self) -> impl Iterator<Item = &TaskNodeKey> {
        self.inputs.iter()
    }

    fn into_inputs(self) -> Vec<TaskNodeKey> {
        self.inputs.into_iter().collect()
    }
}

/// A bound input of a node. Consuming it waits for the dependency to settle.
pub struct TaskInputRef<R> {
    key: TaskNodeKey,
    future: Arc<NodeFuture<R>>,
}

impl<R> TaskInputRef<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn key(&self) -> &TaskNodeKey {
        &self.key
    }

    /// Wait for the bound node and return its value, or the error it failed
    /// with.
    pub async fn consume_input(self) -> Result<R, TaskError> {
        self.future.wait().await
    }
}

impl<R> fmt::Debug for TaskInputRef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInputRef").field("key", &self.key).finish()
    }
}

/// Arguments of [`crate::builder::TaskFactory::create_task_node`].
pub struct TaskNodeCreateArgs<'a, I> {
    key: &'a TaskNodeKey,
    factory_arg: &'a I,
    properties: TaskNodeProperties,
    inputs: TaskInputBinder<'a>,
}

impl<'a, I> TaskNodeCreateArgs<'a, I> {
    pub(crate) fn new(
        key: &'a TaskNodeKey,
        factory_arg: &'a I,
        properties: TaskNodeProperties,
        inputs: TaskInputBinder<'a>,
    ) -> Self {
        Self {
            key,
            factory_arg,
            properties,
            inputs,
        }
    }

    pub fn node_key(&self) -> &TaskNodeKey {
        self.key
    }

    pub fn factory_arg(&self) -> &I {
        self.factory_arg
    }

    pub fn properties(&mut self) -> &mut TaskNodeProperties {
        &mut self.properties
    }

    pub fn inputs(&mut self) -> &mut TaskInputBinder<'a> {
        &mut self.inputs
    }

    pub(crate) fn into_parts(self) -> (TaskNodeProperties, Vec<TaskNodeKey>) {
        (self.properties, self.inputs.into_inputs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::TaskFactoryKey;

    #[test]
    fn binding_registers_edge_and_enqueues_once() {
        let mut session = DiscoverySession::default();
        let dep = TaskFactoryKey::of::<u32, u32>().node_key(0u32);
        {
            let mut binder = TaskInputBinder::new(&mut session);
            binder.bind_input::<u32>(dep.clone()).unwrap();
            binder.bind_input::<u32>(dep.clone()).unwrap();
            assert_eq!(binder.bound_inputs().count(), 1);
        }

        assert_eq!(session.next_key(), Some(dep));
        assert_eq!(session.next_key(), None);
    }

    #[test]
    fn binding_with_wrong_type_fails() {
        let mut session = DiscoverySession::default();
        let dep = TaskFactoryKey::of::<u32, u32>().node_key(0u32);
        let mut binder = TaskInputBinder::new(&mut session);

        match binder.bind_input::<String>(dep) {
            Err(TaskError::TypeMismatch { expected, .. }) => assert!(expected.contains("String")),
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn consume_waits_for_the_shared_cell() {
        let mut session = DiscoverySession::default();
        let dep = TaskFactoryKey::of::<u32, u32>().node_key(0u32);
        let input = TaskInputBinder::new(&mut session)
            .bind_input::<u32>(dep.clone())
            .unwrap();

        session.future_for::<u32>(&dep).unwrap().complete(5);
        assert_eq!(input.consume_input().await.unwrap(), 5);
    }
}
