// src/builder/properties.rs

use std::fmt;
use std::sync::Arc;

use crate::exec::{SpawnExecutor, TaskExecutor};
use crate::node::{TaskErrorHandler, logging_error_handler};

/// Settings shared by every node of one factory (or group of factories).
#[derive(Clone)]
pub struct TaskFactoryProperties {
    default_executor: Arc<dyn TaskExecutor>,
}

impl TaskFactoryProperties {
    pub fn new(default_executor: Arc<dyn TaskExecutor>) -> Self {
        Self { default_executor }
    }

    /// Executor nodes run on unless their factory picks another one.
    pub fn default_executor(&self) -> &Arc<dyn TaskExecutor> {
        &self.default_executor
    }

    pub fn set_default_executor(&mut self, executor: Arc<dyn TaskExecutor>) -> &mut Self {
        self.default_executor = executor;
        self
    }
}

impl Default for TaskFactoryProperties {
    fn default() -> Self {
        Self::new(Arc::new(SpawnExecutor::new()))
    }
}

impl fmt::Debug for TaskFactoryProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFactoryProperties").finish_non_exhaustive()
    }
}

/// Settings of a single node, seeded from its factory's properties.
#[derive(Clone)]
pub struct TaskNodeProperties {
    executor: Arc<dyn TaskExecutor>,
}

impl TaskNodeProperties {
    pub fn executor(&self) -> &Arc<dyn TaskExecutor> {
        &self.executor
    }

    pub fn set_executor(&mut self, executor: Arc<dyn TaskExecutor>) -> &mut Self {
        self.executor = executor;
        self
    }

    pub(crate) fn into_executor(self) -> Arc<dyn TaskExecutor> {
        self.executor
    }
}

impl From<&TaskFactoryProperties> for TaskNodeProperties {
    fn from(factory: &TaskFactoryProperties) -> Self {
        Self {
            executor: Arc::clone(&factory.default_executor),
        }
    }
}

impl fmt::Debug for TaskNodeProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNodeProperties").finish_non_exhaustive()
    }
}

/// Adjusts the properties of a group of factories. Factories sharing one
/// configurer (the same `Arc`) get it applied once per build.
pub trait TaskFactoryGroupConfigurer: Send + Sync {
    fn configure(&self, properties: &mut TaskFactoryProperties);
}

impl<F> TaskFactoryGroupConfigurer for F
where
    F: Fn(&mut TaskFactoryProperties) + Send + Sync,
{
    fn configure(&self, properties: &mut TaskFactoryProperties) {
        self(properties)
    }
}

/// Leaves the builder's default factory properties untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGroup;

impl TaskFactoryGroupConfigurer for DefaultGroup {
    fn configure(&self, _properties: &mut TaskFactoryProperties) {}
}

#[derive(Clone)]
pub struct TaskGraphBuilderProperties {
    default_factory_properties: TaskFactoryProperties,
    node_create_error_handler: Arc<dyn TaskErrorHandler>,
}

impl TaskGraphBuilderProperties {
    pub fn default_factory_properties(&self) -> &TaskFactoryProperties {
        &self.default_factory_properties
    }

    pub fn default_factory_properties_mut(&mut self) -> &mut TaskFactoryProperties {
        &mut self.default_factory_properties
    }

    /// Told about every node whose factory setup or creation failed.
    pub fn node_create_error_handler(&self) -> &Arc<dyn TaskErrorHandler> {
        &self.node_create_error_handler
    }

    pub fn set_node_create_error_handler(&mut self, handler: Arc<dyn TaskErrorHandler>) -> &mut Self {
        self.node_create_error_handler = handler;
        self
    }
}

impl Default for TaskGraphBuilderProperties {
    fn default() -> Self {
        Self {
            default_factory_properties: TaskFactoryProperties::default(),
            node_create_error_handler: logging_error_handler(),
        }
    }
}

impl fmt::Debug for TaskGraphBuilderProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGraphBuilderProperties")
            .field("default_factory_properties", &self.default_factory_properties)
            .finish_non_exhaustive()
    }
}
