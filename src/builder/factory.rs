// src/builder/factory.rs

//! Task factories and their registration.
//!
//! A [`TaskFactoryConfig`] registers, under one [`TaskFactoryKey`], a setup
//! routine producing a [`TaskFactory`]. The builder stores configs of
//! different output and argument types side by side; the typed parts are
//! hidden behind [`FactoryDef`] and recovered with checked downcasts when a
//! node is created.

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::builder::inputs::{DiscoverySession, TaskInputBinder, TaskNodeCreateArgs};
use crate::builder::properties::{TaskFactoryGroupConfigurer, TaskFactoryProperties, TaskNodeProperties};
use crate::cancel::CancellationToken;
use crate::errors::{TaskError, TaskGraphError};
use crate::key::{TaskFactoryKey, TaskNodeKey};
use crate::node::{AnyTaskNode, CancelableFunction, NodeTaskRef, TaskNode};

/// Creates the function of one node. Inputs of the node are declared through
/// `args.inputs()` while this runs.
pub trait TaskFactory<R, I>: Send + Sync {
    fn create_task_node(
        &self,
        cancel: &CancellationToken,
        args: &mut TaskNodeCreateArgs<'_, I>,
    ) -> Result<CancelableFunction<R>, TaskError>;
}

/// A [`TaskFactory`] backed by a closure; see [`task_factory`].
pub struct FnTaskFactory<R, I, F> {
    create: F,
    _types: PhantomData<fn(&I) -> R>,
}

/// Wrap a closure as a [`TaskFactory`].
pub fn task_factory<R, I, F>(create: F) -> FnTaskFactory<R, I, F>
where
    F: Fn(&CancellationToken, &mut TaskNodeCreateArgs<'_, I>) -> Result<CancelableFunction<R>, TaskError>
        + Send
        + Sync,
{
    FnTaskFactory {
        create,
        _types: PhantomData,
    }
}

impl<R, I, F> TaskFactory<R, I> for FnTaskFactory<R, I, F>
where
    F: Fn(&CancellationToken, &mut TaskNodeCreateArgs<'_, I>) -> Result<CancelableFunction<R>, TaskError>
        + Send
        + Sync,
{
    fn create_task_node(
        &self,
        cancel: &CancellationToken,
        args: &mut TaskNodeCreateArgs<'_, I>,
    ) -> Result<CancelableFunction<R>, TaskError> {
        (self.create)(cancel, args)
    }
}

/// Type-erased factory registration.
pub(crate) trait FactoryDef: Send + Sync {
    fn create_node(
        &self,
        cancel: &CancellationToken,
        key: &TaskNodeKey,
        properties: &TaskFactoryProperties,
        session: &mut DiscoverySession,
    ) -> Result<Arc<dyn AnyTaskNode>, TaskGraphError>;
}

struct TypedFactoryDef<R, I, S, F> {
    setup: S,
    _types: PhantomData<fn(&I) -> (R, F)>,
}

impl<R, I, S, F> FactoryDef for TypedFactoryDef<R, I, S, F>
where
    R: Clone + Send + Sync + 'static,
    I: Any + Send + Sync,
    S: Fn(&TaskFactoryProperties) -> Result<F, TaskError> + Send + Sync,
    F: TaskFactory<R, I>,
{
    fn create_node(
        &self,
        cancel: &CancellationToken,
        key: &TaskNodeKey,
        properties: &TaskFactoryProperties,
        session: &mut DiscoverySession,
    ) -> Result<Arc<dyn AnyTaskNode>, TaskGraphError> {
        let node_error = |source: TaskError| TaskGraphError::NodeCreation {
            key: key.clone(),
            source,
        };

        let factory = (self.setup)(properties).map_err(|source| TaskGraphError::FactorySetup {
            key: key.clone(),
            source,
        })?;

        let factory_arg = key.factory_arg().downcast_ref::<I>().ok_or_else(|| {
            node_error(TaskError::ArgumentMismatch {
                key: key.clone(),
                expected: type_name::<I>(),
            })
        })?;

        let mut args = TaskNodeCreateArgs::new(
            key,
            factory_arg,
            TaskNodeProperties::from(properties),
            TaskInputBinder::new(session),
        );
        let function = factory
            .create_task_node(cancel, &mut args)
            .map_err(node_error)?;
        let (node_properties, inputs) = args.into_parts();

        let future = session.future_for::<R>(key).map_err(node_error)?;
        let task_ref = NodeTaskRef::new(node_properties.into_executor(), function);
        Ok(Arc::new(TaskNode::with_future(
            key.clone(),
            inputs,
            task_ref,
            future,
        )))
    }
}

/// How to create the factory registered under one factory key.
#[derive(Clone)]
pub struct TaskFactoryConfig {
    factory_key: TaskFactoryKey,
    configurer: Arc<dyn TaskFactoryGroupConfigurer>,
    def: Arc<dyn FactoryDef>,
}

impl TaskFactoryConfig {
    /// `setup` runs once for every node of this factory, with the properties
    /// of the factory's group.
    pub fn new<R, I, S, F>(
        factory_key: TaskFactoryKey,
        configurer: Arc<dyn TaskFactoryGroupConfigurer>,
        setup: S,
    ) -> Self
    where
        R: Clone + Send + Sync + 'static,
        I: Any + Send + Sync,
        S: Fn(&TaskFactoryProperties) -> Result<F, TaskError> + Send + Sync + 'static,
        F: TaskFactory<R, I> + 'static,
    {
        Self {
            factory_key,
            configurer,
            def: Arc::new(TypedFactoryDef::<R, I, S, F> {
                setup,
                _types: PhantomData,
            }),
        }
    }

    pub fn factory_key(&self) -> &TaskFactoryKey {
        &self.factory_key
    }

    pub fn configurer(&self) -> &Arc<dyn TaskFactoryGroupConfigurer> {
        &self.configurer
    }

    /// Identity of the configurer; factories sharing it form one group.
    pub(crate) fn group_id(&self) -> usize {
        Arc::as_ptr(&self.configurer) as *const () as usize
    }

    pub(crate) fn factory_properties(&self, defaults: &TaskFactoryProperties) -> TaskFactoryProperties {
        let mut properties = defaults.clone();
        self.configurer.configure(&mut properties);
        properties
    }

    pub(crate) fn def(&self) -> &dyn FactoryDef {
        self.def.as_ref()
    }
}

impl fmt::Debug for TaskFactoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFactoryConfig")
            .field("factory_key", &self.factory_key)
            .finish_non_exhaustive()
    }
}
