// src/builder/mod.rs

//! Graph discovery: factories, node creation arguments and the collecting
//! builder.

pub mod collecting;
pub mod factory;
pub mod inputs;
pub mod properties;

pub use collecting::{CollectingTaskGraphBuilder, TaskGraphBuilder, TaskGraphExecutorFactory};
pub use factory::{FnTaskFactory, TaskFactory, TaskFactoryConfig, task_factory};
pub use inputs::{TaskInputBinder, TaskInputRef, TaskNodeCreateArgs};
pub use properties::{
    DefaultGroup, TaskFactoryGroupConfigurer, TaskFactoryProperties, TaskGraphBuilderProperties,
    TaskNodeProperties,
};
