#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use taskgraph::builder::{DefaultGroup, TaskFactoryConfig, task_factory};
use taskgraph::config::{ExecutorSection, GraphFile, TaskConfig};
use taskgraph::{CancelableFunction, TaskError, TaskFactoryKey, TaskNodeKey};

pub fn test_factory_key(name: &'static str) -> TaskFactoryKey {
    TaskFactoryKey::new::<String, String>(name)
}

pub fn test_node(factory: &'static str, arg: &str) -> TaskNodeKey {
    test_factory_key(factory).node_key(arg.to_string())
}

/// Output of nodes created by [`TestFactories`]: the node's argument, followed
/// by the consumed inputs in binding order, e.g. `c(c.a,c.b)`.
pub fn render_output(arg: &str, inputs: &[String]) -> String {
    if inputs.is_empty() {
        arg.to_string()
    } else {
        format!("{arg}({})", inputs.join(","))
    }
}

/// Registry of `String -> String` test factories that records which node
/// functions ran, in order.
#[derive(Clone, Default)]
pub struct TestFactories {
    configs: Vec<TaskFactoryConfig>,
    runs: Arc<Mutex<Vec<TaskNodeKey>>>,
}

impl TestFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory `name` whose node `arg` binds `deps(arg)` and outputs
    /// [`render_output`] of what it consumed.
    pub fn add<D>(self, name: &'static str, deps: D) -> Self
    where
        D: Fn(&str) -> Vec<TaskNodeKey> + Send + Sync + 'static,
    {
        self.add_with(name, deps, |arg, inputs| Ok(render_output(arg, &inputs)))
    }

    pub fn add_leaf(self, name: &'static str) -> Self {
        self.add(name, |_| Vec::new())
    }

    /// Like [`add`](Self::add), but every node of the factory fails with
    /// `message` after consuming its inputs.
    pub fn add_failing<D>(self, name: &'static str, deps: D, message: &'static str) -> Self
    where
        D: Fn(&str) -> Vec<TaskNodeKey> + Send + Sync + 'static,
    {
        self.add_with(name, deps, move |_, _| {
            Err(TaskError::failed(anyhow::anyhow!(message)))
        })
    }

    /// Leaf factory whose nodes wait for cancellation and then report it.
    pub fn add_blocking(mut self, name: &'static str) -> Self {
        let runs = Arc::clone(&self.runs);
        let config = TaskFactoryConfig::new::<String, String, _, _>(
            test_factory_key(name),
            Arc::new(DefaultGroup),
            move |_| {
                let runs = Arc::clone(&runs);
                Ok(task_factory::<String, String, _>(move |_cancel, args| {
                    let key = args.node_key().clone();
                    let runs = Arc::clone(&runs);
                    Ok(CancelableFunction::new(move |cancel| async move {
                        runs.lock().unwrap().push(key);
                        cancel.cancelled().await;
                        Err(TaskError::Canceled)
                    }))
                }))
            },
        );
        self.configs.push(config);
        self
    }

    fn add_with<D, O>(mut self, name: &'static str, deps: D, output: O) -> Self
    where
        D: Fn(&str) -> Vec<TaskNodeKey> + Send + Sync + 'static,
        O: Fn(&str, Vec<String>) -> Result<String, TaskError> + Send + Sync + 'static,
    {
        let deps = Arc::new(deps);
        let output = Arc::new(output);
        let runs = Arc::clone(&self.runs);
        let config = TaskFactoryConfig::new::<String, String, _, _>(
            test_factory_key(name),
            Arc::new(DefaultGroup),
            move |_| {
                let deps = Arc::clone(&deps);
                let output = Arc::clone(&output);
                let runs = Arc::clone(&runs);
                Ok(task_factory::<String, String, _>(move |_cancel, args| {
                    let arg = args.factory_arg().clone();
                    let key = args.node_key().clone();
                    let inputs = (*deps)(&arg)
                        .into_iter()
                        .map(|dep| args.inputs().bind_input::<String>(dep))
                        .collect::<Result<Vec<_>, _>>()?;

                    let runs = Arc::clone(&runs);
                    let output = Arc::clone(&output);
                    Ok(CancelableFunction::new(move |_| async move {
                        runs.lock().unwrap().push(key);
                        let mut consumed = Vec::with_capacity(inputs.len());
                        for input in inputs {
                            consumed.push(input.consume_input().await?);
                        }
                        (*output)(&arg, consumed)
                    }))
                }))
            },
        );
        self.configs.push(config);
        self
    }

    pub fn configs(&self) -> Vec<TaskFactoryConfig> {
        self.configs.clone()
    }

    /// Keys of the node functions that ran, in the order they started.
    pub fn runs(&self) -> Vec<TaskNodeKey> {
        self.runs.lock().unwrap().clone()
    }

    pub fn run_count(&self, key: &TaskNodeKey) -> usize {
        self.runs().iter().filter(|run| *run == key).count()
    }
}

pub fn chain_factory_key() -> TaskFactoryKey {
    TaskFactoryKey::new::<String, u32>("F1")
}

/// Factory "F1": node `F1:n` binds `F1:(n-1)`, `F1:0` is a leaf. Each node
/// outputs `n` followed by the output it consumed, e.g. `2<-1<-0`.
pub fn chain_config() -> TaskFactoryConfig {
    TaskFactoryConfig::new::<String, u32, _, _>(chain_factory_key(), Arc::new(DefaultGroup), |_| {
        Ok(task_factory::<String, u32, _>(|_cancel, args| {
            let n = *args.factory_arg();
            let input = if n == 0 {
                None
            } else {
                Some(args.inputs().bind_input::<String>(chain_factory_key().node_key(n - 1))?)
            };
            Ok(CancelableFunction::new(move |_| async move {
                match input {
                    None => Ok(n.to_string()),
                    Some(input) => Ok(format!("{n}<-{}", input.consume_input().await?)),
                }
            }))
        }))
    })
}

/// Builder for `GraphFile` to simplify test setup.
#[derive(Debug, Default)]
pub struct GraphFileBuilder {
    graph: GraphFile,
}

impl GraphFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, name: &str, cmd: &str, after: &[&str]) -> Self {
        self.graph.task.insert(
            name.to_string(),
            TaskConfig {
                cmd: cmd.to_string(),
                after: after.iter().map(|dep| dep.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_executor(mut self, executor: ExecutorSection) -> Self {
        self.graph.executor = executor;
        self
    }

    pub fn build(self) -> GraphFile {
        self.graph
    }
}

/// Write `contents` as `Taskgraph.toml` into `dir`.
pub fn write_graph_file(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("Taskgraph.toml");
    std::fs::write(&path, contents).expect("writing graph file");
    path
}
