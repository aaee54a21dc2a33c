use std::sync::{Arc, Mutex};

use taskgraph::node::TaskErrorHandler;
use taskgraph::{TaskError, TaskNodeKey};

/// Remembers every `on_error` call.
#[derive(Debug, Clone, Default)]
pub struct RecordingErrorHandler {
    calls: Arc<Mutex<Vec<(TaskNodeKey, TaskError)>>>,
}

impl RecordingErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(TaskNodeKey, TaskError)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<TaskNodeKey> {
        self.calls().into_iter().map(|(key, _)| key).collect()
    }

    pub fn handler(&self) -> Arc<dyn TaskErrorHandler> {
        Arc::new(self.clone())
    }
}

impl TaskErrorHandler for RecordingErrorHandler {
    fn on_error(&self, key: &TaskNodeKey, error: &TaskError) {
        self.calls.lock().unwrap().push((key.clone(), error.clone()));
    }
}
