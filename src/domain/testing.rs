//! In-memory `GraphApi` for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::GraphApi;
use crate::error::GraphError;

/// Replays queued responses per path. The last queued response for a path
/// is repeated once the queue drains; unscripted paths return 404.
#[derive(Default)]
pub struct ScriptedGraph {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, GraphError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, response: Result<Value, GraphError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn status(status: u16, retry_after: Option<u64>) -> GraphError {
        GraphError::Status {
            url: "scripted".to_string(),
            status,
            retry_after,
        }
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn replay(response: &Result<Value, GraphError>) -> Result<Value, GraphError> {
    match response {
        Ok(v) => Ok(v.clone()),
        Err(GraphError::Status {
            url,
            status,
            retry_after,
        }) => Err(GraphError::Status {
            url: url.clone(),
            status: *status,
            retry_after: *retry_after,
        }),
        Err(other) => Err(GraphError::Decode {
            url: "scripted".to_string(),
            message: other.to_string(),
        }),
    }
}

#[async_trait]
impl GraphApi for ScriptedGraph {
    async fn get(&self, path: &str, _token: &str) -> Result<Value, GraphError> {
        self.calls.lock().unwrap().push(path.to_string());

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => replay(queue.front().unwrap()),
            None => Err(Self::status(404, None)),
        }
    }
}
