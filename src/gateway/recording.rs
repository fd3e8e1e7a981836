//! In-process gateway that records calls and replays queued responses.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use serde_json::{json, Value};

use super::Gateway;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// Replayed outcome: a body, or a failure status.
type Reply = std::result::Result<Value, u16>;

/// Fake gateway for reconciler tests.
///
/// Responses are queued per `(method, path)`. With nothing queued, GET
/// returns `[]` and every other method returns `{}`.
#[derive(Default)]
pub struct RecordingGateway {
    calls: RefCell<Vec<Call>>,
    replies: RefCell<HashMap<(&'static str, String), VecDeque<Reply>>>,
}

impl RecordingGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response body for the next matching call.
    pub fn reply(&self, method: &'static str, path: &str, body: Value) -> &Self {
        self.replies
            .borrow_mut()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Ok(body));
        self
    }

    /// Queue a failure status for the next matching call.
    pub fn fail(&self, method: &'static str, path: &str, status: u16) -> &Self {
        self.replies
            .borrow_mut()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Err(status));
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Calls other than GET.
    #[must_use]
    pub fn writes(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.method != "GET")
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    fn record(&self, method: &'static str, path: &str, body: Option<&Value>) -> Result<Value> {
        self.calls.borrow_mut().push(Call {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        let queued = self
            .replies
            .borrow_mut()
            .get_mut(&(method, path.to_string()))
            .and_then(VecDeque::pop_front);

        match queued {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(Error::Remote {
                method: method.to_string(),
                path: path.to_string(),
                status,
                body: String::new(),
            }),
            None if method == "GET" => Ok(json!([])),
            None => Ok(json!({})),
        }
    }
}

impl Gateway for RecordingGateway {
    fn get(&self, path: &str, _params: &[(&str, &str)]) -> Result<Value> {
        self.record("GET", path, None)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.record("POST", path, Some(body))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.record("PUT", path, Some(body))
    }

    fn delete(&self, path: &str) -> Result<Value> {
        self.record("DELETE", path, None)
    }
}
