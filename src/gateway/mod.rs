//! Remote LMS access.
//!
//! The reconciler talks to the remote course only through [`Gateway`].
//! [`HttpGateway`] is the real implementation; tests use a recording fake.
//!
//! # Missing items
//!
//! The remote API reports "already deleted" and "no such item" as a decoded
//! body carrying an `errors` list, not as a transport failure. Gateways hand
//! such bodies back as `Ok` and callers inspect them with [`reports_missing`].

mod http;
#[cfg(test)]
pub mod recording;

pub use http::{parse_next_link, HttpGateway, Pages};

use crate::error::Result;
use serde_json::Value;

/// Root of every API path.
pub const API: &str = "/api/v1";

/// Stream of decoded list entries, fetched page by page.
pub type Entries<'a> = Box<dyn Iterator<Item = Result<Value>> + 'a>;

/// Blocking access to the remote REST API.
///
/// Paths are absolute API paths (`/api/v1/...`). Bodies are JSON.
pub trait Gateway {
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected status.
    fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value>;

    /// Every entry of a collection, following pagination.
    ///
    /// The default reads a single page.
    fn list<'a>(&'a self, path: &str, params: &[(&str, &str)]) -> Entries<'a> {
        match self.get(path, params) {
            Ok(Value::Array(entries)) => Box::new(entries.into_iter().map(Ok)),
            Ok(Value::Null) => Box::new(std::iter::empty()),
            Ok(other) => Box::new(std::iter::once(Ok(other))),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected status.
    fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected status.
    fn put(&self, path: &str, body: &Value) -> Result<Value>;

    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected status.
    fn delete(&self, path: &str) -> Result<Value>;
}

/// `/api/v1/courses/{course_id}`
#[must_use]
pub fn course_path(course_id: i64) -> String {
    format!("{API}/courses/{course_id}")
}

/// Whether a decoded response says the addressed item does not exist.
#[must_use]
pub fn reports_missing(body: &Value) -> bool {
    let says_missing = |message: &str| {
        let message = message.to_lowercase();
        message.contains("does not exist") || message.contains("not found")
    };

    if let Some(errors) = body.get("errors") {
        let messages: Vec<&str> = match errors {
            Value::Array(list) => list
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str).or_else(|| e.as_str()))
                .collect(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        };
        return messages.into_iter().any(says_missing);
    }

    body.get("message")
        .and_then(Value::as_str)
        .is_some_and(says_missing)
}
