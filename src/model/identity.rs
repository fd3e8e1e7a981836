//! Remote identifiers and the local↔remote identity record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque remote identifier: a numeric id or a url slug, kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Read an id out of a JSON value (number or string).
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON form for request bodies: a number when the id is numeric.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.0
            .parse::<i64>()
            .map_or_else(|_| Value::String(self.0.clone()), Value::from)
    }
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for RemoteId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Links one local item to its remote counterpart within one course.
///
/// At most one record exists per `(local_name, course_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub local_name: String,
    pub course_id: i64,
    pub remote_id: RemoteId,
    /// Creation timestamp (Unix milliseconds)
    #[serde(default)]
    pub created_at: i64,
    /// Last relink timestamp (Unix milliseconds)
    #[serde(default)]
    pub updated_at: i64,
}
