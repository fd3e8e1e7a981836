//! Registered remote courses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A remote course that content is pushed to and pulled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub canvas_id: i64,
    pub name: String,
    pub code: String,
    pub workflow_state: String,
}

impl Course {
    /// Build from a `GET /courses/{id}` response.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedResponse` if the response has no numeric `id`.
    pub fn from_remote(body: &Value) -> Result<Self> {
        let canvas_id = body
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::UnexpectedResponse {
                item: "course".to_string(),
                body: body.to_string(),
            })?;
        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            canvas_id,
            name: text("name"),
            code: text("course_code"),
            workflow_state: text("workflow_state"),
        })
    }

    /// Whether `search` selects this course: an exact id, or every
    /// whitespace-separated term appears in the course code.
    #[must_use]
    pub fn matches(&self, search: &str) -> bool {
        let search = search.trim();
        if let Ok(id) = search.parse::<i64>() {
            if id == self.canvas_id {
                return true;
            }
        }
        let mut terms = search.split_whitespace().peekable();
        terms.peek().is_some() && terms.all(|term| self.code.contains(term))
    }
}

impl std::fmt::Display for Course {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.canvas_id, self.name, self.code, self.workflow_state
        )
    }
}

/// Extract the course id from a course URL or a bare id.
///
/// # Errors
///
/// Returns `InvalidArgument` when the last path segment is not a number.
pub fn parse_course_id(url: &str) -> Result<i64> {
    let trimmed = url.trim();
    let path = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<i64>().ok())
        .ok_or_else(|| Error::InvalidArgument(format!("Invalid course url {url}")))
}
