//! Course syllabus.
//!
//! `syllabus.md` is sent as the course's syllabus body exactly as written.

use serde_json::json;
use tracing::info;

use super::{Outcome, Reconciler};
use crate::catalog::SYLLABUS_FILE;
use crate::error::{Error, Result};
use crate::gateway::course_path;
use crate::model::{Course, RemoteId};

impl Reconciler<'_> {
    /// Replace the course's syllabus with `syllabus.md`.
    ///
    /// Assignment group weights are switched on with it, so weighted groups
    /// pushed alongside take effect.
    ///
    /// # Errors
    ///
    /// Returns `InvalidItem` without a syllabus file and a remote error when
    /// the course rejects the update.
    pub fn push_syllabus(&mut self, course: &Course) -> Result<Outcome> {
        let course_id = course.canvas_id;
        let body = self.catalog.read_syllabus()?.ok_or_else(|| Error::InvalidItem {
            path: SYLLABUS_FILE.to_string(),
            reason: "file not found".to_string(),
        })?;
        let path = course_path(course_id);

        if self.ctx.dry_run {
            self.plan(format!("PUT {path}: update syllabus ({} bytes)", body.len()));
            return Ok(Outcome::Planned);
        }

        let payload = json!({
            "course": {
                "syllabus_body": body,
                "apply_assignment_group_weights": true,
            }
        });
        self.gateway.put(&path, &payload)?;
        info!(course_id, bytes = body.len(), "syllabus updated");

        Ok(Outcome::Updated {
            remote_id: RemoteId::from(course_id),
        })
    }
}
