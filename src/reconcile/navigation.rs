//! Course navigation tabs.
//!
//! `navigation.yaml` lists the visible tab labels in order. Tabs the file
//! does not list are hidden. Home and Settings cannot be moved or hidden and
//! are left alone.

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::{info, warn};

use super::{collection_path, Outcome, Reconciler};
use crate::catalog::NAVIGATION_FILE;
use crate::error::{Error, Result};
use crate::model::naming::child_name;
use crate::model::{Course, ItemKind, RemoteId};

const UNMANAGED_TABS: [&str; 2] = ["home", "settings"];

/// Position 1 belongs to Home.
const FIRST_POSITION: i64 = 2;

struct Tab {
    id: String,
    label: String,
    position: Option<i64>,
    hidden: bool,
}

impl Tab {
    fn from_remote(value: &Value) -> Option<Self> {
        Some(Self {
            id: value.get("id").and_then(Value::as_str)?.to_string(),
            label: value.get("label").and_then(Value::as_str)?.to_string(),
            position: value.get("position").and_then(Value::as_i64),
            hidden: value.get("hidden").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    fn managed(&self) -> bool {
        !UNMANAGED_TABS.contains(&self.id.as_str())
    }
}

impl Reconciler<'_> {
    fn fetch_tabs(&self, course_id: i64) -> Result<Vec<Tab>> {
        let path = collection_path(ItemKind::NavigationTab, course_id, None);
        let entries: Vec<Value> = self.gateway.list(&path, &[]).collect::<Result<_>>()?;
        Ok(entries.iter().filter_map(Tab::from_remote).collect())
    }

    /// Arrange the course's tabs to match `navigation.yaml`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidItem` without a navigation file and
    /// `ReferenceResolution` when a listed label matches no remote tab.
    pub fn push_navigation(&mut self, course: &Course) -> Result<Outcome> {
        let course_id = course.canvas_id;
        let labels = self.catalog.read_navigation()?.ok_or_else(|| Error::InvalidItem {
            path: NAVIGATION_FILE.to_string(),
            reason: "file not found".to_string(),
        })?;

        let mut wanted: HashMap<&str, i64> = HashMap::new();
        let mut position = FIRST_POSITION;
        for label in &labels {
            if label == "Home" || label == "Settings" {
                warn!(label = %label, "this tab cannot be managed; other tabs may be misplaced");
            }
            wanted.insert(label.as_str(), position);
            position += 1;
        }

        let tabs = self.fetch_tabs(course_id)?;
        if let Some(missing) = labels
            .iter()
            .find(|label| !tabs.iter().any(|tab| &tab.label == *label))
        {
            return Err(Error::ReferenceResolution {
                item: NAVIGATION_FILE.to_string(),
                reference: missing.clone(),
            });
        }

        let mut changed = 0;
        let mut hidden = Vec::new();
        for tab in tabs.iter().filter(|tab| tab.managed()) {
            let path = format!("{}/{}", collection_path(ItemKind::NavigationTab, course_id, None), tab.id);
            let local_name = child_name(NAVIGATION_FILE, &tab.id);

            let update = match wanted.get(tab.label.as_str()) {
                Some(&position) if tab.position != Some(position) || tab.hidden => {
                    Some(json!({"position": position, "hidden": false}))
                }
                Some(_) => None,
                None => {
                    hidden.push(tab.label.clone());
                    (!tab.hidden).then(|| json!({"hidden": true}))
                }
            };
            let visible = wanted.contains_key(tab.label.as_str());

            if self.ctx.dry_run {
                if let Some(body) = &update {
                    self.plan(format!("PUT {path}: {body}"));
                    changed += 1;
                }
                continue;
            }

            if let Some(body) = update {
                self.gateway.put(&path, &body)?;
                changed += 1;
                info!(tab = %tab.label, course_id, "tab updated");
            }
            if visible {
                self.storage
                    .upsert_identity(&local_name, course_id, &RemoteId::new(tab.id.as_str()), &self.ctx.actor)?;
            } else {
                self.storage
                    .remove_identity(&local_name, course_id, &self.ctx.actor)?;
            }
        }

        Ok(Outcome::Arranged { changed, hidden })
    }

    /// Write the course's visible tab labels, in position order, to
    /// `navigation.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tabs cannot be fetched or the file written.
    pub fn pull_navigation(&mut self, course: &Course) -> Result<Vec<String>> {
        let course_id = course.canvas_id;
        let mut tabs: Vec<Tab> = self
            .fetch_tabs(course_id)?
            .into_iter()
            .filter(|tab| tab.managed() && !tab.hidden)
            .collect();
        tabs.sort_by_key(|tab| tab.position.unwrap_or(i64::MAX));
        let labels: Vec<String> = tabs.iter().map(|tab| tab.label.clone()).collect();

        if self.ctx.dry_run {
            self.plan(format!("write {NAVIGATION_FILE} with {} tabs", labels.len()));
            return Ok(labels);
        }

        for tab in &tabs {
            self.storage.upsert_identity(
                &child_name(NAVIGATION_FILE, &tab.id),
                course_id,
                &RemoteId::new(tab.id.as_str()),
                &self.ctx.actor,
            )?;
        }
        self.catalog.write_navigation(&labels)?;
        Ok(labels)
    }
}
