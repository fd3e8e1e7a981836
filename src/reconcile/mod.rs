//! Reconciliation between the local catalog and a remote course.
//!
//! The [`Reconciler`] pushes local items to a course, pulls remote items
//! into the catalog, and removes tracked items, keeping the identity store
//! consistent with both sides.
//!
//! # Dry run
//!
//! With `dry_run` set, every remote write, identity write and catalog write
//! is replaced by a statement of what would have happened. Statements are
//! collected and handed to the caller with [`Reconciler::take_planned`].
//! Local checks such as reference resolution still run.

mod batch;
mod hooks;
mod navigation;
mod syllabus;

pub use batch::{pull_batch, push_batch, remove_batch, BatchReport, Done, Failure, PullTarget, PushTarget};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::config::SyncContext;
use crate::error::{Error, Result};
use crate::gateway::{course_path, reports_missing, Gateway};
use crate::model::naming::{child_prefix, split_child, synthesize_local_name};
use crate::model::{Course, Fields, IdRule, IdentityRecord, Item, ItemKind, Phase, RemoteId};
use crate::storage::SqliteStorage;

/// What a single push or remove did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Outcome {
    Created { remote_id: RemoteId },
    Updated { remote_id: RemoteId },
    Removed { remote_id: RemoteId },
    Pulled,
    /// Navigation tabs were moved or hidden.
    Arranged { changed: usize, hidden: Vec<String> },
    /// Dry run: nothing was changed.
    Planned,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created { remote_id } => write!(f, "created {remote_id}"),
            Self::Updated { remote_id } => write!(f, "updated {remote_id}"),
            Self::Removed { remote_id } => write!(f, "removed {remote_id}"),
            Self::Pulled => write!(f, "pulled"),
            Self::Arranged { changed, hidden } => {
                write!(f, "{changed} tabs changed, {} hidden", hidden.len())
            }
            Self::Planned => write!(f, "planned"),
        }
    }
}

/// Drives push, pull and remove for one command invocation.
pub struct Reconciler<'a> {
    storage: &'a mut SqliteStorage,
    gateway: &'a dyn Gateway,
    catalog: &'a dyn Catalog,
    ctx: &'a SyncContext,
    planned: Vec<String>,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(
        storage: &'a mut SqliteStorage,
        gateway: &'a dyn Gateway,
        catalog: &'a dyn Catalog,
        ctx: &'a SyncContext,
    ) -> Self {
        Self {
            storage,
            gateway,
            catalog,
            ctx,
            planned: Vec::new(),
        }
    }

    /// Drain the dry-run statements collected so far.
    pub fn take_planned(&mut self) -> Vec<String> {
        std::mem::take(&mut self.planned)
    }

    fn plan(&mut self, what: String) {
        info!(dry_run = true, "{what}");
        self.planned.push(what);
    }

    // ==========
    // Push
    // ==========

    /// Make the remote course reflect `item`.
    ///
    /// Creates the item remotely when it has no identity record in the
    /// course, otherwise merges it over the catalog copy and updates it.
    ///
    /// # Errors
    ///
    /// Returns `ParentNotPushed` for a nested item whose parent has no
    /// identity record (no remote call is made), `ReferenceResolution` when a
    /// local reference cannot be resolved, `RemoteStateDesync` when the
    /// tracked remote item is gone, and `UnexpectedResponse` when a create
    /// response carries no id.
    pub fn push(&mut self, item: &Item, course: &Course) -> Result<Outcome> {
        if item.kind == ItemKind::NavigationTab {
            return self.push_navigation(course);
        }

        let parent_id = self.parent_remote_id(item, course.canvas_id)?;
        match self.storage.find_identity(&item.local_name, course.canvas_id)? {
            None => self.create(item, course, parent_id.as_ref()),
            Some(record) => self.update(item, course, parent_id.as_ref(), record),
        }
    }

    fn create(&mut self, item: &Item, course: &Course, parent_id: Option<&RemoteId>) -> Result<Outcome> {
        let kind = item.kind;
        let course_id = course.canvas_id;
        if !kind.supports_create() {
            return Err(Error::InvalidArgument(format!(
                "{kind} items cannot be created remotely"
            )));
        }

        let mut outgoing = item.clone();
        let state = self.preprocess(&mut outgoing, course)?;
        let path = collection_path(kind, course_id, parent_id);

        if self.ctx.dry_run {
            self.plan(format!("POST {path}: create {item}"));
            self.plan(format!("track {} in course {course_id}", item.local_name));
            if kind.catalog_tracked() {
                self.plan(format!("write {}", item.local_name));
            }
            self.postprocess(&outgoing, course, None, &state)?;
            return Ok(Outcome::Planned);
        }

        let response = self.gateway.post(&path, &outgoing.payload(Phase::Create))?;
        let Some(remote_id) = extract_remote_id(kind, &response) else {
            error!(item = %item.local_name, course_id, body = %response, "create response has no remote id");
            return Err(Error::UnexpectedResponse {
                item: item.local_name.clone(),
                body: response.to_string(),
            });
        };

        if kind.catalog_tracked() {
            self.catalog.write(item)?;
        }
        self.storage
            .upsert_identity(&item.local_name, course_id, &remote_id, &self.ctx.actor)?;
        info!(item = %item.local_name, course_id, remote_id = %remote_id, "created");

        if let Some(body) = outgoing.deferred_payload() {
            let member = format!("{path}/{remote_id}");
            self.gateway.put(&member, &body)?;
        }

        self.postprocess(&outgoing, course, Some(&remote_id), &state)?;
        Ok(Outcome::Created { remote_id })
    }

    fn update(
        &mut self,
        item: &Item,
        course: &Course,
        parent_id: Option<&RemoteId>,
        record: IdentityRecord,
    ) -> Result<Outcome> {
        let kind = item.kind;
        let course_id = course.canvas_id;

        let stored = if kind.catalog_tracked() {
            self.catalog.read(&item.local_name)?
        } else {
            None
        };
        let merged = stored.map_or_else(|| item.clone(), |stored| stored.merged_with(item));

        let mut outgoing = merged.clone();
        let state = self.preprocess(&mut outgoing, course)?;
        let path = member_path(kind, course_id, parent_id, &record.remote_id);

        if self.ctx.dry_run {
            self.plan(format!("PUT {path}: update {merged}"));
            if kind.catalog_tracked() {
                self.plan(format!("write {}", item.local_name));
            }
            self.postprocess(&outgoing, course, Some(&record.remote_id), &state)?;
            return Ok(Outcome::Planned);
        }

        let response = self.gateway.put(&path, &outgoing.payload(Phase::Update))?;
        if reports_missing(&response) {
            warn!(item = %item.local_name, course_id, remote_id = %record.remote_id, "tracked item is gone remotely");
            return Err(Error::RemoteStateDesync {
                item: item.local_name.clone(),
                course_id,
                remote_id: record.remote_id.to_string(),
            });
        }

        let mut remote_id = record.remote_id;
        if kind.id_rule() == IdRule::Slug {
            if let Some(current) = extract_remote_id(kind, &response) {
                if current != remote_id {
                    info!(item = %item.local_name, old = %remote_id, new = %current, "slug changed");
                    self.storage
                        .upsert_identity(&item.local_name, course_id, &current, &self.ctx.actor)?;
                    remote_id = current;
                }
            }
        }

        if kind.catalog_tracked() {
            self.catalog.write(&merged)?;
        }
        info!(item = %item.local_name, course_id, remote_id = %remote_id, "updated");

        self.postprocess(&outgoing, course, Some(&remote_id), &state)?;
        Ok(Outcome::Updated { remote_id })
    }

    /// Remote id of a nested item's parent. `None` for top-level kinds.
    fn parent_remote_id(&self, item: &Item, course_id: i64) -> Result<Option<RemoteId>> {
        if item.kind.parent_kind().is_none() {
            return Ok(None);
        }

        let parent = item
            .parent
            .as_deref()
            .or_else(|| split_child(&item.local_name).map(|(parent, _)| parent))
            .ok_or_else(|| Error::InvalidItem {
                path: item.local_name.clone(),
                reason: format!("a {} needs a parent", item.kind),
            })?;

        match self.storage.find_identity(parent, course_id)? {
            Some(record) => Ok(Some(record.remote_id)),
            None => Err(Error::ParentNotPushed {
                item: item.local_name.clone(),
                parent: parent.to_string(),
                course_id,
            }),
        }
    }

    // ==========
    // Pull
    // ==========

    /// Fetch one remote item and write it to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for nested kinds, which are pulled with
    /// their parent, and a remote error when the item does not exist.
    pub fn pull_one(&mut self, kind: ItemKind, remote_id: &RemoteId, course: &Course) -> Result<Item> {
        if !kind.catalog_tracked() {
            return Err(Error::InvalidArgument(format!(
                "{kind} items are pulled with their parent"
            )));
        }

        let path = member_path(kind, course.canvas_id, None, remote_id);
        let body = self.gateway.get(&path, &[])?;
        if reports_missing(&body) {
            return Err(Error::Remote {
                method: "GET".to_string(),
                path,
                status: 404,
                body: body.to_string(),
            });
        }

        match body {
            Value::Object(fields) => self.pull_fields(kind, &fields, course),
            other => Err(Error::UnexpectedResponse {
                item: format!("{kind} {remote_id}"),
                body: other.to_string(),
            }),
        }
    }

    /// Refresh a tracked catalog item from its remote counterpart.
    ///
    /// # Errors
    ///
    /// Returns `NotTracked` when the item has no identity record in the course.
    pub fn pull_item(&mut self, item: &Item, course: &Course) -> Result<Item> {
        let record = self
            .storage
            .find_identity(&item.local_name, course.canvas_id)?
            .ok_or_else(|| Error::NotTracked {
                item: item.local_name.clone(),
                course_id: course.canvas_id,
            })?;
        self.pull_one(item.kind, &record.remote_id, course)
    }

    /// Pull every remote item of `kind`, page by page.
    ///
    /// Per-item failures are returned in place; store-level failures abort.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for nested kinds and any fatal error.
    pub fn pull_all(&mut self, kind: ItemKind, course: &Course) -> Result<Vec<Result<Item>>> {
        if !kind.catalog_tracked() {
            return Err(Error::InvalidArgument(format!(
                "{kind} items are pulled with their parent"
            )));
        }

        let gateway = self.gateway;
        let path = collection_path(kind, course.canvas_id, None);
        let mut pulled = Vec::new();

        for entry in gateway.list(&path, &[]) {
            let outcome = entry.and_then(|body| match body {
                Value::Object(fields) => self.pull_fields(kind, &fields, course),
                other => Err(Error::UnexpectedResponse {
                    item: path.clone(),
                    body: other.to_string(),
                }),
            });
            match outcome {
                Err(e) if e.is_fatal() => return Err(e),
                other => pulled.push(other),
            }
        }

        Ok(pulled)
    }

    fn pull_fields(&mut self, kind: ItemKind, remote: &Fields, course: &Course) -> Result<Item> {
        let course_id = course.canvas_id;
        let body = Value::Object(remote.clone());
        let remote_id = extract_remote_id(kind, &body).ok_or_else(|| Error::UnexpectedResponse {
            item: format!("{kind} in course {course_id}"),
            body: body.to_string(),
        })?;

        let known = self
            .storage
            .find_identity_by_remote_id(course_id, &remote_id, kind)?;
        let local_name = match &known {
            Some(record) => record.local_name.clone(),
            None => {
                let display = remote
                    .get(kind.display_field())
                    .and_then(Value::as_str)
                    .unwrap_or(remote_id.as_str());
                synthesize_local_name(kind, display)
            }
        };

        let mut item = Item::from_remote(kind, &local_name, remote);

        if let Some(group_id) = item.get("assignment_group_id").cloned() {
            if let Some(group) = self.group_reference(course_id, &group_id)? {
                item.unset("assignment_group_id");
                item.set("assignment_group", group);
            }
        }
        if kind == ItemKind::Module {
            let entries = self.pull_module_items(&local_name, course_id, &remote_id)?;
            if !entries.is_empty() {
                item.set("items", entries);
            }
        }

        // Local-only fields the remote cannot report survive a pull.
        if let Some(existing) = self.catalog.read(&local_name)? {
            for field in kind.local_fields() {
                if item.get(field).is_none() {
                    if let Some(value) = existing.get(field) {
                        item.set(*field, value.clone());
                    }
                }
            }
        }

        if self.ctx.dry_run {
            if known.is_none() {
                self.plan(format!("track {local_name} as {remote_id} in course {course_id}"));
            }
            self.plan(format!("write {local_name}"));
            return Ok(item);
        }

        if known.is_none() {
            self.storage
                .upsert_identity(&local_name, course_id, &remote_id, &self.ctx.actor)?;
        }
        self.catalog.write(&item)?;
        info!(item = %local_name, course_id, remote_id = %remote_id, "pulled");

        Ok(item)
    }

    /// Name of the assignment group with remote id `group_id`.
    ///
    /// Prefers the tracked catalog copy and falls back to the remote group.
    /// `None` when the group cannot be found on either side.
    fn group_reference(&self, course_id: i64, group_id: &Value) -> Result<Option<String>> {
        let Some(group_id) = RemoteId::from_value(group_id) else {
            return Ok(None);
        };

        let tracked = self
            .storage
            .find_identity_by_remote_id(course_id, &group_id, ItemKind::AssignmentGroup)?;
        if let Some(record) = tracked {
            if let Some(group) = self.catalog.read(&record.local_name)? {
                if let Some(name) = group.get_str("name") {
                    return Ok(Some(name.to_string()));
                }
            }
        }

        let path = member_path(ItemKind::AssignmentGroup, course_id, None, &group_id);
        let body = match self.gateway.get(&path, &[]) {
            Ok(body) => body,
            Err(Error::Remote { status: 404, .. }) => {
                warn!(course_id, group_id = %group_id, "assignment group not found remotely");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if reports_missing(&body) {
            warn!(course_id, group_id = %group_id, "assignment group not found remotely");
            return Ok(None);
        }
        Ok(body.get("name").and_then(Value::as_str).map(str::to_string))
    }

    // ==========
    // Remove
    // ==========

    /// Delete a tracked item remotely and forget it, children included.
    ///
    /// Remote deletion of children is best effort; their identity records
    /// are always cleared.
    ///
    /// # Errors
    ///
    /// Returns `NotTracked` (without any remote call) when the item has no
    /// identity record in the course.
    pub fn remove(&mut self, item: &Item, course: &Course) -> Result<Outcome> {
        let course_id = course.canvas_id;
        let Some(record) = self.storage.find_identity(&item.local_name, course_id)? else {
            return Err(Error::NotTracked {
                item: item.local_name.clone(),
                course_id,
            });
        };

        let parent_id = self.parent_remote_id(item, course_id)?;
        let path = member_path(item.kind, course_id, parent_id.as_ref(), &record.remote_id);
        let children = self
            .storage
            .find_identities_by_prefix(course_id, &child_prefix(&item.local_name))?;

        if self.ctx.dry_run {
            self.plan(format!("DELETE {path}: remove {item}"));
            self.plan(format!("forget {} in course {course_id}", item.local_name));
            for child in &children {
                self.plan(format!("forget {} in course {course_id}", child.local_name));
            }
            return Ok(Outcome::Planned);
        }

        // Children go first, while the parent still exists remotely.
        if let Some(child_kind) = item.kind.child_kind().filter(|_| !item.kind.remote_delete_cascades()) {
            for child in &children {
                let child_path = member_path(child_kind, course_id, Some(&record.remote_id), &child.remote_id);
                match self.gateway.delete(&child_path) {
                    Ok(_) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!(item = %child.local_name, course_id, error = %e, "could not delete child remotely"),
                }
            }
        }

        match self.gateway.delete(&path) {
            Ok(body) if reports_missing(&body) => {
                info!(item = %item.local_name, course_id, "already gone remotely");
            }
            Ok(_) => {}
            Err(Error::Remote { status: 404, .. }) => {
                info!(item = %item.local_name, course_id, "already gone remotely");
            }
            Err(e) => return Err(e),
        }
        self.storage
            .remove_identity(&item.local_name, course_id, &self.ctx.actor)?;
        info!(item = %item.local_name, course_id, remote_id = %record.remote_id, "removed");

        for child in children {
            self.storage
                .remove_identity(&child.local_name, course_id, &self.ctx.actor)?;
        }

        Ok(Outcome::Removed {
            remote_id: record.remote_id,
        })
    }
}

// ==========
// Paths
// ==========

/// Collection endpoint of `kind` in a course; nested kinds go under their parent.
#[must_use]
pub fn collection_path(kind: ItemKind, course_id: i64, parent_id: Option<&RemoteId>) -> String {
    let base = course_path(course_id);
    match (kind.parent_kind(), parent_id) {
        (Some(parent_kind), Some(parent_id)) => format!(
            "{base}/{}/{parent_id}/{}",
            parent_kind.collection(),
            kind.collection()
        ),
        _ => format!("{base}/{}", kind.collection()),
    }
}

#[must_use]
pub fn member_path(
    kind: ItemKind,
    course_id: i64,
    parent_id: Option<&RemoteId>,
    remote_id: &RemoteId,
) -> String {
    format!("{}/{remote_id}", collection_path(kind, course_id, parent_id))
}

/// Read the remote id out of a create/update/get response.
#[must_use]
pub fn extract_remote_id(kind: ItemKind, body: &Value) -> Option<RemoteId> {
    let field = match kind.id_rule() {
        IdRule::Id => "id",
        IdRule::Slug => "url",
    };
    body.get(field).and_then(RemoteId::from_value)
}
