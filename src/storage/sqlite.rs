//! SQLite storage implementation.
//!
//! Holds the identity store (local name ↔ remote id per course) and the
//! course registry. Every write goes through [`SqliteStorage::mutate`], which
//! wraps the change in an IMMEDIATE transaction and records audit events.

use crate::error::{Error, Result};
use crate::model::{naming, Course, IdentityRecord, ItemKind, RemoteId};
use crate::storage::events::{get_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::time::Duration;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, collecting audit events.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value)
                .with_comment(&self.op_name),
        );
    }
}

/// Audit entity id for an identity row.
fn identity_entity(course_id: i64, local_name: &str) -> String {
    format!("{course_id}:{local_name}")
}

/// Escape `%`, `_` and the escape char itself for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn map_identity(row: &Row<'_>) -> rusqlite::Result<IdentityRecord> {
    Ok(IdentityRecord {
        local_name: row.get(0)?,
        course_id: row.get(1)?,
        remote_id: RemoteId::new(row.get::<_, String>(2)?),
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn map_course(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        canvas_id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        workflow_state: row.get(3)?,
    })
}

const IDENTITY_COLUMNS: &str = "local_name, course_id, remote_id, created_at, updated_at";

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout (default 5 seconds).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout_ms.map_or(Duration::from_secs(5), Duration::from_millis))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// Begins an IMMEDIATE transaction, runs the closure, writes the audit
    /// events it recorded, then commits. Any error rolls everything back.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        Ok(result)
    }

    // ===================
    // Identity Operations
    // ===================

    /// Exact lookup on the `(local_name, course_id)` key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_identity(&self, local_name: &str, course_id: i64) -> Result<Option<IdentityRecord>> {
        let sql = format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE local_name = ?1 AND course_id = ?2"
        );
        let record = self
            .conn
            .query_row(&sql, rusqlite::params![local_name, course_id], map_identity)
            .optional()?;
        Ok(record)
    }

    /// Every record in `course_id` pointing at `remote_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_identities_by_remote_id(
        &self,
        course_id: i64,
        remote_id: &RemoteId,
    ) -> Result<Vec<IdentityRecord>> {
        let sql = format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities
             WHERE course_id = ?1 AND remote_id = ?2
             ORDER BY local_name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![course_id, remote_id.as_str()], map_identity)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Reverse lookup used by pull.
    ///
    /// Only rows whose local name resolves to `kind` are considered, since
    /// kinds share a numeric id space. Names outside the standard
    /// directories are accepted unless they are child names.
    ///
    /// # Errors
    ///
    /// Returns `AmbiguousLocalMatch` if more than one local name maps to the id.
    pub fn find_identity_by_remote_id(
        &self,
        course_id: i64,
        remote_id: &RemoteId,
        kind: ItemKind,
    ) -> Result<Option<IdentityRecord>> {
        let mut matches: Vec<IdentityRecord> = self
            .find_identities_by_remote_id(course_id, remote_id)?
            .into_iter()
            .filter(|r| match naming::kind_of(&r.local_name) {
                Some(found) => found == kind,
                None => naming::split_child(&r.local_name).is_none(),
            })
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(Error::AmbiguousLocalMatch {
                name: remote_id.to_string(),
                matches: matches.into_iter().map(|r| r.local_name).collect(),
            }),
        }
    }

    /// Every record in `course_id` whose local name starts with `prefix`.
    ///
    /// The result is materialized, so it can be walked repeatedly and is
    /// unaffected by removals made while iterating.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_identities_by_prefix(
        &self,
        course_id: i64,
        prefix: &str,
    ) -> Result<Vec<IdentityRecord>> {
        let sql = format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities
             WHERE course_id = ?1 AND local_name LIKE ?2 ESCAPE '\\'
             ORDER BY local_name"
        );
        let pattern = format!("{}%", escape_like(prefix));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![course_id, pattern], map_identity)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All records, optionally restricted to one course.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_identities(&self, course_id: Option<i64>) -> Result<Vec<IdentityRecord>> {
        let sql = format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities
             WHERE ?1 IS NULL OR course_id = ?1
             ORDER BY course_id, local_name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([course_id], map_identity)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Audit trail of one identity row, newest first.
    ///
    /// Events survive the row, so a forgotten item still has a history.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn identity_history(
        &self,
        local_name: &str,
        course_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<Event>> {
        let entity_id = identity_entity(course_id, local_name);
        Ok(get_events(&self.conn, "identity", &entity_id, limit)?)
    }

    /// Insert a record, or replace the remote id of the existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_identity(
        &mut self,
        local_name: &str,
        course_id: i64,
        remote_id: &RemoteId,
        actor: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("upsert_identity", actor, |tx, ctx| {
            let previous: Option<String> = tx
                .query_row(
                    "SELECT remote_id FROM identities WHERE local_name = ?1 AND course_id = ?2",
                    rusqlite::params![local_name, course_id],
                    |row| row.get(0),
                )
                .optional()?;

            tx.execute(
                "INSERT INTO identities (local_name, course_id, remote_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(local_name, course_id)
                 DO UPDATE SET remote_id = excluded.remote_id, updated_at = excluded.updated_at",
                rusqlite::params![local_name, course_id, remote_id.as_str(), now],
            )?;

            let entity = identity_entity(course_id, local_name);
            match previous {
                None => ctx.record_change(
                    "identity",
                    &entity,
                    EventType::IdentityLinked,
                    None,
                    Some(remote_id.to_string()),
                ),
                Some(old) if old != remote_id.as_str() => ctx.record_change(
                    "identity",
                    &entity,
                    EventType::IdentityRelinked,
                    Some(old),
                    Some(remote_id.to_string()),
                ),
                Some(_) => {}
            }

            Ok(())
        })
    }

    /// Delete a record. Returns whether one existed; absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn remove_identity(&mut self, local_name: &str, course_id: i64, actor: &str) -> Result<bool> {
        self.mutate("remove_identity", actor, |tx, ctx| {
            let previous: Option<String> = tx
                .query_row(
                    "SELECT remote_id FROM identities WHERE local_name = ?1 AND course_id = ?2",
                    rusqlite::params![local_name, course_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(old) = previous else {
                return Ok(false);
            };

            tx.execute(
                "DELETE FROM identities WHERE local_name = ?1 AND course_id = ?2",
                rusqlite::params![local_name, course_id],
            )?;
            ctx.record_change(
                "identity",
                &identity_entity(course_id, local_name),
                EventType::IdentityRemoved,
                Some(old),
                None,
            );
            Ok(true)
        })
    }

    // =================
    // Course Operations
    // =================

    /// Register a course.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the course is already registered.
    pub fn add_course(&mut self, course: &Course, actor: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("add_course", actor, |tx, ctx| {
            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM courses WHERE canvas_id = ?1",
                    [course.canvas_id],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if exists {
                return Err(Error::InvalidArgument(format!(
                    "Course {} is already added",
                    course.canvas_id
                )));
            }

            tx.execute(
                "INSERT INTO courses (canvas_id, name, code, workflow_state, added_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    course.canvas_id,
                    course.name,
                    course.code,
                    course.workflow_state,
                    now
                ],
            )?;
            ctx.record_change(
                "course",
                &course.canvas_id.to_string(),
                EventType::CourseAdded,
                None,
                Some(course.name.clone()),
            );
            Ok(())
        })
    }

    /// Get a course by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_course(&self, canvas_id: i64) -> Result<Option<Course>> {
        let course = self
            .conn
            .query_row(
                "SELECT canvas_id, name, code, workflow_state FROM courses WHERE canvas_id = ?1",
                [canvas_id],
                map_course,
            )
            .optional()?;
        Ok(course)
    }

    /// All registered courses in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_courses(&self) -> Result<Vec<Course>> {
        let mut stmt = self.conn.prepare(
            "SELECT canvas_id, name, code, workflow_state FROM courses ORDER BY added_at, canvas_id",
        )?;
        let rows = stmt.query_map([], map_course)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Courses selected by `search` (see [`Course::matches`]).
    ///
    /// An exact id match wins over code matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn match_courses(&self, search: &str) -> Result<Vec<Course>> {
        if let Ok(id) = search.trim().parse::<i64>() {
            if let Some(course) = self.get_course(id)? {
                return Ok(vec![course]);
            }
        }
        Ok(self
            .list_courses()?
            .into_iter()
            .filter(|c| c.matches(search))
            .collect())
    }

    /// Exactly one course selected by `search`.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound` on no match, `AmbiguousCourse` on several.
    pub fn resolve_course(&self, search: &str) -> Result<Course> {
        let mut matches = self.match_courses(search)?;
        match matches.len() {
            0 => Err(Error::CourseNotFound {
                search: search.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            _ => Err(Error::AmbiguousCourse {
                search: search.to_string(),
                matches: matches.into_iter().map(|c| (c.canvas_id, c.code)).collect(),
            }),
        }
    }

    /// Unregister a course and clear its identity rows.
    ///
    /// Returns the number of identity rows removed.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound` if the course is not registered.
    pub fn remove_course(&mut self, canvas_id: i64, actor: &str) -> Result<usize> {
        self.mutate("remove_course", actor, |tx, ctx| {
            let deleted = tx.execute("DELETE FROM courses WHERE canvas_id = ?1", [canvas_id])?;
            if deleted == 0 {
                return Err(Error::CourseNotFound {
                    search: canvas_id.to_string(),
                });
            }
            let cleared = tx.execute("DELETE FROM identities WHERE course_id = ?1", [canvas_id])?;

            ctx.record_change(
                "course",
                &canvas_id.to_string(),
                EventType::CourseRemoved,
                Some(format!("{cleared} identities")),
                None,
            );
            Ok(cleared)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: i64, code: &str) -> Course {
        Course {
            canvas_id: id,
            name: format!("Course {id}"),
            code: code.to_string(),
            workflow_state: "available".to_string(),
        }
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_find_identity_miss_is_none() {
        let storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.find_identity("pages/a.yaml", 1).unwrap().is_none());
    }

    #[test]
    fn test_upsert_collapses_to_one_row() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        for id in ["1", "2", "3", "3"] {
            storage
                .upsert_identity("pages/a.yaml", 101, &RemoteId::from(id), "tester")
                .unwrap();
        }

        let rows = storage.list_identities(Some(101)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remote_id, RemoteId::from("3"));

        let events = storage.identity_history("pages/a.yaml", 101, None).unwrap();
        // linked once, relinked twice, the no-op upsert leaves no event
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, EventType::IdentityRelinked);
        assert_eq!(events[0].new_value.as_deref(), Some("3"));
        assert_eq!(events[2].event_type, EventType::IdentityLinked);
    }

    #[test]
    fn test_identity_history_outlives_the_record() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .upsert_identity("pages/a.yaml", 101, &RemoteId::from("a"), "tester")
            .unwrap();
        storage.remove_identity("pages/a.yaml", 101, "tester").unwrap();

        let events = storage.identity_history("pages/a.yaml", 101, Some(1)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::IdentityRemoved);
        assert_eq!(events[0].actor, "tester");
        assert!(storage.identity_history("pages/a.yaml", 202, None).unwrap().is_empty());
    }

    #[test]
    fn test_same_local_name_in_two_courses() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .upsert_identity("assignments/hw.yaml", 101, &RemoteId::from(1), "t")
            .unwrap();
        storage
            .upsert_identity("assignments/hw.yaml", 202, &RemoteId::from(9), "t")
            .unwrap();

        assert_eq!(
            storage.find_identity("assignments/hw.yaml", 101).unwrap().unwrap().remote_id,
            RemoteId::from(1)
        );
        assert_eq!(
            storage.find_identity("assignments/hw.yaml", 202).unwrap().unwrap().remote_id,
            RemoteId::from(9)
        );
    }

    #[test]
    fn test_remove_identity_absent_is_noop() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(!storage.remove_identity("pages/none.yaml", 1, "t").unwrap());

        storage
            .upsert_identity("pages/a.yaml", 1, &RemoteId::from("a"), "t")
            .unwrap();
        assert!(storage.remove_identity("pages/a.yaml", 1, "t").unwrap());
        assert!(storage.find_identity("pages/a.yaml", 1).unwrap().is_none());
    }

    #[test]
    fn test_prefix_query_escapes_wildcards() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for name in [
            "modules/week_1.yaml--pages/a.yaml",
            "modules/week_1.yaml--pages/b.yaml",
            "modules/weekX1.yaml--pages/c.yaml",
            "modules/week_1.yaml",
        ] {
            storage
                .upsert_identity(name, 1, &RemoteId::from(name), "t")
                .unwrap();
        }

        let children = storage
            .find_identities_by_prefix(1, "modules/week_1.yaml--")
            .unwrap();
        let names: Vec<&str> = children.iter().map(|r| r.local_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "modules/week_1.yaml--pages/a.yaml",
                "modules/week_1.yaml--pages/b.yaml"
            ]
        );
    }

    #[test]
    fn test_reverse_lookup_detects_ambiguity() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .upsert_identity("assignments/a.yaml", 1, &RemoteId::from(7), "t")
            .unwrap();
        assert_eq!(
            storage
                .find_identity_by_remote_id(1, &RemoteId::from(7), ItemKind::Assignment)
                .unwrap()
                .unwrap()
                .local_name,
            "assignments/a.yaml"
        );
        assert!(storage
            .find_identity_by_remote_id(1, &RemoteId::from(7), ItemKind::Quiz)
            .unwrap()
            .is_none());

        storage
            .upsert_identity("assignments/b.yaml", 1, &RemoteId::from(7), "t")
            .unwrap();
        let err = storage
            .find_identity_by_remote_id(1, &RemoteId::from(7), ItemKind::Assignment)
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousLocalMatch { matches, .. } if matches.len() == 2));
    }

    #[test]
    fn test_reverse_lookup_by_kind() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .upsert_identity("pages/week--1.yaml", 1, &RemoteId::from("week-1"), "t")
            .unwrap();
        storage
            .upsert_identity("modules/m.yaml", 1, &RemoteId::from(41), "t")
            .unwrap();
        storage
            .upsert_identity("modules/m.yaml--pages/a.yaml", 1, &RemoteId::from(41), "t")
            .unwrap();

        let page = storage
            .find_identity_by_remote_id(1, &RemoteId::from("week-1"), ItemKind::Page)
            .unwrap()
            .unwrap();
        assert_eq!(page.local_name, "pages/week--1.yaml");

        let module = storage
            .find_identity_by_remote_id(1, &RemoteId::from(41), ItemKind::Module)
            .unwrap()
            .unwrap();
        assert_eq!(module.local_name, "modules/m.yaml");
        assert!(storage
            .find_identity_by_remote_id(1, &RemoteId::from(41), ItemKind::Page)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_course_registry() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.add_course(&course(101, "CS 101 A"), "t").unwrap();
        storage.add_course(&course(202, "CS 101 B"), "t").unwrap();

        assert!(storage.add_course(&course(101, "dup"), "t").is_err());
        assert_eq!(storage.list_courses().unwrap().len(), 2);

        assert_eq!(storage.resolve_course("202").unwrap().canvas_id, 202);
        assert_eq!(storage.resolve_course("101 A").unwrap().canvas_id, 101);
        assert!(matches!(
            storage.resolve_course("CS").unwrap_err(),
            Error::AmbiguousCourse { .. }
        ));
        assert!(matches!(
            storage.resolve_course("MATH").unwrap_err(),
            Error::CourseNotFound { .. }
        ));
    }

    #[test]
    fn test_remove_course_clears_identities() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.add_course(&course(101, "CS"), "t").unwrap();
        storage
            .upsert_identity("pages/a.yaml", 101, &RemoteId::from("a"), "t")
            .unwrap();
        storage
            .upsert_identity("pages/a.yaml", 202, &RemoteId::from("a"), "t")
            .unwrap();

        assert_eq!(storage.remove_course(101, "t").unwrap(), 1);
        assert!(storage.get_course(101).unwrap().is_none());
        assert_eq!(storage.list_identities(None).unwrap().len(), 1);
        assert!(storage.remove_course(101, "t").is_err());
    }
}
