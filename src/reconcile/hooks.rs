//! Per-kind work around the create/update request.
//!
//! Pre-processing turns local-only references into the remote ids the API
//! needs. Post-processing performs remote side effects that need the item's
//! remote id: module items, quiz questions, quiz re-publishing.

use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{collection_path, member_path, Reconciler};
use crate::catalog::resolve_reference;
use crate::error::{Error, Result};
use crate::gateway::reports_missing;
use crate::model::naming::{child_name, child_prefix};
use crate::model::{Course, Fields, Item, ItemKind, RemoteId};

/// Module item types that point at nothing in the catalog.
const STANDALONE_MODULE_ITEMS: [&str; 2] = ["SubHeader", "ExternalUrl"];

/// Facts gathered by pre-processing that post-processing acts on.
#[derive(Debug, Default)]
pub(super) struct PushState {
    /// Re-publish the quiz once its questions are in place.
    publish: bool,
}

impl Reconciler<'_> {
    pub(super) fn preprocess(&mut self, item: &mut Item, course: &Course) -> Result<PushState> {
        let mut state = PushState::default();

        if self.ctx.hidden && item.kind.recognizes("published") {
            item.set("published", false);
        }

        if let Some(group) = item.get_str("assignment_group").map(str::to_owned) {
            let remote_id = self.resolve_remote(item, ItemKind::AssignmentGroup, &group, course)?;
            item.set("assignment_group_id", remote_id.to_json());
        }

        match item.kind {
            ItemKind::Quiz => {
                // Questions only count toward the quiz total if it is saved
                // again after they are added.
                state.publish = item.get_bool("published") == Some(true);
                item.set("published", false);
            }
            ItemKind::ModuleItem => self.resolve_module_item(item, course)?,
            _ => {}
        }

        Ok(state)
    }

    pub(super) fn postprocess(
        &mut self,
        item: &Item,
        course: &Course,
        remote_id: Option<&RemoteId>,
        state: &PushState,
    ) -> Result<()> {
        match item.kind {
            ItemKind::Module => self.push_module_items(item, course, remote_id),
            ItemKind::Quiz => self.push_quiz_questions(item, course, remote_id, state),
            _ => Ok(()),
        }
    }

    /// Remote id of the `kind` item that `reference` names locally.
    fn resolve_remote(
        &self,
        item: &Item,
        kind: ItemKind,
        reference: &str,
        course: &Course,
    ) -> Result<RemoteId> {
        let unresolved = || Error::ReferenceResolution {
            item: item.local_name.clone(),
            reference: reference.to_string(),
        };

        let local_name = resolve_reference(self.catalog, kind, reference)?.ok_or_else(unresolved)?;
        self.storage
            .find_identity(&local_name, course.canvas_id)?
            .map(|record| record.remote_id)
            .ok_or_else(unresolved)
    }

    // ==========
    // Modules
    // ==========

    fn resolve_module_item(&self, item: &mut Item, course: &Course) -> Result<()> {
        let Some(reference) = item.get_str("item").map(str::to_owned) else {
            return match item.get_str("type") {
                Some(kind) if STANDALONE_MODULE_ITEMS.contains(&kind) => Ok(()),
                _ => Err(Error::InvalidItem {
                    path: item.local_name.clone(),
                    reason: "a module item needs an `item` or a SubHeader/ExternalUrl `type`"
                        .to_string(),
                }),
            };
        };

        let target = self.catalog.read(&reference)?.ok_or_else(|| Error::ReferenceResolution {
            item: item.local_name.clone(),
            reference: reference.clone(),
        })?;
        let Some(item_type) = target.kind.module_item_type() else {
            return Err(Error::InvalidItem {
                path: item.local_name.clone(),
                reason: format!("a {} cannot be added to a module", target.kind),
            });
        };

        item.set("type", item_type);
        if item.get("title").is_none() {
            item.set("title", target.display_name().to_string());
        }

        let remote_id = self
            .storage
            .find_identity(&target.local_name, course.canvas_id)?
            .map(|record| record.remote_id)
            .ok_or_else(|| Error::ReferenceResolution {
                item: item.local_name.clone(),
                reference: reference.clone(),
            })?;
        if target.kind == ItemKind::Page {
            item.set("page_url", remote_id.as_str());
        } else {
            item.set("content_id", remote_id.to_json());
        }
        Ok(())
    }

    fn push_module_items(&mut self, module: &Item, course: &Course, remote_id: Option<&RemoteId>) -> Result<()> {
        let items = module_items(module)?;
        if items.is_empty() {
            return Ok(());
        }
        if remote_id.is_none() {
            self.plan(format!("push {} items to {module}", items.len()));
            return Ok(());
        }

        let mut first_failure = None;
        for child in &items {
            match self.push(child, course) {
                Ok(outcome) => info!(item = %child.local_name, %outcome, "module item"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(item = %child.local_name, error = %e, "module item failed");
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Module item entries written back to a pulled module.
    pub(super) fn pull_module_items(
        &mut self,
        module_name: &str,
        course_id: i64,
        module_id: &RemoteId,
    ) -> Result<Vec<Value>> {
        let gateway = self.gateway;
        let path = collection_path(ItemKind::ModuleItem, course_id, Some(module_id));
        let mut entries = Vec::new();

        for entry in gateway.list(&path, &[]) {
            let Value::Object(remote) = entry? else {
                continue;
            };
            let pulled = Item::from_remote(ItemKind::ModuleItem, String::new(), &remote);

            let entry = match self.module_item_target(course_id, &remote)? {
                Some(target) => match pulled.get("indent") {
                    Some(indent) => json!({"item": target, "indent": indent}),
                    None => Value::String(target),
                },
                None => {
                    let mut fields = pulled.fields().clone();
                    for field in ["content_id", "page_url", "position"] {
                        fields.shift_remove(field);
                    }
                    Value::Object(fields)
                }
            };

            let discriminator = match &entry {
                Value::String(target) => Some(target.clone()),
                other => other
                    .get("item")
                    .or_else(|| other.get("title"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            };
            if let (Some(discriminator), Some(id)) =
                (discriminator, remote.get("id").and_then(RemoteId::from_value))
            {
                let local_name = child_name(module_name, &discriminator);
                if self.ctx.dry_run {
                    self.plan(format!("track {local_name} as {id} in course {course_id}"));
                } else {
                    self.storage
                        .upsert_identity(&local_name, course_id, &id, &self.ctx.actor)?;
                }
            }

            entries.push(entry);
        }

        Ok(entries)
    }

    /// Local name of the catalog item a remote module item points at.
    fn module_item_target(&self, course_id: i64, remote: &Fields) -> Result<Option<String>> {
        let Some(item_type) = remote.get("type").and_then(Value::as_str) else {
            return Ok(None);
        };
        let Some(kind) = ItemKind::ALL
            .into_iter()
            .find(|k| k.module_item_type() == Some(item_type))
        else {
            return Ok(None);
        };

        let id_field = if kind == ItemKind::Page { "page_url" } else { "content_id" };
        let Some(remote_id) = remote.get(id_field).and_then(RemoteId::from_value) else {
            return Ok(None);
        };
        Ok(self
            .storage
            .find_identity_by_remote_id(course_id, &remote_id, kind)?
            .map(|record| record.local_name))
    }

    // ==========
    // Quizzes
    // ==========

    fn push_quiz_questions(
        &mut self,
        quiz: &Item,
        course: &Course,
        remote_id: Option<&RemoteId>,
        state: &PushState,
    ) -> Result<()> {
        let course_id = course.canvas_id;
        let questions = self.build_questions(quiz)?;

        let Some(quiz_id) = remote_id else {
            self.plan(format!("push {} questions to {quiz}", questions.len()));
            return Ok(());
        };
        let questions_path = collection_path(ItemKind::QuizQuestion, course_id, Some(quiz_id));
        let quiz_path = member_path(ItemKind::Quiz, course_id, None, quiz_id);

        if self.ctx.dry_run {
            self.plan(format!("DELETE every question on {quiz}"));
            self.plan(format!("POST {questions_path}: {} questions", questions.len()));
            if state.publish {
                self.plan(format!("PUT {quiz_path}: publish {quiz}"));
            }
            return Ok(());
        }

        let gateway = self.gateway;
        let existing: Vec<Value> = gateway.list(&questions_path, &[]).collect::<Result<_>>()?;
        for question in existing {
            if let Some(id) = question.get("id").and_then(RemoteId::from_value) {
                let body = gateway.delete(&format!("{questions_path}/{id}"))?;
                if reports_missing(&body) {
                    info!(quiz = %quiz.local_name, question = %id, "question already gone");
                }
            }
        }
        for record in self
            .storage
            .find_identities_by_prefix(course_id, &child_prefix(&quiz.local_name))?
        {
            self.storage
                .remove_identity(&record.local_name, course_id, &self.ctx.actor)?;
        }

        for (index, fields) in questions.into_iter().enumerate() {
            let question = Item::child_of(quiz, ItemKind::QuizQuestion, &index.to_string(), fields);
            self.push(&question, course)?;
        }

        if state.publish {
            gateway.put(&quiz_path, &json!({"quiz": {"published": true}}))?;
        }
        Ok(())
    }

    /// Expand a quiz's `quiz_questions` list into question field maps.
    ///
    /// Entries are a question file name, `{bank: file}` for a random question
    /// not already picked, `{bank: file, id: n}` for a specific one, or an
    /// inline question.
    fn build_questions(&self, quiz: &Item) -> Result<Vec<Fields>> {
        let invalid = |reason: &str| Error::InvalidItem {
            path: quiz.local_name.clone(),
            reason: reason.to_string(),
        };

        let entries = match quiz.get("quiz_questions") {
            None => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(invalid("quiz_questions must be a list")),
        };

        let mut rng = rand::thread_rng();
        let mut picked: Vec<Fields> = Vec::new();
        for entry in entries {
            match entry {
                Value::String(file) => picked.extend(self.catalog.read_questions(file)?),
                Value::Object(entry) => match entry.get("bank").and_then(Value::as_str) {
                    Some(bank) => {
                        let bank_questions = self.catalog.read_questions(bank)?;
                        match entry.get("id") {
                            Some(id) => {
                                let mut found = bank_questions
                                    .into_iter()
                                    .rfind(|q| q.get("id") == Some(id))
                                    .ok_or_else(|| Error::ReferenceResolution {
                                        item: quiz.local_name.clone(),
                                        reference: format!("{bank} question {id}"),
                                    })?;
                                found.shift_remove("id");
                                picked.push(found);
                            }
                            None => {
                                let unused: Vec<&Fields> = bank_questions
                                    .iter()
                                    .filter(|q| !picked.contains(q))
                                    .collect();
                                match unused.choose(&mut rng) {
                                    Some(question) => picked.push((*question).clone()),
                                    None => warn!(quiz = %quiz.local_name, bank, "no unused questions left in bank"),
                                }
                            }
                        }
                    }
                    None => picked.push(entry.clone()),
                },
                _ => return Err(invalid("each quiz question must be a file name or a mapping")),
            }
        }
        Ok(picked)
    }
}

/// Child items of a module, one per `items` entry.
///
/// A string entry names a catalog item; a mapping carries module item
/// fields directly. Entries without a position get their list position.
fn module_items(module: &Item) -> Result<Vec<Item>> {
    let entries = match module.get("items") {
        None => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(Error::InvalidItem {
                path: module.local_name.clone(),
                reason: "items must be a list".to_string(),
            })
        }
    };

    let mut items = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let mut fields = match entry {
            Value::String(reference) => {
                let mut fields = Fields::new();
                fields.insert("item".to_string(), Value::String(reference.clone()));
                fields
            }
            Value::Object(fields) => fields.clone(),
            _ => {
                return Err(Error::InvalidItem {
                    path: module.local_name.clone(),
                    reason: format!("invalid item entry {entry}"),
                })
            }
        };
        fields
            .entry("position")
            .or_insert_with(|| Value::from(index + 1));

        let discriminator = fields
            .get("item")
            .or_else(|| fields.get("title"))
            .and_then(Value::as_str)
            .map_or_else(|| index.to_string(), ToString::to_string);
        items.push(Item::child_of(module, ItemKind::ModuleItem, &discriminator, fields));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::catalog::Catalog;
    use crate::config::SyncContext;
    use crate::gateway::recording::RecordingGateway;
    use crate::reconcile::Outcome;
    use crate::storage::SqliteStorage;

    fn course() -> Course {
        Course {
            canvas_id: 101,
            name: "Intro to Testing".to_string(),
            code: "CS 101".to_string(),
            workflow_state: "available".to_string(),
        }
    }

    fn item(kind: ItemKind, local_name: &str, fields: Value) -> Item {
        match fields {
            Value::Object(fields) => Item::with_fields(kind, local_name, fields),
            _ => Item::new(kind, local_name),
        }
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(fields) => fields,
            _ => Fields::new(),
        }
    }

    #[test]
    fn test_assignment_group_name_resolves_to_id() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        catalog
            .write(&item(ItemKind::AssignmentGroup, "assignment_groups/hw.yaml", json!({"name": "Homework"})))
            .unwrap();
        storage
            .upsert_identity("assignment_groups/hw.yaml", 101, &RemoteId::from(7), "test")
            .unwrap();
        gateway.reply("POST", "/api/v1/courses/101/assignments", json!({"id": 1}));

        let assignment = item(
            ItemKind::Assignment,
            "assignments/lab.yaml",
            json!({"name": "Lab", "assignment_group": "Homework"}),
        );
        Reconciler::new(&mut storage, &gateway, &catalog, &ctx)
            .push(&assignment, &course())
            .unwrap();

        assert_eq!(
            gateway.calls()[0].body,
            Some(json!({"assignment": {"name": "Lab", "assignment_group_id": 7}}))
        );
        // The catalog keeps the human-readable reference.
        let stored = catalog.get("assignments/lab.yaml").unwrap();
        assert_eq!(stored.get("assignment_group"), Some(&json!("Homework")));
        assert_eq!(stored.get("assignment_group_id"), None);
    }

    #[test]
    fn test_unknown_assignment_group_fails_without_calls() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::new(true, false, "test");

        let assignment = item(
            ItemKind::Assignment,
            "assignments/lab.yaml",
            json!({"name": "Lab", "assignment_group": "Labs"}),
        );
        let err = Reconciler::new(&mut storage, &gateway, &catalog, &ctx)
            .push(&assignment, &course())
            .unwrap_err();

        assert!(matches!(err, Error::ReferenceResolution { reference, .. } if reference == "Labs"));
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn test_hidden_forces_unpublished() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::new(false, true, "test");
        gateway.reply("POST", "/api/v1/courses/101/pages", json!({"url": "intro"}));

        let page = item(ItemKind::Page, "pages/intro.yaml", json!({"title": "Intro", "published": true}));
        Reconciler::new(&mut storage, &gateway, &catalog, &ctx)
            .push(&page, &course())
            .unwrap();

        assert_eq!(
            gateway.calls()[0].body,
            Some(json!({"wiki_page": {"title": "Intro", "published": false}}))
        );
        assert_eq!(catalog.get("pages/intro.yaml").unwrap().get_bool("published"), Some(true));
    }

    #[test]
    fn test_module_pushes_items_after_create() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        catalog
            .write(&item(ItemKind::Page, "pages/intro.yaml", json!({"title": "Introduction"})))
            .unwrap();
        catalog
            .write(&item(ItemKind::Assignment, "assignments/hw1.yaml", json!({"name": "Homework 1"})))
            .unwrap();
        storage.upsert_identity("pages/intro.yaml", 101, &RemoteId::from("introduction"), "test").unwrap();
        storage.upsert_identity("assignments/hw1.yaml", 101, &RemoteId::from(555), "test").unwrap();
        gateway.reply("POST", "/api/v1/courses/101/modules", json!({"id": 40}));
        gateway.reply("POST", "/api/v1/courses/101/modules/40/items", json!({"id": 41}));
        gateway.reply("POST", "/api/v1/courses/101/modules/40/items", json!({"id": 42}));

        let module = item(
            ItemKind::Module,
            "modules/week1.yaml",
            json!({
                "name": "Week 1",
                "items": [
                    "pages/intro.yaml",
                    {"item": "assignments/hw1.yaml", "indent": 1, "published": true}
                ]
            }),
        );
        let outcome = Reconciler::new(&mut storage, &gateway, &catalog, &ctx)
            .push(&module, &course())
            .unwrap();
        assert_eq!(outcome, Outcome::Created { remote_id: RemoteId::from(40) });

        let writes = gateway.writes();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[0].body, Some(json!({"module": {"name": "Week 1"}})));
        assert_eq!(
            writes[1].body,
            Some(json!({"module_item": {
                "position": 1,
                "type": "Page",
                "title": "Introduction",
                "page_url": "introduction"
            }}))
        );
        assert_eq!(
            writes[2].body,
            Some(json!({"module_item": {
                "indent": 1,
                "position": 2,
                "type": "Assignment",
                "title": "Homework 1",
                "content_id": 555
            }}))
        );
        // Published is only accepted once the item exists.
        assert_eq!(writes[3].method, "PUT");
        assert_eq!(writes[3].path, "/api/v1/courses/101/modules/40/items/42");
        assert_eq!(writes[3].body, Some(json!({"module_item": {"published": true}})));

        let record = storage
            .find_identity("modules/week1.yaml--assignments/hw1.yaml", 101)
            .unwrap()
            .unwrap();
        assert_eq!(record.remote_id, RemoteId::from(42));
    }

    #[test]
    fn test_module_item_requires_pushed_target() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        catalog
            .write(&item(ItemKind::Page, "pages/intro.yaml", json!({"title": "Introduction"})))
            .unwrap();
        storage.upsert_identity("modules/week1.yaml", 101, &RemoteId::from(40), "test").unwrap();

        let module = item(ItemKind::Module, "modules/week1.yaml", json!({"name": "Week 1"}));
        let child = Item::child_of(
            &module,
            ItemKind::ModuleItem,
            "pages/intro.yaml",
            fields(json!({"item": "pages/intro.yaml"})),
        );
        let err = Reconciler::new(&mut storage, &gateway, &catalog, &ctx)
            .push(&child, &course())
            .unwrap_err();

        assert!(matches!(err, Error::ReferenceResolution { .. }));
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn test_quiz_replaces_questions_and_republishes() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        catalog.add_questions(
            "quizzes/bank.yaml",
            vec![
                fields(json!({"id": 1, "question_name": "Q1", "question_text": "One?"})),
                fields(json!({"id": 2, "question_name": "Q2", "question_text": "Two?"})),
            ],
        );
        storage.upsert_identity("quizzes/q1.yaml", 101, &RemoteId::from(8), "test").unwrap();
        storage.upsert_identity("quizzes/q1.yaml--0", 101, &RemoteId::from(80), "test").unwrap();
        gateway.reply("GET", "/api/v1/courses/101/quizzes/8/questions", json!([{"id": 80}]));
        gateway.reply("POST", "/api/v1/courses/101/quizzes/8/questions", json!({"id": 90}));
        gateway.reply("POST", "/api/v1/courses/101/quizzes/8/questions", json!({"id": 91}));

        let quiz = item(
            ItemKind::Quiz,
            "quizzes/q1.yaml",
            json!({
                "title": "Quiz 1",
                "published": true,
                "quiz_questions": [
                    {"bank": "quizzes/bank.yaml", "id": 2},
                    {"question_name": "Inline", "answers": [{"answer_text": "yes"}]}
                ]
            }),
        );
        Reconciler::new(&mut storage, &gateway, &catalog, &ctx)
            .push(&quiz, &course())
            .unwrap();

        let writes = gateway.writes();
        let summary: Vec<(&str, &str)> = writes.iter().map(|c| (c.method, c.path.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                ("PUT", "/api/v1/courses/101/quizzes/8"),
                ("DELETE", "/api/v1/courses/101/quizzes/8/questions/80"),
                ("POST", "/api/v1/courses/101/quizzes/8/questions"),
                ("POST", "/api/v1/courses/101/quizzes/8/questions"),
                ("PUT", "/api/v1/courses/101/quizzes/8"),
            ]
        );
        assert_eq!(writes[0].body, Some(json!({"quiz": {"title": "Quiz 1", "published": false}})));
        assert_eq!(
            writes[2].body,
            Some(json!({"question": {"question_name": "Q2", "question_text": "Two?"}}))
        );
        assert_eq!(
            writes[3].body,
            Some(json!({"question": {"question_name": "Inline", "answers": {"0": {"answer_text": "yes"}}}}))
        );
        assert_eq!(writes[4].body, Some(json!({"quiz": {"published": true}})));

        let questions: Vec<_> = storage
            .find_identities_by_prefix(101, "quizzes/q1.yaml--")
            .unwrap()
            .into_iter()
            .map(|r| (r.local_name, r.remote_id))
            .collect();
        assert_eq!(
            questions,
            vec![
                ("quizzes/q1.yaml--0".to_string(), RemoteId::from(90)),
                ("quizzes/q1.yaml--1".to_string(), RemoteId::from(91)),
            ]
        );
    }

    #[test]
    fn test_random_bank_picks_do_not_repeat() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        catalog.add_questions(
            "quizzes/bank.yaml",
            vec![
                fields(json!({"question_name": "A"})),
                fields(json!({"question_name": "B"})),
            ],
        );

        let quiz = item(
            ItemKind::Quiz,
            "quizzes/q1.yaml",
            json!({"title": "Quiz 1", "quiz_questions": [
                {"bank": "quizzes/bank.yaml"},
                {"bank": "quizzes/bank.yaml"},
                {"bank": "quizzes/bank.yaml"}
            ]}),
        );
        let reconciler = Reconciler::new(&mut storage, &gateway, &catalog, &ctx);
        let picked = reconciler.build_questions(&quiz).unwrap();

        let mut names: Vec<&str> = picked
            .iter()
            .filter_map(|q| q.get("question_name").and_then(Value::as_str))
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_missing_bank_question_id_is_unresolved() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        catalog.add_questions("quizzes/bank.yaml", vec![fields(json!({"id": 1, "question_name": "A"}))]);

        let quiz = item(
            ItemKind::Quiz,
            "quizzes/q1.yaml",
            json!({"title": "Quiz 1", "quiz_questions": [{"bank": "quizzes/bank.yaml", "id": 3}]}),
        );
        let reconciler = Reconciler::new(&mut storage, &gateway, &catalog, &ctx);
        let err = reconciler.build_questions(&quiz).unwrap_err();

        assert!(matches!(err, Error::ReferenceResolution { .. }));
    }

    #[test]
    fn test_pull_module_maps_items_back() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let gateway = RecordingGateway::new();
        let catalog = MemoryCatalog::new();
        let ctx = SyncContext::default();
        storage.upsert_identity("pages/intro.yaml", 101, &RemoteId::from("introduction"), "test").unwrap();
        gateway.reply("GET", "/api/v1/courses/101/modules/40", json!({"id": 40, "name": "Week 1", "published": true}));
        gateway.reply(
            "GET",
            "/api/v1/courses/101/modules/40/items",
            json!([
                {"id": 41, "type": "Page", "page_url": "introduction", "title": "Introduction", "indent": 0},
                {"id": 42, "type": "SubHeader", "title": "Readings", "indent": 1, "position": 2}
            ]),
        );

        let module = Reconciler::new(&mut storage, &gateway, &catalog, &ctx)
            .pull_one(ItemKind::Module, &RemoteId::from(40), &course())
            .unwrap();

        assert_eq!(module.local_name, "modules/week_1.yaml");
        assert_eq!(
            module.get("items"),
            Some(&json!([
                "pages/intro.yaml",
                {"title": "Readings", "type": "SubHeader", "indent": 1}
            ]))
        );
        assert!(storage.find_identity("modules/week_1.yaml--pages/intro.yaml", 101).unwrap().is_some());
        assert!(storage.find_identity("modules/week_1.yaml--Readings", 101).unwrap().is_some());
    }
}
