//! Item kinds and their field contracts.
//!
//! Every trackable piece of course content is one of a closed set of kinds.
//! Each kind declares which remote fields it recognizes, which fields are
//! local-only conveniences, which values are remote defaults (stripped on
//! pull), the request envelope key, and how its remote id is addressed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// The closed set of content kinds Easel can track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Assignment,
    AssignmentGroup,
    ExternalTool,
    Module,
    ModuleItem,
    NavigationTab,
    Page,
    Quiz,
    QuizQuestion,
}

/// How the remote id is read out of a create/update response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRule {
    /// Numeric `id` field.
    Id,
    /// Url slug (`url` field); pages are addressed this way.
    Slug,
}

impl ItemKind {
    /// Every kind, in push order (references resolve before they are needed).
    pub const ALL: [Self; 9] = [
        Self::AssignmentGroup,
        Self::Assignment,
        Self::ExternalTool,
        Self::Page,
        Self::Quiz,
        Self::QuizQuestion,
        Self::Module,
        Self::ModuleItem,
        Self::NavigationTab,
    ];

    /// The single constructor from an on-disk tag (`!Assignment` or `Assignment`).
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind` for tags outside the closed set.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.trim_start_matches('!') {
            "Assignment" => Ok(Self::Assignment),
            "AssignmentGroup" => Ok(Self::AssignmentGroup),
            "ExternalTool" => Ok(Self::ExternalTool),
            "Module" => Ok(Self::Module),
            "ModuleItem" => Ok(Self::ModuleItem),
            "NavigationTabs" | "NavigationTab" => Ok(Self::NavigationTab),
            "Page" => Ok(Self::Page),
            "Quiz" => Ok(Self::Quiz),
            "QuizQuestion" => Ok(Self::QuizQuestion),
            other => Err(Error::UnknownKind {
                tag: other.to_string(),
            }),
        }
    }

    /// YAML tag written to disk (without the leading `!`).
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Assignment => "Assignment",
            Self::AssignmentGroup => "AssignmentGroup",
            Self::ExternalTool => "ExternalTool",
            Self::Module => "Module",
            Self::ModuleItem => "ModuleItem",
            Self::NavigationTab => "NavigationTabs",
            Self::Page => "Page",
            Self::Quiz => "Quiz",
            Self::QuizQuestion => "QuizQuestion",
        }
    }

    /// Directory holding this kind's files, for kinds with their own files.
    #[must_use]
    pub const fn dir(&self) -> Option<&'static str> {
        match self {
            Self::Assignment => Some("assignments"),
            Self::AssignmentGroup => Some("assignment_groups"),
            Self::ExternalTool => Some("external_tools"),
            Self::Module => Some("modules"),
            Self::Page => Some("pages"),
            Self::Quiz => Some("quizzes"),
            Self::ModuleItem | Self::NavigationTab | Self::QuizQuestion => None,
        }
    }

    /// Reverse of [`dir`](Self::dir).
    #[must_use]
    pub fn from_dir(dir: &str) -> Option<Self> {
        let dir = dir.trim_end_matches('*').trim_end_matches('/');
        Self::ALL.into_iter().find(|k| k.dir() == Some(dir))
    }

    /// Whether this kind has its own file in the local catalog.
    #[must_use]
    pub const fn catalog_tracked(&self) -> bool {
        self.dir().is_some()
    }

    /// Path segment of the remote collection.
    #[must_use]
    pub const fn collection(&self) -> &'static str {
        match self {
            Self::Assignment => "assignments",
            Self::AssignmentGroup => "assignment_groups",
            Self::ExternalTool => "external_tools",
            Self::Module => "modules",
            Self::ModuleItem => "items",
            Self::NavigationTab => "tabs",
            Self::Page => "pages",
            Self::Quiz => "quizzes",
            Self::QuizQuestion => "questions",
        }
    }

    /// Owning kind for nested kinds.
    #[must_use]
    pub const fn parent_kind(&self) -> Option<Self> {
        match self {
            Self::ModuleItem => Some(Self::Module),
            Self::QuizQuestion => Some(Self::Quiz),
            _ => None,
        }
    }

    /// Nested kind owned by this kind.
    #[must_use]
    pub const fn child_kind(&self) -> Option<Self> {
        match self {
            Self::Module => Some(Self::ModuleItem),
            Self::Quiz => Some(Self::QuizQuestion),
            _ => None,
        }
    }

    /// Whether deleting this kind remotely also deletes its children remotely.
    ///
    /// Module items are deleted one by one, quiz questions go with their quiz.
    #[must_use]
    pub const fn remote_delete_cascades(&self) -> bool {
        matches!(self, Self::Quiz)
    }

    /// Request envelope key (`{"assignment": {...}}`), if the API uses one.
    #[must_use]
    pub const fn wrapper(&self) -> Option<&'static str> {
        match self {
            Self::Assignment => Some("assignment"),
            Self::Module => Some("module"),
            Self::ModuleItem => Some("module_item"),
            Self::Page => Some("wiki_page"),
            Self::Quiz => Some("quiz"),
            Self::QuizQuestion => Some("question"),
            Self::AssignmentGroup | Self::ExternalTool | Self::NavigationTab => None,
        }
    }

    #[must_use]
    pub const fn id_rule(&self) -> IdRule {
        match self {
            Self::Page => IdRule::Slug,
            _ => IdRule::Id,
        }
    }

    /// Field holding the human-readable name of an item of this kind.
    #[must_use]
    pub const fn display_field(&self) -> &'static str {
        match self {
            Self::Assignment | Self::AssignmentGroup | Self::ExternalTool | Self::Module => "name",
            Self::ModuleItem | Self::Page | Self::Quiz => "title",
            Self::NavigationTab => "label",
            Self::QuizQuestion => "question_name",
        }
    }

    /// Module item `type` used when an item of this kind is added to a module.
    #[must_use]
    pub const fn module_item_type(&self) -> Option<&'static str> {
        match self {
            Self::Assignment => Some("Assignment"),
            Self::ExternalTool => Some("ExternalTool"),
            Self::Page => Some("Page"),
            Self::Quiz => Some("Quiz"),
            _ => None,
        }
    }

    /// Fields the API rejects on create but accepts on a follow-up update.
    #[must_use]
    pub const fn create_deferred_fields(&self) -> &'static [&'static str] {
        match self {
            Self::ModuleItem => &["published"],
            _ => &[],
        }
    }

    /// Whether items of this kind can be created remotely.
    #[must_use]
    pub const fn supports_create(&self) -> bool {
        !matches!(self, Self::NavigationTab)
    }

    /// Remote fields this kind sends and keeps on pull.
    #[must_use]
    pub const fn fields(&self) -> &'static [&'static str] {
        match self {
            Self::Assignment => &[
                "name",
                "published",
                "grading_type",
                "points_possible",
                "submission_types",
                "allowed_extensions",
                "external_tool_tag_attributes",
                "allowed_attempts",
                "due_at",
                "unlock_at",
                "lock_at",
                "peer_reviews",
                "automatic_peer_reviews",
                "peer_reviews_assign_at",
                "intra_group_peer_reviews",
                "anonymous_submissions",
                "omit_from_final_grade",
                "use_rubric_for_grading",
                "assignment_group_id",
                "grade_group_students_individually",
                "rubric",
                "rubric_settings",
                "position",
                "description",
            ],
            Self::AssignmentGroup => &["name", "position", "group_weight"],
            Self::ExternalTool => &[
                "name",
                "consumer_key",
                "shared_secret",
                "config_type",
                "config_url",
            ],
            Self::Module => &[
                "name",
                "published",
                "position",
                "unlock_at",
                "require_sequential_progress",
                "prerequisite_module_ids",
            ],
            Self::ModuleItem => &[
                "title",
                "type",
                "content_id",
                "position",
                "indent",
                "page_url",
                "external_url",
                "new_tab",
                "published",
            ],
            Self::NavigationTab => &["hidden", "position"],
            Self::Page => &[
                "title",
                "body",
                "published",
                "front_page",
                "todo_date",
                "editing_roles",
                "notify_of_update",
            ],
            Self::Quiz => &[
                "title",
                "published",
                "description",
                "allowed_attempts",
                "due_at",
                "unlock_at",
                "lock_at",
                "quiz_type",
                "time_limit",
                "shuffle_answers",
                "hide_results",
                "show_correct_answers",
                "show_correct_answers_last_attempt",
                "show_correct_answers_at",
                "hide_correct_answers_at",
                "scoring_policy",
                "one_question_at_a_time",
                "cant_go_back",
                "access_code",
                "ip_filter",
                "one_time_results",
                "only_visible_to_overrides",
                "assignment_group_id",
            ],
            Self::QuizQuestion => &[
                "question_name",
                "question_text",
                "quiz_group_id",
                "question_type",
                "position",
                "points_possible",
                "correct_comments",
                "incorrect_comments",
                "neutral_comments",
                "matching_answer_incorrect_matches",
                "formulas",
                "variables",
                "text_after_answers",
                "answers",
            ],
        }
    }

    /// Local-only fields: kept on disk, never sent as-is.
    #[must_use]
    pub const fn local_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Assignment => &["assignment_group"],
            Self::Module => &["items"],
            Self::ModuleItem => &["item"],
            Self::NavigationTab => &["label"],
            Self::Quiz => &["assignment_group", "quiz_questions"],
            Self::AssignmentGroup | Self::ExternalTool | Self::Page | Self::QuizQuestion => &[],
        }
    }

    #[must_use]
    pub fn recognizes(&self, field: &str) -> bool {
        self.fields().contains(&field)
    }

    #[must_use]
    pub fn keeps_locally(&self, field: &str) -> bool {
        self.recognizes(field) || self.local_fields().contains(&field)
    }

    /// Remote default for `field`, if the kind declares one.
    #[must_use]
    pub fn default_for(&self, field: &str) -> Option<&'static Value> {
        DEFAULTS
            .iter()
            .find(|((kind, name), _)| kind == self && *name == field)
            .map(|(_, value)| value)
    }

    /// Whether `value` equals the declared default for `field`.
    #[must_use]
    pub fn is_default(&self, field: &str, value: &Value) -> bool {
        self.default_for(field).is_some_and(|d| d == value)
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Assignment => "assignment",
            Self::AssignmentGroup => "assignment_group",
            Self::ExternalTool => "external_tool",
            Self::Module => "module",
            Self::ModuleItem => "module_item",
            Self::NavigationTab => "navigation_tab",
            Self::Page => "page",
            Self::Quiz => "quiz",
            Self::QuizQuestion => "quiz_question",
        };
        write!(f, "{s}")
    }
}

// ── Remote defaults (stripped from pulled items) ─────────────

static DEFAULTS: LazyLock<HashMap<(ItemKind, &'static str), Value>> = LazyLock::new(|| {
    use ItemKind::{
        Assignment, AssignmentGroup, Module, ModuleItem, NavigationTab, Page, Quiz, QuizQuestion,
    };

    [
        ((Assignment, "grading_type"), json!("points")),
        ((Assignment, "submission_types"), json!(["none"])),
        ((Assignment, "allowed_extensions"), json!([])),
        ((Assignment, "allowed_attempts"), json!(-1)),
        ((Assignment, "peer_reviews"), json!(false)),
        ((Assignment, "automatic_peer_reviews"), json!(false)),
        ((Assignment, "intra_group_peer_reviews"), json!(false)),
        ((Assignment, "anonymous_submissions"), json!(false)),
        ((Assignment, "omit_from_final_grade"), json!(false)),
        ((Assignment, "grade_group_students_individually"), json!(false)),
        ((AssignmentGroup, "group_weight"), json!(0)),
        ((Module, "require_sequential_progress"), json!(false)),
        ((Module, "prerequisite_module_ids"), json!([])),
        ((ModuleItem, "indent"), json!(0)),
        ((ModuleItem, "new_tab"), json!(false)),
        ((NavigationTab, "hidden"), json!(false)),
        ((Page, "front_page"), json!(false)),
        ((Page, "editing_roles"), json!("teachers")),
        ((Quiz, "quiz_type"), json!("assignment")),
        ((Quiz, "allowed_attempts"), json!(1)),
        ((Quiz, "shuffle_answers"), json!(false)),
        ((Quiz, "show_correct_answers"), json!(true)),
        ((Quiz, "show_correct_answers_last_attempt"), json!(false)),
        ((Quiz, "scoring_policy"), json!("keep_highest")),
        ((Quiz, "one_question_at_a_time"), json!(false)),
        ((Quiz, "cant_go_back"), json!(false)),
        ((Quiz, "one_time_results"), json!(false)),
        ((Quiz, "only_visible_to_overrides"), json!(false)),
        ((QuizQuestion, "correct_comments"), json!("")),
        ((QuizQuestion, "incorrect_comments"), json!("")),
        ((QuizQuestion, "neutral_comments"), json!("")),
        ((QuizQuestion, "text_after_answers"), json!("")),
        ((QuizQuestion, "formulas"), json!([])),
    ]
    .into_iter()
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_accepts_bang_prefix() {
        assert_eq!(ItemKind::from_tag("!Assignment").unwrap(), ItemKind::Assignment);
        assert_eq!(ItemKind::from_tag("Page").unwrap(), ItemKind::Page);
        assert_eq!(
            ItemKind::from_tag("!NavigationTabs").unwrap(),
            ItemKind::NavigationTab
        );
    }

    #[test]
    fn test_from_tag_rejects_unknown() {
        let err = ItemKind::from_tag("!GradingScheme").unwrap_err();
        assert!(matches!(err, Error::UnknownKind { tag } if tag == "GradingScheme"));
    }

    #[test]
    fn test_tag_round_trips_for_every_kind() {
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::from_tag(kind.tag()).unwrap(), kind);
        }
    }

    #[test]
    fn test_from_dir_tolerates_glob_and_slash() {
        assert_eq!(ItemKind::from_dir("quizzes/"), Some(ItemKind::Quiz));
        assert_eq!(ItemKind::from_dir("pages/*"), Some(ItemKind::Page));
        assert_eq!(ItemKind::from_dir("files"), None);
    }

    #[test]
    fn test_nested_kinds_link_both_ways() {
        for kind in ItemKind::ALL {
            if let Some(parent) = kind.parent_kind() {
                assert_eq!(parent.child_kind(), Some(kind));
                assert!(!kind.catalog_tracked());
            }
        }
    }

    #[test]
    fn test_defaults_only_for_kept_fields() {
        for ((kind, field), _) in DEFAULTS.iter() {
            assert!(kind.keeps_locally(field), "{kind}.{field} has a default but is dropped");
        }
    }

    #[test]
    fn test_is_default_distinguishes_false_from_missing() {
        assert!(ItemKind::Quiz.is_default("shuffle_answers", &json!(false)));
        assert!(!ItemKind::Quiz.is_default("shuffle_answers", &json!(true)));
        assert!(!ItemKind::Quiz.is_default("published", &json!(false)));
    }

    #[test]
    fn test_default_for_borrowed_field_name() {
        let field = String::from("editing_roles");
        assert_eq!(ItemKind::Page.default_for(&field), Some(&json!("teachers")));
        assert_eq!(ItemKind::Assignment.default_for(&field), None);
    }
}
