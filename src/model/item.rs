//! The trackable content item.
//!
//! An [`Item`] is a kind tag plus an ordered field mapping. A field that was
//! never set is simply absent; `false`, `0` and `""` are real values and are
//! always kept. `null` is treated as "never set".

use serde_json::{Map, Value};

use super::kind::ItemKind;
use super::naming;

/// Ordered field mapping of an item.
pub type Fields = Map<String, Value>;

/// Which request a payload is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Update,
}

/// One piece of course content.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    /// Stable on-disk identifier, e.g. `assignments/homework_1.yaml`.
    pub local_name: String,
    fields: Fields,
    /// Local name of the owning item, for nested kinds.
    pub parent: Option<String>,
}

impl Item {
    /// Create an empty item.
    #[must_use]
    pub fn new(kind: ItemKind, local_name: impl Into<String>) -> Self {
        Self {
            kind,
            local_name: local_name.into(),
            fields: Fields::new(),
            parent: None,
        }
    }

    /// Create an item from a field mapping, dropping `null` values.
    #[must_use]
    pub fn with_fields(kind: ItemKind, local_name: impl Into<String>, fields: Fields) -> Self {
        let mut item = Self::new(kind, local_name);
        for (key, value) in fields {
            item.set(key, value);
        }
        item
    }

    /// Create a nested item owned by `parent`.
    ///
    /// The child's local name is the parent's local name, the child
    /// delimiter, and `discriminator`.
    #[must_use]
    pub fn child_of(parent: &Self, kind: ItemKind, discriminator: &str, fields: Fields) -> Self {
        let mut item = Self::with_fields(kind, naming::child_name(&parent.local_name, discriminator), fields);
        item.parent = Some(parent.local_name.clone());
        item
    }

    /// Build the local representation of a remote item.
    ///
    /// Unknown response fields are dropped, and so is any field equal to the
    /// kind's declared default. Field order follows the kind's field list so
    /// files stay stable across pulls.
    #[must_use]
    pub fn from_remote(kind: ItemKind, local_name: impl Into<String>, remote: &Fields) -> Self {
        let mut item = Self::new(kind, local_name);
        for field in kind.fields().iter().chain(kind.local_fields()) {
            if let Some(value) = remote.get(*field) {
                if !value.is_null() && !kind.is_default(field, value) {
                    item.fields.insert((*field).to_string(), value.clone());
                }
            }
        }
        item
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    /// Set a field. Setting `null` unsets it.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        if value.is_null() {
            self.fields.shift_remove(&field);
        } else {
            self.fields.insert(field, value);
        }
    }

    /// Remove a field, returning its previous value.
    pub fn unset(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// Iterate over set fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Human-readable name: the kind's display field, or the local name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.get_str(self.kind.display_field())
            .unwrap_or(&self.local_name)
    }

    /// Overwrite fields with every field set on `incoming`.
    ///
    /// Fields absent on `incoming` are left untouched.
    pub fn merge_from(&mut self, incoming: &Self) {
        for (key, value) in incoming.iter() {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Copy of `self` with `incoming` merged over it.
    #[must_use]
    pub fn merged_with(&self, incoming: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_from(incoming);
        if merged.parent.is_none() {
            merged.parent.clone_from(&incoming.parent);
        }
        merged
    }

    /// Build the outbound request body.
    ///
    /// Only recognized fields are sent; local-only fields never leave the
    /// machine. On create, fields the API only accepts on update are held
    /// back. The result is wrapped in the kind's envelope key, if any.
    #[must_use]
    pub fn payload(&self, phase: Phase) -> Value {
        let mut body = Fields::new();
        for (key, value) in self.iter() {
            if !self.kind.recognizes(key) {
                continue;
            }
            if phase == Phase::Create && self.kind.create_deferred_fields().contains(&key.as_str()) {
                continue;
            }
            body.insert(key.clone(), value.clone());
        }

        if self.kind == ItemKind::QuizQuestion {
            index_answers(&mut body);
        }

        match self.kind.wrapper() {
            Some(key) => {
                let mut wrapped = Fields::new();
                wrapped.insert(key.to_string(), Value::Object(body));
                Value::Object(wrapped)
            }
            None => Value::Object(body),
        }
    }

    /// Fields held back on create, to be sent in a follow-up update.
    #[must_use]
    pub fn deferred_payload(&self) -> Option<Value> {
        let mut body = Fields::new();
        for field in self.kind.create_deferred_fields() {
            if let Some(value) = self.get(field) {
                body.insert((*field).to_string(), value.clone());
            }
        }
        if body.is_empty() {
            return None;
        }
        Some(match self.kind.wrapper() {
            Some(key) => serde_json::json!({ key: body }),
            None => Value::Object(body),
        })
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind.tag(), self.display_name())
    }
}

/// The API expects answers as an object keyed by index, not a list.
fn index_answers(body: &mut Fields) {
    if let Some(Value::Array(answers)) = body.get("answers") {
        let indexed: Fields = answers
            .iter()
            .enumerate()
            .map(|(i, answer)| (i.to_string(), answer.clone()))
            .collect();
        body.insert("answers".to_string(), Value::Object(indexed));
    }
}
