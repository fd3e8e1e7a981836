//! In-memory catalog for tests.

use std::cell::RefCell;
use std::collections::BTreeMap;

use super::Catalog;
use crate::error::{Error, Result};
use crate::model::{Fields, Item, ItemKind};

#[derive(Default)]
pub struct MemoryCatalog {
    items: RefCell<BTreeMap<String, Item>>,
    questions: RefCell<BTreeMap<String, Vec<Fields>>>,
    navigation: RefCell<Option<Vec<String>>>,
    syllabus: RefCell<Option<String>>,
    writes: RefCell<usize>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_questions(&self, local_name: &str, questions: Vec<Fields>) {
        self.questions
            .borrow_mut()
            .insert(local_name.to_string(), questions);
    }

    pub fn set_navigation(&self, labels: &[&str]) {
        *self.navigation.borrow_mut() = Some(labels.iter().map(ToString::to_string).collect());
    }

    pub fn set_syllabus(&self, body: &str) {
        *self.syllabus.borrow_mut() = Some(body.to_string());
    }

    #[must_use]
    pub fn get(&self, local_name: &str) -> Option<Item> {
        self.items.borrow().get(local_name).cloned()
    }

    /// Number of item and navigation writes so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        *self.writes.borrow()
    }
}

impl Catalog for MemoryCatalog {
    fn read(&self, local_name: &str) -> Result<Option<Item>> {
        Ok(self.get(local_name))
    }

    fn write(&self, item: &Item) -> Result<()> {
        *self.writes.borrow_mut() += 1;
        let mut stored = item.clone();
        stored.parent = None;
        self.items
            .borrow_mut()
            .insert(item.local_name.clone(), stored);
        Ok(())
    }

    fn list(&self, kind: ItemKind) -> Result<Vec<String>> {
        Ok(self
            .items
            .borrow()
            .values()
            .filter(|item| item.kind == kind)
            .map(|item| item.local_name.clone())
            .collect())
    }

    fn read_questions(&self, local_name: &str) -> Result<Vec<Fields>> {
        self.questions
            .borrow()
            .get(local_name)
            .cloned()
            .ok_or_else(|| Error::InvalidItem {
                path: local_name.to_string(),
                reason: "question file not found".to_string(),
            })
    }

    fn read_navigation(&self) -> Result<Option<Vec<String>>> {
        Ok(self.navigation.borrow().clone())
    }

    fn write_navigation(&self, labels: &[String]) -> Result<()> {
        *self.writes.borrow_mut() += 1;
        *self.navigation.borrow_mut() = Some(labels.to_vec());
        Ok(())
    }

    fn read_syllabus(&self) -> Result<Option<String>> {
        Ok(self.syllabus.borrow().clone())
    }
}
