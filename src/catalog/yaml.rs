//! Tagged-YAML catalog on disk.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::Value as Yaml;
use tracing::debug;

use super::{atomic_write, Catalog, NAVIGATION_FILE, SYLLABUS_FILE};
use crate::error::{Error, Result};
use crate::model::{Fields, Item, ItemKind};

/// Catalog rooted at a course content directory.
#[derive(Debug, Clone)]
pub struct YamlCatalog {
    root: PathBuf,
}

impl YamlCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every per-kind directory. Returns the ones that were missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn create_dirs(&self) -> Result<Vec<&'static str>> {
        let mut created = Vec::new();
        for dir in Self::dirs() {
            let path = self.root.join(dir);
            if !path.is_dir() {
                fs::create_dir_all(&path)?;
                created.push(dir);
            }
        }
        Ok(created)
    }

    /// Per-kind directory names, sorted.
    #[must_use]
    pub fn dirs() -> Vec<&'static str> {
        let mut dirs: Vec<&'static str> = ItemKind::ALL.iter().filter_map(ItemKind::dir).collect();
        dirs.sort_unstable();
        dirs
    }

    /// Resolve a local name to a path under the root.
    fn path_for(&self, local_name: &str) -> Result<PathBuf> {
        let relative = Path::new(local_name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if local_name.is_empty() || escapes {
            return Err(Error::InvalidItem {
                path: local_name.to_string(),
                reason: "local names must be relative paths inside the content directory"
                    .to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    /// Parse the single YAML document in `local_name`.
    fn load_document(&self, local_name: &str) -> Result<Option<Yaml>> {
        let path = self.path_for(local_name)?;
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        debug!(local_name, bytes = text.len(), "read catalog file");

        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(&text) {
            let value = Yaml::deserialize(document).map_err(|e| invalid(local_name, e))?;
            if !value.is_null() {
                documents.push(value);
            }
        }

        match documents.len() {
            0 => Err(invalid(local_name, "file is empty")),
            1 => Ok(documents.pop()),
            n => Err(Error::AmbiguousLocalMatch {
                name: local_name.to_string(),
                matches: (1..=n).map(|i| format!("{local_name} (document {i})")).collect(),
            }),
        }
    }
}

impl Catalog for YamlCatalog {
    fn read(&self, local_name: &str) -> Result<Option<Item>> {
        let Some(document) = self.load_document(local_name)? else {
            return Ok(None);
        };

        let (kind, body) = match document {
            Yaml::Tagged(tagged) => {
                let TaggedValue { tag, value } = *tagged;
                (ItemKind::from_tag(&tag.to_string())?, value)
            }
            untagged => {
                let dir = local_name.split('/').next().unwrap_or_default();
                let kind = ItemKind::from_dir(dir)
                    .ok_or_else(|| invalid(local_name, "missing kind tag (e.g. !Assignment)"))?;
                (kind, untagged)
            }
        };

        // Question banks and the tab list are read through their own methods.
        if !kind.catalog_tracked() {
            return Ok(Some(Item::new(kind, local_name)));
        }

        Ok(Some(Item::with_fields(kind, local_name, to_fields(local_name, body)?)))
    }

    fn write(&self, item: &Item) -> Result<()> {
        let path = self.path_for(&item.local_name)?;
        let value = serde_yaml::to_value(item.fields())?;
        let document = Yaml::Tagged(Box::new(TaggedValue {
            tag: Tag::new(item.kind.tag()),
            value,
        }));
        atomic_write(&path, &serde_yaml::to_string(&document)?)?;
        debug!(local_name = %item.local_name, "wrote catalog file");
        Ok(())
    }

    fn list(&self, kind: ItemKind) -> Result<Vec<String>> {
        let Some(dir) = kind.dir() else {
            return Ok(Vec::new());
        };
        let path = self.root.join(dir);
        if !path.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            let is_yaml = Path::new(&file_name)
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if is_yaml && entry.file_type()?.is_file() {
                names.push(format!("{dir}/{file_name}"));
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_questions(&self, local_name: &str) -> Result<Vec<Fields>> {
        let document = self
            .load_document(local_name)?
            .ok_or_else(|| invalid(local_name, "question file not found"))?;

        match untag(document) {
            Yaml::Sequence(entries) => entries
                .into_iter()
                .map(|entry| to_fields(local_name, untag(entry)))
                .collect(),
            mapping @ Yaml::Mapping(_) => Ok(vec![to_fields(local_name, mapping)?]),
            _ => Err(invalid(local_name, "expected a question or a list of questions")),
        }
    }

    fn read_navigation(&self) -> Result<Option<Vec<String>>> {
        let Some(document) = self.load_document(NAVIGATION_FILE)? else {
            return Ok(None);
        };

        match untag(document) {
            Yaml::Sequence(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    Yaml::String(label) => Ok(label),
                    _ => Err(invalid(NAVIGATION_FILE, "tab labels must be strings")),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            _ => Err(invalid(NAVIGATION_FILE, "expected a list of tab labels")),
        }
    }

    fn write_navigation(&self, labels: &[String]) -> Result<()> {
        let document = Yaml::Tagged(Box::new(TaggedValue {
            tag: Tag::new(ItemKind::NavigationTab.tag()),
            value: serde_yaml::to_value(labels)?,
        }));
        atomic_write(&self.root.join(NAVIGATION_FILE), &serde_yaml::to_string(&document)?)
    }

    fn read_syllabus(&self) -> Result<Option<String>> {
        let path = self.root.join(SYLLABUS_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        debug!(bytes = text.len(), "read syllabus");
        Ok(Some(text))
    }
}

fn untag(value: Yaml) -> Yaml {
    match value {
        Yaml::Tagged(tagged) => tagged.value,
        other => other,
    }
}

fn to_fields(local_name: &str, body: Yaml) -> Result<Fields> {
    match body {
        Yaml::Mapping(_) => match serde_json::to_value(&body) {
            Ok(serde_json::Value::Object(fields)) => Ok(fields),
            Ok(_) => Err(invalid(local_name, "expected a mapping of fields")),
            Err(e) => Err(invalid(local_name, e)),
        },
        Yaml::Null => Ok(Fields::new()),
        _ => Err(invalid(local_name, "expected a mapping of fields")),
    }
}

fn invalid(local_name: &str, reason: impl std::fmt::Display) -> Error {
    Error::InvalidItem {
        path: local_name.to_string(),
        reason: reason.to_string(),
    }
}
