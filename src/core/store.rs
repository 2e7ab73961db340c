//! Document store: reads and writes item documents on disk
//!
//! The index only ever consumes the store through [`DocumentStore`], so the
//! on-disk format is swappable. [`MarkdownStore`] is the bundled format:
//! Markdown files with a YAML front matter block.

use chrono::{DateTime, NaiveDate, Utc};
use miette::Diagnostic;
use serde_yml::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::identity::{IdError, ItemType};
use crate::core::item::{ItemRecord, Priority, ResolutionStatus, TransitionRecord, WorkflowState};
use crate::yaml::{FrontMatter, FrontMatterError};

/// File extension of item documents
pub const DOCUMENT_EXTENSION: &str = "md";

/// Errors surfaced by a document store
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("document not found: {}", .0.display())]
    #[diagnostic(code(workline::store::not_found))]
    NotFound(PathBuf),

    #[error("failed to access {}: {source}", path.display())]
    #[diagnostic(code(workline::store::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid front matter in {}", path.display())]
    #[diagnostic(code(workline::store::front_matter))]
    FrontMatter {
        path: PathBuf,
        #[source]
        #[diagnostic_source]
        source: FrontMatterError,
    },

    #[error("{}: missing required field '{field}'", path.display())]
    #[diagnostic(code(workline::store::missing_field))]
    MissingField { path: PathBuf, field: &'static str },

    #[error("{}: invalid value for '{field}': {message}", path.display())]
    #[diagnostic(code(workline::store::invalid_field))]
    InvalidField {
        path: PathBuf,
        field: &'static str,
        message: String,
    },

    #[error("{}: document declares type {declared} but is stored with {expected} items", path.display())]
    #[diagnostic(
        code(workline::store::type_mismatch),
        help("Move the file to the directory for its type or fix its 'type' field")
    )]
    TypeMismatch {
        path: PathBuf,
        declared: ItemType,
        expected: ItemType,
    },

    #[error("{}: {source}", path.display())]
    #[diagnostic(code(workline::store::prefix_mismatch))]
    PrefixMismatch {
        path: PathBuf,
        #[source]
        source: IdError,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// A partial update to a document's metadata: set or remove individual fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates {
    entries: Vec<(String, Option<Value>)>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to a value
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.entries.push((key.to_string(), Some(value.into())));
        self
    }

    /// Remove a field
    pub fn remove(mut self, key: &str) -> Self {
        self.entries.push((key.to_string(), None));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Apply to a parsed document, in insertion order
    pub fn apply(&self, doc: &mut FrontMatter) {
        for (key, value) in self.iter() {
            match value {
                Some(v) => doc.set(key, v.clone()),
                None => {
                    doc.remove(key);
                }
            }
        }
    }
}

/// Read/write access to item documents
///
/// Implementations must be side-effect free on read and must report missing
/// files and parse failures as [`StoreError`] values.
pub trait DocumentStore: Send + Sync {
    /// Read every readable document of `item_type` under `dir`
    ///
    /// A missing directory yields an empty list. Documents that fail to parse
    /// are skipped.
    fn scan(&self, dir: &Path, item_type: ItemType) -> Result<Vec<ItemRecord>, StoreError>;

    /// Read a single document
    fn read(&self, path: &Path, item_type: ItemType) -> Result<ItemRecord, StoreError>;

    /// List document paths under `dir`, sorted
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, StoreError>;

    /// Apply a partial metadata update without touching the document body
    fn write_fields(&self, path: &Path, updates: &FieldUpdates) -> Result<(), StoreError>;
}

/// Markdown documents with YAML front matter
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownStore;

impl MarkdownStore {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentStore for MarkdownStore {
    fn scan(&self, dir: &Path, item_type: ItemType) -> Result<Vec<ItemRecord>, StoreError> {
        let mut records = Vec::new();

        for path in self.list_files(dir)? {
            match self.read(&path, item_type) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        Ok(records)
    }

    fn read(&self, path: &Path, item_type: ItemType) -> Result<ItemRecord, StoreError> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let doc = FrontMatter::parse(&content, &filename).map_err(|source| {
            StoreError::FrontMatter {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let mut record = record_from_front_matter(&doc, path, item_type)?;
        record.file_path = path.to_path_buf();
        record.file_hash = content_hash(&content);
        Ok(record)
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    return Err(match e.into_io_error() {
                        Some(io) => StoreError::io(&path, io),
                        None => StoreError::NotFound(path),
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() && is_document(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }

        Ok(files)
    }

    fn write_fields(&self, path: &Path, updates: &FieldUpdates) -> Result<(), StoreError> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let front_matter_err = |source| StoreError::FrontMatter {
            path: path.to_path_buf(),
            source,
        };

        let mut doc = FrontMatter::parse(&content, &filename).map_err(front_matter_err)?;
        updates.apply(&mut doc);
        let rendered = doc.render().map_err(front_matter_err)?;

        fs::write(path, rendered).map_err(|e| StoreError::io(path, e))
    }
}

/// Whether a path looks like an item document (visible `*.md` file)
pub fn is_document(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(true);
    !hidden && path.extension().is_some_and(|e| e == DOCUMENT_EXTENSION)
}

/// Compute SHA256 hash of content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build an item record from parsed front matter
///
/// The record's type comes from the document's own `type` field when present,
/// otherwise from the directory it was read from; the two must agree.
pub fn record_from_front_matter(
    doc: &FrontMatter,
    path: &Path,
    expected: ItemType,
) -> Result<ItemRecord, StoreError> {
    let invalid = |field: &'static str, message: String| StoreError::InvalidField {
        path: path.to_path_buf(),
        field,
        message,
    };

    let item_type = match non_empty_str(doc, &["type"]) {
        Some(declared) => {
            let declared: ItemType = declared
                .parse()
                .map_err(|e: IdError| invalid("type", e.to_string()))?;
            if declared != expected {
                return Err(StoreError::TypeMismatch {
                    path: path.to_path_buf(),
                    declared,
                    expected,
                });
            }
            declared
        }
        None => expected,
    };

    let id = non_empty_str(doc, &["id"]).ok_or_else(|| StoreError::MissingField {
        path: path.to_path_buf(),
        field: "id",
    })?;
    item_type
        .check_id(id)
        .map_err(|source| StoreError::PrefixMismatch {
            path: path.to_path_buf(),
            source,
        })?;

    let title = non_empty_str(doc, &["title", "name"]).unwrap_or("Untitled");
    let mut record = ItemRecord::new(item_type, id, title);

    if let Some(status) = non_empty_str(doc, &["status"]) {
        match status.parse::<WorkflowState>() {
            Ok(WorkflowState::Lifecycle(lifecycle)) => record.status = lifecycle,
            Ok(WorkflowState::Resolution(resolution)) => {
                record.status = resolution.implied_lifecycle();
                record.resolution = Some(resolution);
            }
            Err(e) => return Err(invalid("status", e)),
        }
    }

    if let Some(resolution) = non_empty_str(doc, &["resolution"]) {
        record.resolution = Some(
            resolution
                .parse::<ResolutionStatus>()
                .map_err(|e| invalid("resolution", e))?,
        );
    }

    if let Some(priority) = non_empty_str(doc, &["priority"]) {
        record.priority = priority
            .parse::<Priority>()
            .map_err(|e| invalid("priority", e))?;
    }

    record.assignee = non_empty_str(doc, &["assignee"]).map(String::from);
    record.tags = string_list(doc, &["tags", "labels"]).into_iter().collect::<BTreeSet<_>>();
    record.created_at = timestamp(doc, &["created_at", "createdAt", "created"], path);
    record.updated_at = timestamp(doc, &["updated_at", "updatedAt", "updated"], path);

    record.epic_id = non_empty_str(doc, &["epic_id", "epicId", "epic"]).map(String::from);
    record.issue_id = non_empty_str(doc, &["issue_id", "issueId", "issue"]).map(String::from);
    record.task_id = non_empty_str(doc, &["task_id", "taskId", "task"]).map(String::from);
    record.dependencies = string_list(doc, &["dependencies", "depends_on"]);
    record.blocked_by = string_list(doc, &["blocked_by", "blockedBy"]);

    if let Some(value) = first_field(doc, &["completion_percentage", "completionPercentage"]) {
        record.completion_percentage = match value {
            Value::Null => None,
            other => Some(percentage(other).ok_or_else(|| {
                invalid(
                    "completion_percentage",
                    "expected a number between 0 and 100".to_string(),
                )
            })?),
        };
    }

    if let Some(meta) = first_field(doc, &["state_metadata", "stateMetadata"]) {
        match serde_yml::from_value::<TransitionRecord>(meta.clone()) {
            Ok(transition) => record.state_metadata = Some(transition),
            Err(e) => tracing::warn!(
                "Ignoring malformed state_metadata in {}: {}",
                path.display(),
                e
            ),
        }
    }

    Ok(record)
}

fn first_field<'a>(doc: &'a FrontMatter, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| doc.get(k))
}

fn non_empty_str<'a>(doc: &'a FrontMatter, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| doc.get_str(k))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A list field written either as a YAML sequence or a comma-separated string
fn string_list(doc: &FrontMatter, keys: &[&str]) -> Vec<String> {
    let Some(value) = first_field(doc, keys) else {
        return Vec::new();
    };

    let items: Vec<String> = match value {
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => s.split(',').map(String::from).collect(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn timestamp(doc: &FrontMatter, keys: &[&str], path: &Path) -> Option<DateTime<Utc>> {
    let raw = non_empty_str(doc, keys)?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    tracing::warn!("Ignoring unparsable timestamp '{}' in {}", raw, path.display());
    None
}

fn percentage(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };

    if (0.0..=100.0).contains(&number) {
        Some(number.round() as u8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::LifecycleStatus;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_full_record() {
        let tmp = tempdir().unwrap();
        let path = write(
            tmp.path(),
            "TSK-0001.md",
            r#"---
id: TSK-0001
title: Write migration
status: active
priority: high
assignee: alice
tags: [db, backend]
created_at: 2024-01-15T10:30:00Z
updated_at: 2024-01-16
epic_id: EP-0001
issue_id: ISS-0002
dependencies:
  - TSK-0003
blocked_by: TSK-0004, TSK-0005
completion_percentage: 40
---

Details.
"#,
        );

        let record = MarkdownStore.read(&path, ItemType::Task).unwrap();
        assert_eq!(record.id, "TSK-0001");
        assert_eq!(record.item_type, ItemType::Task);
        assert_eq!(record.title, "Write migration");
        assert_eq!(record.status, LifecycleStatus::Active);
        assert_eq!(record.priority, Priority::High);
        assert_eq!(record.assignee.as_deref(), Some("alice"));
        assert!(record.tags.contains("db"));
        assert!(record.created_at.is_some());
        assert!(record.updated_at.is_some());
        assert_eq!(record.epic_id.as_deref(), Some("EP-0001"));
        assert_eq!(record.issue_id.as_deref(), Some("ISS-0002"));
        assert_eq!(record.dependencies, vec!["TSK-0003"]);
        assert_eq!(record.blocked_by, vec!["TSK-0004", "TSK-0005"]);
        assert_eq!(record.completion_percentage, Some(40));
        assert_eq!(record.file_hash.len(), 64);
    }

    #[test]
    fn test_defaults_for_sparse_document() {
        let tmp = tempdir().unwrap();
        let path = write(tmp.path(), "EP-0001.md", "---\nid: EP-0001\n---\n");

        let record = MarkdownStore.read(&path, ItemType::Epic).unwrap();
        assert_eq!(record.title, "Untitled");
        assert_eq!(record.status, LifecycleStatus::Planning);
        assert_eq!(record.priority, Priority::Medium);
        assert!(record.resolution.is_none());
    }

    #[test]
    fn test_resolution_in_status_field() {
        let tmp = tempdir().unwrap();
        let path = write(
            tmp.path(),
            "ISS-0001.md",
            "---\nid: ISS-0001\nstatus: done\n---\n",
        );

        let record = MarkdownStore.read(&path, ItemType::Issue).unwrap();
        assert_eq!(record.resolution, Some(ResolutionStatus::Done));
        assert_eq!(record.status, LifecycleStatus::Completed);
        assert_eq!(record.effective_state(), WorkflowState::DONE);
    }

    #[test]
    fn test_type_and_prefix_checks() {
        let tmp = tempdir().unwrap();
        let declared = write(
            tmp.path(),
            "a.md",
            "---\nid: ISS-0001\ntype: issue\n---\n",
        );
        let err = MarkdownStore.read(&declared, ItemType::Task).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));

        let wrong_prefix = write(tmp.path(), "b.md", "---\nid: ISS-0001\n---\n");
        let err = MarkdownStore.read(&wrong_prefix, ItemType::Task).unwrap_err();
        assert!(matches!(err, StoreError::PrefixMismatch { .. }));

        let no_id = write(tmp.path(), "c.md", "---\ntitle: x\n---\n");
        let err = MarkdownStore.read(&no_id, ItemType::Task).unwrap_err();
        assert!(matches!(err, StoreError::MissingField { field: "id", .. }));
    }

    #[test]
    fn test_invalid_status_is_typed_error() {
        let tmp = tempdir().unwrap();
        let path = write(
            tmp.path(),
            "EP-1.md",
            "---\nid: EP-1\nstatus: someday\n---\n",
        );
        let err = MarkdownStore.read(&path, ItemType::Epic).unwrap_err();
        assert!(matches!(err, StoreError::InvalidField { field: "status", .. }));
    }

    #[test]
    fn test_read_missing_file() {
        let tmp = tempdir().unwrap();
        let err = MarkdownStore
            .read(&tmp.path().join("EP-9.md"), ItemType::Epic)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_scan_skips_bad_documents_and_missing_dir() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("epics");
        write(&dir, "EP-0002.md", "---\nid: EP-0002\n---\n");
        write(&dir, "EP-0001.md", "---\nid: EP-0001\n---\n");
        write(&dir, "broken.md", "no front matter");
        write(&dir, "notes.txt", "ignored");
        write(&dir, ".hidden.md", "---\nid: EP-0009\n---\n");

        let records = MarkdownStore.scan(&dir, ItemType::Epic).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["EP-0001", "EP-0002"]);

        let none = MarkdownStore
            .scan(&tmp.path().join("missing"), ItemType::Epic)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_write_fields_partial_update() {
        let tmp = tempdir().unwrap();
        let path = write(
            tmp.path(),
            "ISS-0001.md",
            "---\nid: ISS-0001\nstatus: active\nresolution: ready_for_qa\n---\nKeep me.\n",
        );

        let updates = FieldUpdates::new()
            .set("status", "completed")
            .remove("resolution");
        MarkdownStore.write_fields(&path, &updates).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("---\nKeep me.\n"));
        let record = MarkdownStore.read(&path, ItemType::Issue).unwrap();
        assert_eq!(record.status, LifecycleStatus::Completed);
        assert!(record.resolution.is_none());
    }

    #[test]
    fn test_percentage_parsing() {
        assert_eq!(percentage(&Value::from(55)), Some(55));
        assert_eq!(percentage(&Value::String("80%".into())), Some(80));
        assert_eq!(percentage(&Value::from(120)), None);
    }
}
