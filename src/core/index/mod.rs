//! Derived item index backed by a JSON file
//!
//! The index maps every item id to a summary record so queries never have to
//! re-read the item documents. It is:
//! - Rebuilt from the documents on demand (one scoped thread per item type)
//! - Persisted to `.workline/index.json` and gitignored
//! - Self-healing: a missing, corrupt or inconsistent file triggers a rebuild
//! - Updated per item, keeping parent back-references in step
//!
//! The documents are always the source of truth.

mod health;
mod queries;
mod sync;
mod types;

pub use queries::{overview, RECENT_DAYS};
pub use types::*;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::Config;
use crate::core::identity::{IdError, ItemType};
use crate::core::item::{ChildRefs, ItemRecord};
use crate::core::project::Project;
use crate::core::store::{DocumentStore, MarkdownStore, StoreError};

/// Current index format version - files with another version are rebuilt
pub const INDEX_VERSION: &str = "1";

/// Errors surfaced by the index engine
///
/// Corrupt or missing index files are never reported here; they are
/// recovered by rebuilding.
#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("project root {} does not exist or cannot be read", .0.display())]
    #[diagnostic(code(workline::index::root_unavailable))]
    RootUnavailable(PathBuf),

    #[error("{0} items are not indexed")]
    #[diagnostic(
        code(workline::index::not_indexed),
        help("Only epics, issues, tasks and pull requests are indexed")
    )]
    NotIndexed(ItemType),

    #[error(transparent)]
    #[diagnostic(code(workline::index::invalid_id))]
    InvalidId(#[from] IdError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error("scanning {0} documents panicked")]
    #[diagnostic(code(workline::index::scan_panicked))]
    ScanPanicked(ItemType),

    #[error("index has not been loaded")]
    #[diagnostic(code(workline::index::not_loaded))]
    NotLoaded,
}

/// The persisted index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub project_path: PathBuf,
    #[serde(default)]
    pub epics: BTreeMap<String, ItemRecord>,
    #[serde(default)]
    pub issues: BTreeMap<String, ItemRecord>,
    #[serde(default)]
    pub tasks: BTreeMap<String, ItemRecord>,
    #[serde(default)]
    pub prs: BTreeMap<String, ItemRecord>,
    #[serde(default)]
    pub counts: IndexCounts,
}

impl Index {
    /// Empty index for a project root
    pub fn new(project_path: &Path) -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            last_updated: Utc::now(),
            project_path: project_path.to_path_buf(),
            epics: BTreeMap::new(),
            issues: BTreeMap::new(),
            tasks: BTreeMap::new(),
            prs: BTreeMap::new(),
            counts: IndexCounts::default(),
        }
    }

    /// Mapping for an item type (`None` for non-indexed types)
    pub fn map(&self, item_type: ItemType) -> Option<&BTreeMap<String, ItemRecord>> {
        match item_type {
            ItemType::Epic => Some(&self.epics),
            ItemType::Issue => Some(&self.issues),
            ItemType::Task => Some(&self.tasks),
            ItemType::Pr => Some(&self.prs),
            ItemType::Project => None,
        }
    }

    pub fn map_mut(&mut self, item_type: ItemType) -> Option<&mut BTreeMap<String, ItemRecord>> {
        match item_type {
            ItemType::Epic => Some(&mut self.epics),
            ItemType::Issue => Some(&mut self.issues),
            ItemType::Task => Some(&mut self.tasks),
            ItemType::Pr => Some(&mut self.prs),
            ItemType::Project => None,
        }
    }

    pub fn get(&self, item_type: ItemType, id: &str) -> Option<&ItemRecord> {
        self.map(item_type)?.get(id)
    }

    /// Look an id up in every mapping
    pub fn find(&self, id: &str) -> Option<&ItemRecord> {
        ItemType::indexed()
            .iter()
            .find_map(|&item_type| self.get(item_type, id))
    }

    /// The type whose mapping holds `id`
    pub fn type_of(&self, id: &str) -> Option<ItemType> {
        self.find(id).map(|item| item.item_type)
    }

    /// All records, in hierarchy order then id order
    pub fn items(&self) -> impl Iterator<Item = &ItemRecord> {
        self.epics
            .values()
            .chain(self.issues.values())
            .chain(self.tasks.values())
            .chain(self.prs.values())
    }

    pub fn len(&self) -> usize {
        self.epics.len() + self.issues.len() + self.tasks.len() + self.prs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn computed_counts(&self) -> IndexCounts {
        IndexCounts {
            epics: self.epics.len(),
            issues: self.issues.len(),
            tasks: self.tasks.len(),
            prs: self.prs.len(),
            total: self.len(),
        }
    }

    pub fn refresh_counts(&mut self) {
        self.counts = self.computed_counts();
    }

    /// Recompute every child list from the records' parent references
    pub fn link_children(&mut self) {
        for item_type in ItemType::indexed() {
            if let Some(map) = self.map_mut(*item_type) {
                for record in map.values_mut() {
                    record.children = ChildRefs::default();
                }
            }
        }

        let links: Vec<(ItemType, String, ItemType, String)> = self
            .items()
            .flat_map(|child| {
                child.parent_refs().into_iter().map(move |parent| {
                    (
                        parent.parent_type,
                        parent.id.to_string(),
                        child.item_type,
                        child.id.clone(),
                    )
                })
            })
            .collect();

        for (parent_type, parent_id, child_type, child_id) in links {
            self.attach(parent_type, &parent_id, child_type, &child_id);
        }
    }

    /// Child lists for `(item_type, id)` computed from the records already indexed
    pub fn collect_children(&self, item_type: ItemType, id: &str) -> ChildRefs {
        let mut children = ChildRefs::default();
        for child in self.items() {
            let points_here = child
                .parent_refs()
                .iter()
                .any(|parent| parent.parent_type == item_type && parent.id == id);
            if points_here {
                children.insert(child.item_type, &child.id);
            }
        }
        children
    }

    /// Add `record` to the child lists of the parents it references
    pub(crate) fn link_parents(&mut self, record: &ItemRecord) {
        for parent in record.parent_refs() {
            self.attach(parent.parent_type, parent.id, record.item_type, &record.id);
        }
    }

    /// Remove `record` from the child lists of the parents it references
    pub(crate) fn unlink_parents(&mut self, record: &ItemRecord) {
        for parent in record.parent_refs() {
            if let Some(target) = self
                .map_mut(parent.parent_type)
                .and_then(|map| map.get_mut(parent.id))
            {
                target.children.remove(record.item_type, &record.id);
            }
        }
    }

    fn attach(&mut self, parent_type: ItemType, parent_id: &str, child_type: ItemType, child_id: &str) {
        if let Some(parent) = self
            .map_mut(parent_type)
            .and_then(|map| map.get_mut(parent_id))
        {
            parent.children.insert(child_type, child_id);
        }
    }

    /// Structural problems that make a loaded file unusable
    pub fn structural_problems(&self, project_root: &Path) -> Vec<String> {
        let mut problems = Vec::new();

        if self.version != INDEX_VERSION {
            problems.push(format!(
                "index version {} does not match {}",
                self.version, INDEX_VERSION
            ));
        }
        if self.project_path != project_root {
            problems.push(format!(
                "index describes {} instead of {}",
                self.project_path.display(),
                project_root.display()
            ));
        }

        for &item_type in ItemType::indexed() {
            let Some(map) = self.map(item_type) else {
                continue;
            };
            for (key, record) in map {
                if key != &record.id {
                    problems.push(format!("key {} holds record {}", key, record.id));
                }
                if record.item_type != item_type {
                    problems.push(format!(
                        "{} is a {} stored with {}",
                        record.id,
                        record.item_type,
                        item_type.plural()
                    ));
                }
            }
        }

        if self.computed_counts() != self.counts {
            problems.push("stored counts do not match the mappings".to_string());
        }

        problems
    }
}

#[derive(Debug, Default)]
struct CacheState {
    index: Option<Index>,
    loaded_at: Option<Instant>,
    generation: u64,
}

/// Builds, persists, loads and repairs the index for one project
pub struct IndexEngine<S: DocumentStore = MarkdownStore> {
    project: Project,
    store: S,
    ttl: Duration,
    cache: CacheState,
}

impl IndexEngine<MarkdownStore> {
    /// Engine over Markdown documents, with TTL from configuration
    pub fn open(project: Project, config: &Config) -> Self {
        Self::with_store(project, MarkdownStore::new(), config.index_ttl())
    }
}

impl<S: DocumentStore> IndexEngine<S> {
    pub fn with_store(project: Project, store: S, ttl: Duration) -> Self {
        Self {
            project,
            store,
            ttl,
            cache: CacheState::default(),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Counter bumped by every rebuild, reload and mutation
    pub fn generation(&self) -> u64 {
        self.cache.generation
    }

    /// The in-memory index, if one is loaded (regardless of age)
    pub fn cached(&self) -> Result<&Index, IndexError> {
        self.cache.index.as_ref().ok_or(IndexError::NotLoaded)
    }

    /// Drop the in-memory copy so the next read goes back to disk
    pub fn invalidate(&mut self) {
        if self.cache.index.take().is_some() {
            self.cache.loaded_at = None;
            self.cache.generation += 1;
        }
    }

    fn cache_is_fresh(&self) -> bool {
        match (&self.cache.index, self.cache.loaded_at) {
            (Some(_), Some(loaded_at)) => loaded_at.elapsed() < self.ttl,
            _ => false,
        }
    }

    fn install(&mut self, index: Index) {
        self.cache.index = Some(index);
        self.cache.loaded_at = Some(Instant::now());
        self.cache.generation += 1;
    }

    fn ensure_root(&self) -> Result<(), IndexError> {
        let root = self.project.root();
        if !root.is_dir() || fs::read_dir(root).is_err() {
            return Err(IndexError::RootUnavailable(root.to_path_buf()));
        }
        Ok(())
    }

    /// Return the cached index, re-reading or rebuilding it when needed
    ///
    /// Order: fresh in-memory copy, then the index file, then a full rebuild.
    /// A corrupt file is never reported as an error.
    pub fn load_index(&mut self) -> Result<&Index, IndexError> {
        if self.cache_is_fresh() {
            tracing::debug!("index cache hit (generation {})", self.cache.generation);
        } else {
            match self.read_persisted() {
                Ok(index) => {
                    tracing::debug!("loaded index from {}", self.project.index_path().display());
                    self.install(index);
                }
                Err(reason) => {
                    tracing::debug!("rebuilding index: {}", reason);
                    self.rebuild_index()?;
                }
            }
        }
        self.cached()
    }

    /// Read and validate the index file
    ///
    /// The error is a human-readable reason the file cannot be used.
    pub(crate) fn read_persisted(&self) -> Result<Index, String> {
        let path = self.project.index_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err("index file does not exist".to_string());
            }
            Err(e) => {
                tracing::warn!("Cannot read index file {}: {}", path.display(), e);
                return Err(format!("index file cannot be read: {}", e));
            }
        };

        let index: Index = serde_json::from_str(&content).map_err(|e| {
            tracing::warn!("Ignoring corrupt index file {}: {}", path.display(), e);
            format!("index file is corrupt: {}", e)
        })?;

        let problems = index.structural_problems(self.project.root());
        if let Some(first) = problems.first() {
            tracing::warn!(
                "Ignoring inconsistent index file {}: {}",
                path.display(),
                first
            );
            return Err(format!("index file is inconsistent: {}", first));
        }

        Ok(index)
    }

    /// Full rebuild from the documents
    ///
    /// Scans the four item directories concurrently, links parents to
    /// children, persists and replaces the in-memory copy.
    pub fn rebuild_index(&mut self) -> Result<SyncStats, IndexError> {
        self.ensure_root()?;
        let start = Instant::now();
        let mut stats = SyncStats::default();

        let scans = self.scan_all();
        let mut index = Index::new(self.project.root());

        for (item_type, scanned) in scans {
            let records = scanned?;
            let Some(map) = index.map_mut(item_type) else {
                continue;
            };

            for mut record in records {
                if map.contains_key(&record.id) {
                    tracing::warn!(
                        "Duplicate id {} in {}; keeping the first document",
                        record.id,
                        record.file_path.display()
                    );
                    stats.duplicates_skipped += 1;
                    continue;
                }
                record.file_path = self.project.relative_path(&record.file_path);
                map.insert(record.id.clone(), record);
            }
        }

        index.link_children();
        index.refresh_counts();
        stats.items_indexed = index.len();

        self.install(index);
        stats.persisted = self.persist();
        stats.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "rebuilt index: {} items in {} ms",
            stats.items_indexed,
            stats.duration_ms
        );
        Ok(stats)
    }

    /// Scan every item directory, one scoped thread per type
    fn scan_all(&self) -> Vec<(ItemType, Result<Vec<ItemRecord>, IndexError>)> {
        let store = &self.store;
        let jobs: Vec<(ItemType, PathBuf)> = ItemType::indexed()
            .iter()
            .map(|&item_type| (item_type, self.project.item_directory(item_type)))
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|(item_type, dir)| {
                    (
                        item_type,
                        scope.spawn(move || store.scan(&dir, item_type)),
                    )
                })
                .collect();

            handles
                .into_iter()
                .map(|(item_type, handle)| {
                    let result = match handle.join() {
                        Ok(scanned) => scanned.map_err(IndexError::from),
                        Err(_) => Err(IndexError::ScanPanicked(item_type)),
                    };
                    (item_type, result)
                })
                .collect()
        })
    }

    /// Write the in-memory index to disk
    ///
    /// Failures are logged; the in-memory copy stays authoritative until the
    /// next successful write.
    pub(crate) fn persist(&self) -> bool {
        let Some(index) = &self.cache.index else {
            return false;
        };

        let path = self.project.index_path();
        let result = serde_json::to_string_pretty(index)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                let tmp = path.with_extension("json.tmp");
                fs::write(&tmp, json + "\n").map_err(|e| e.to_string())?;
                fs::rename(&tmp, &path).map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to write index {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Record a mutation: bump the timestamp and generation, then persist
    pub(crate) fn touch(&mut self) {
        if let Some(index) = self.cache.index.as_mut() {
            index.last_updated = Utc::now();
            index.refresh_counts();
        }
        self.cache.generation += 1;
        self.persist();
    }

    /// Delete the index file and drop the in-memory copy
    ///
    /// Returns whether a file was removed.
    pub fn clear_index(&mut self) -> Result<bool, IndexError> {
        self.invalidate();
        let path = self.project.index_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io { path, source: e }.into()),
        }
    }
}
