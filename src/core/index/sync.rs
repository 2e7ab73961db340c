//! Incremental index maintenance
//!
//! Methods for merging a single re-read document into the index and for
//! dropping entries, keeping parent child lists in step.

use std::path::{Path, PathBuf};

use crate::core::identity::ItemType;
use crate::core::item::ItemRecord;
use crate::core::store::{DocumentStore, StoreError};

use super::{Index, IndexEngine, IndexError, UpdateOutcome};

impl<S: DocumentStore> IndexEngine<S> {
    /// Re-read the document backing `id` and merge it into the index
    ///
    /// If no document exists any more the entry is removed instead. Never
    /// triggers a full rebuild (beyond the initial load).
    pub fn update_item(&mut self, item_type: ItemType, id: &str) -> Result<UpdateOutcome, IndexError> {
        check_target(item_type, id)?;

        let indexed_path = self
            .load_index()?
            .get(item_type, id)
            .map(|record| record.file_path.clone());

        let located = self.locate(item_type, id, indexed_path)?;
        self.apply(item_type, id, located)
    }

    /// Merge the document at `path` (relative to the root) as the entry for `id`
    ///
    /// Used when the document's location is already known, e.g. a file that
    /// was renamed to a name that no longer carries its id. Falls back to
    /// [`update_item`](Self::update_item) if the file no longer holds `id`.
    pub(crate) fn update_item_from(
        &mut self,
        item_type: ItemType,
        id: &str,
        path: &Path,
    ) -> Result<UpdateOutcome, IndexError> {
        check_target(item_type, id)?;
        self.load_index()?;

        let full = self.project().root().join(path);
        let mut unreadable = None;
        match self.read_candidate(&full, item_type, id, &mut unreadable) {
            Some(record) => self.apply(item_type, id, Some(record)),
            None => match unreadable {
                Some(e) => Err(e.into()),
                None => self.update_item(item_type, id),
            },
        }
    }

    /// Drop `id` from the index and from its parents' child lists
    ///
    /// Returns whether an entry was removed.
    pub fn remove_item(&mut self, item_type: ItemType, id: &str) -> Result<bool, IndexError> {
        check_target(item_type, id)?;
        self.load_index()?;

        let index = self.cache.index.as_mut().ok_or(IndexError::NotLoaded)?;
        let removed = remove_entry(index, item_type, id);
        if removed {
            tracing::debug!("index {} {}: removed", item_type, id);
            self.touch();
        }
        Ok(removed)
    }

    fn apply(
        &mut self,
        item_type: ItemType,
        id: &str,
        located: Option<ItemRecord>,
    ) -> Result<UpdateOutcome, IndexError> {
        let root = self.project().root().to_path_buf();
        let index = self.cache.index.as_mut().ok_or(IndexError::NotLoaded)?;

        let outcome = match located {
            None => {
                if remove_entry(index, item_type, id) {
                    UpdateOutcome::Removed
                } else {
                    UpdateOutcome::NotFound
                }
            }
            Some(mut record) => {
                record.file_path = record
                    .file_path
                    .strip_prefix(&root)
                    .map(Path::to_path_buf)
                    .unwrap_or(record.file_path);
                merge_entry(index, record)
            }
        };

        if outcome != UpdateOutcome::NotFound {
            tracing::debug!("index {} {}: {}", item_type, id, outcome);
            self.touch();
        }
        Ok(outcome)
    }

    /// Find and read the document backing `id`
    ///
    /// Only reads the indexed path, `<dir>/<id>.md` and files named
    /// `<id>.md` or `<id>-*.md` elsewhere under the type directory. Other
    /// documents are never opened, so a file renamed to an unrelated name
    /// counts as gone until the next health check picks it up.
    ///
    /// A candidate that exists but cannot be read only becomes an error when
    /// no other candidate holds the id.
    fn locate(
        &self,
        item_type: ItemType,
        id: &str,
        indexed_path: Option<PathBuf>,
    ) -> Result<Option<ItemRecord>, IndexError> {
        let mut tried: Vec<PathBuf> = Vec::new();
        let mut unreadable = None;

        let direct = indexed_path
            .map(|p| self.project().root().join(p))
            .into_iter()
            .chain(std::iter::once(self.project().item_path(item_type, id)));
        for path in direct {
            if tried.contains(&path) {
                continue;
            }
            if let Some(record) = self.read_candidate(&path, item_type, id, &mut unreadable) {
                return Ok(Some(record));
            }
            tried.push(path);
        }

        let files = self.store().list_files(&self.project().item_directory(item_type))?;
        let named = files
            .iter()
            .filter(|path| is_named_for(path, id) && !tried.contains(*path));
        for path in named {
            if let Some(record) = self.read_candidate(path, item_type, id, &mut unreadable) {
                return Ok(Some(record));
            }
        }

        match unreadable {
            Some(e) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Read `path` if it exists and holds `id`
    ///
    /// The first read failure other than a missing file is kept in
    /// `unreadable`.
    fn read_candidate(
        &self,
        path: &Path,
        item_type: ItemType,
        id: &str,
        unreadable: &mut Option<StoreError>,
    ) -> Option<ItemRecord> {
        match self.store().read(path, item_type) {
            Ok(record) if record.id == id => Some(record),
            Ok(_) | Err(StoreError::NotFound(_)) => None,
            Err(e) => {
                tracing::debug!("cannot read {} while locating {}: {}", path.display(), id, e);
                if unreadable.is_none() {
                    *unreadable = Some(e);
                }
                None
            }
        }
    }
}

/// Whether the file name alone says the document holds `id`
fn is_named_for(path: &Path, id: &str) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    match name.strip_prefix(id) {
        Some(rest) => rest == ".md" || rest.starts_with('-'),
        None => false,
    }
}

fn check_target(item_type: ItemType, id: &str) -> Result<(), IndexError> {
    if !item_type.is_indexed() {
        return Err(IndexError::NotIndexed(item_type));
    }
    item_type.check_id(id)?;
    Ok(())
}

/// Insert or replace a freshly read record, moving back-references
fn merge_entry(index: &mut Index, mut record: ItemRecord) -> UpdateOutcome {
    let item_type = record.item_type;
    let previous = index
        .map_mut(item_type)
        .and_then(|map| map.remove(&record.id));

    let outcome = match &previous {
        Some(old) => {
            index.unlink_parents(old);
            record.children = old.children.clone();
            UpdateOutcome::Updated
        }
        None => {
            record.children = index.collect_children(item_type, &record.id);
            UpdateOutcome::Added
        }
    };

    index.link_parents(&record);
    if let Some(map) = index.map_mut(item_type) {
        map.insert(record.id.clone(), record);
    }
    outcome
}

fn remove_entry(index: &mut Index, item_type: ItemType, id: &str) -> bool {
    let Some(removed) = index.map_mut(item_type).and_then(|map| map.remove(id)) else {
        return false;
    };
    index.unlink_parents(&removed);
    true
}
