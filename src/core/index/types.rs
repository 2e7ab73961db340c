//! Index type definitions
//!
//! Result and report structs returned by the index engine.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::ItemType;
use crate::core::item::WorkflowState;

// =========================================================================
// Counts & sync results
// =========================================================================

/// Derived item counts stored alongside the mappings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexCounts {
    pub epics: usize,
    pub issues: usize,
    pub tasks: usize,
    pub prs: usize,
    pub total: usize,
}

/// Statistics from a full rebuild
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub items_indexed: usize,
    pub duplicates_skipped: usize,
    pub persisted: bool,
    pub duration_ms: u64,
}

/// What a single-item update did to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The item was not indexed and now is
    Added,
    /// An indexed item was re-read
    Updated,
    /// The backing document is gone; the entry was dropped
    Removed,
    /// Neither a document nor an entry exists
    NotFound,
}

impl std::fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpdateOutcome::Added => "added",
            UpdateOutcome::Updated => "updated",
            UpdateOutcome::Removed => "removed",
            UpdateOutcome::NotFound => "not found",
        };
        write!(f, "{}", s)
    }
}

// =========================================================================
// Health
// =========================================================================

/// Headline numbers of a health check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStats {
    pub file_count: usize,
    pub indexed_count: usize,
    pub missing_count: usize,
    pub orphaned_count: usize,
}

/// A document on disk with no index entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingEntry {
    pub item_type: ItemType,
    pub id: String,
    pub path: PathBuf,
}

/// An index entry with no backing document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedEntry {
    pub item_type: ItemType,
    pub id: String,
    pub path: PathBuf,
}

/// An index entry whose document changed since it was indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleEntry {
    pub item_type: ItemType,
    pub id: String,
    pub path: PathBuf,
}

/// A document that could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadableDocument {
    pub path: PathBuf,
    pub error: String,
}

/// Two or more documents claiming the same id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateId {
    pub id: String,
    pub paths: Vec<PathBuf>,
}

/// Why a parent reference does not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceProblem {
    /// No indexed item has the referenced id
    Dangling,
    /// The referenced id is indexed under a different type
    WrongType(ItemType),
}

/// A parent reference that is dangling or points at the wrong type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InconsistentRef {
    pub id: String,
    pub field: &'static str,
    pub target: String,
    pub expected: ItemType,
    pub problem: ReferenceProblem,
}

/// Result of a non-mutating health check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// No missing and no orphaned entries
    pub is_valid: bool,
    /// False when the index file is absent or unusable
    pub index_present: bool,
    pub stats: HealthStats,
    pub missing: Vec<MissingEntry>,
    pub orphaned: Vec<OrphanedEntry>,
    pub stale: Vec<StaleEntry>,
    pub unreadable: Vec<UnreadableDocument>,
    pub duplicates: Vec<DuplicateId>,
    pub inconsistent: Vec<InconsistentRef>,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl HealthReport {
    /// Whether anything at all was reported, including issues that do not
    /// affect validity
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Result of an automatic repair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    /// Valid after repair, with the index file written
    pub repaired: bool,
    pub actions: Vec<String>,
    pub errors: Vec<String>,
    pub before: HealthReport,
    pub after: HealthReport,
}

// =========================================================================
// Overview
// =========================================================================

/// An item touched recently
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentItem {
    pub id: String,
    pub item_type: ItemType,
    pub title: String,
    pub state: WorkflowState,
    pub updated_at: DateTime<Utc>,
}

/// Delivery progress of one epic
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpicProgress {
    pub id: String,
    pub title: String,
    pub state: WorkflowState,
    pub child_count: usize,
    pub delivered_count: usize,
    pub completion_percentage: f64,
}

/// Aggregate view over the whole index
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOverview {
    pub total_items: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_state: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    /// Share of items in a delivered state, in percent
    pub completion_rate: f64,
    pub recently_updated: Vec<RecentItem>,
    pub epics: Vec<EpicProgress>,
}
