//! Item records - the canonical unit stored in the index

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::core::identity::ItemType;

/// Lifecycle status every item starts in
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    #[default]
    Planning,
    Active,
    Completed,
    Archived,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Planning => "planning",
            LifecycleStatus::Active => "active",
            LifecycleStatus::Completed => "completed",
            LifecycleStatus::Archived => "archived",
        }
    }

    pub fn all() -> &'static [LifecycleStatus] {
        &[
            LifecycleStatus::Planning,
            LifecycleStatus::Active,
            LifecycleStatus::Completed,
            LifecycleStatus::Archived,
        ]
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "planning" => Ok(LifecycleStatus::Planning),
            "active" => Ok(LifecycleStatus::Active),
            "completed" => Ok(LifecycleStatus::Completed),
            "archived" => Ok(LifecycleStatus::Archived),
            _ => Err(format!("Unknown lifecycle status: {}", s)),
        }
    }
}

/// Resolution status layered on top of the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    ReadyForEngineering,
    ReadyForQa,
    ReadyForDeployment,
    Done,
    #[serde(rename = "won_t_do")]
    WontDo,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::ReadyForEngineering => "ready_for_engineering",
            ResolutionStatus::ReadyForQa => "ready_for_qa",
            ResolutionStatus::ReadyForDeployment => "ready_for_deployment",
            ResolutionStatus::Done => "done",
            ResolutionStatus::WontDo => "won_t_do",
        }
    }

    pub fn all() -> &'static [ResolutionStatus] {
        &[
            ResolutionStatus::ReadyForEngineering,
            ResolutionStatus::ReadyForQa,
            ResolutionStatus::ReadyForDeployment,
            ResolutionStatus::Done,
            ResolutionStatus::WontDo,
        ]
    }

    /// Lifecycle status implied when a document only records a resolution
    pub fn implied_lifecycle(&self) -> LifecycleStatus {
        match self {
            ResolutionStatus::Done => LifecycleStatus::Completed,
            _ => LifecycleStatus::Active,
        }
    }
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResolutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "ready_for_engineering" => Ok(ResolutionStatus::ReadyForEngineering),
            "ready_for_qa" => Ok(ResolutionStatus::ReadyForQa),
            "ready_for_deployment" => Ok(ResolutionStatus::ReadyForDeployment),
            "done" => Ok(ResolutionStatus::Done),
            "won_t_do" | "wont_do" | "won't_do" => Ok(ResolutionStatus::WontDo),
            _ => Err(format!("Unknown resolution status: {}", s)),
        }
    }
}

/// The state used for workflow decisions: either space, never both
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkflowState {
    Lifecycle(LifecycleStatus),
    Resolution(ResolutionStatus),
}

impl WorkflowState {
    pub const PLANNING: WorkflowState = WorkflowState::Lifecycle(LifecycleStatus::Planning);
    pub const ACTIVE: WorkflowState = WorkflowState::Lifecycle(LifecycleStatus::Active);
    pub const COMPLETED: WorkflowState = WorkflowState::Lifecycle(LifecycleStatus::Completed);
    pub const ARCHIVED: WorkflowState = WorkflowState::Lifecycle(LifecycleStatus::Archived);
    pub const READY_FOR_ENGINEERING: WorkflowState =
        WorkflowState::Resolution(ResolutionStatus::ReadyForEngineering);
    pub const READY_FOR_QA: WorkflowState = WorkflowState::Resolution(ResolutionStatus::ReadyForQa);
    pub const READY_FOR_DEPLOYMENT: WorkflowState =
        WorkflowState::Resolution(ResolutionStatus::ReadyForDeployment);
    pub const DONE: WorkflowState = WorkflowState::Resolution(ResolutionStatus::Done);
    pub const WONT_DO: WorkflowState = WorkflowState::Resolution(ResolutionStatus::WontDo);

    /// Every state in both spaces
    pub fn all() -> Vec<WorkflowState> {
        LifecycleStatus::all()
            .iter()
            .copied()
            .map(WorkflowState::Lifecycle)
            .chain(
                ResolutionStatus::all()
                    .iter()
                    .copied()
                    .map(WorkflowState::Resolution),
            )
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Lifecycle(s) => s.as_str(),
            WorkflowState::Resolution(s) => s.as_str(),
        }
    }

    /// Terminal states have no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, &WorkflowState::DONE | &WorkflowState::WONT_DO)
    }

    /// Whether work on the item is over (finished, abandoned or shelved)
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            &WorkflowState::DONE
                | &WorkflowState::WONT_DO
                | &WorkflowState::COMPLETED
                | &WorkflowState::ARCHIVED
        )
    }

    /// Whether the item counts as delivered for completion metrics
    pub fn is_delivered(&self) -> bool {
        matches!(self, &WorkflowState::DONE | &WorkflowState::COMPLETED)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(lifecycle) = s.parse::<LifecycleStatus>() {
            return Ok(WorkflowState::Lifecycle(lifecycle));
        }
        s.parse::<ResolutionStatus>()
            .map(WorkflowState::Resolution)
            .map_err(|_| format!("Unknown status: {}", s))
    }
}

impl Serialize for WorkflowState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WorkflowState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace(['-', ' '], "_")
}

/// Priority values
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn all() -> &'static [Priority] {
        &[
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Critical,
        ]
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Metadata recorded on an item by its most recent status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub transitioned_by: String,
    pub transitioned_at: DateTime<Utc>,
    pub previous_state: WorkflowState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub automation_eligible: bool,
}

/// Child id lists derived from the children's parent references
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRefs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prs: Vec<String>,
}

impl ChildRefs {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.tasks.is_empty() && self.prs.is_empty()
    }

    /// Child list for children of the given type, if this kind of list exists
    pub fn list_mut(&mut self, child_type: ItemType) -> Option<&mut Vec<String>> {
        match child_type {
            ItemType::Issue => Some(&mut self.issues),
            ItemType::Task => Some(&mut self.tasks),
            ItemType::Pr => Some(&mut self.prs),
            ItemType::Epic | ItemType::Project => None,
        }
    }

    /// Insert keeping the list sorted and free of duplicates
    pub fn insert(&mut self, child_type: ItemType, id: &str) {
        if let Some(list) = self.list_mut(child_type) {
            if let Err(pos) = list.binary_search_by(|existing| existing.as_str().cmp(id)) {
                list.insert(pos, id.to_string());
            }
        }
    }

    pub fn remove(&mut self, child_type: ItemType, id: &str) {
        if let Some(list) = self.list_mut(child_type) {
            list.retain(|c| c != id);
        }
    }

    pub fn len(&self) -> usize {
        self.issues.len() + self.tasks.len() + self.prs.len()
    }
}

/// A parent reference held by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRef<'a> {
    /// Type the referenced item must have
    pub parent_type: ItemType,
    /// Name of the field carrying the reference
    pub field: &'static str,
    pub id: &'a str,
}

/// A work item as held in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: String,

    #[serde(rename = "type")]
    pub item_type: ItemType,

    pub title: String,

    pub status: LifecycleStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionStatus>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub assignee: Option<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Location of the backing document, relative to the project root
    pub file_path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_metadata: Option<TransitionRecord>,

    /// Back-references computed by the index engine
    #[serde(default, skip_serializing_if = "ChildRefs::is_empty")]
    pub children: ChildRefs,

    /// SHA-256 of the backing document at the time it was indexed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_hash: String,
}

impl ItemRecord {
    /// Create a minimal record in the planning state
    pub fn new(item_type: ItemType, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type,
            title: title.into(),
            status: LifecycleStatus::default(),
            resolution: None,
            priority: Priority::default(),
            assignee: None,
            tags: BTreeSet::new(),
            created_at: None,
            updated_at: None,
            file_path: PathBuf::new(),
            epic_id: None,
            issue_id: None,
            task_id: None,
            dependencies: Vec::new(),
            blocked_by: Vec::new(),
            completion_percentage: None,
            state_metadata: None,
            children: ChildRefs::default(),
            file_hash: String::new(),
        }
    }

    /// Resolution state if one is set, otherwise the lifecycle state
    pub fn effective_state(&self) -> WorkflowState {
        match self.resolution {
            Some(resolution) => WorkflowState::Resolution(resolution),
            None => WorkflowState::Lifecycle(self.status),
        }
    }

    /// Parent references that are meaningful for this record's type
    pub fn parent_refs(&self) -> Vec<ParentRef<'_>> {
        let candidates = match self.item_type {
            ItemType::Issue => vec![(ItemType::Epic, "epic_id", &self.epic_id)],
            ItemType::Task => vec![
                (ItemType::Epic, "epic_id", &self.epic_id),
                (ItemType::Issue, "issue_id", &self.issue_id),
            ],
            ItemType::Pr => vec![
                (ItemType::Epic, "epic_id", &self.epic_id),
                (ItemType::Issue, "issue_id", &self.issue_id),
                (ItemType::Task, "task_id", &self.task_id),
            ],
            ItemType::Epic | ItemType::Project => Vec::new(),
        };

        candidates
            .into_iter()
            .filter_map(|(parent_type, field, id)| {
                id.as_deref()
                    .filter(|s| !s.is_empty())
                    .map(|id| ParentRef {
                        parent_type,
                        field,
                        id,
                    })
            })
            .collect()
    }

    /// Ids this item waits on, from both `dependencies` and `blocked_by`
    pub fn blocking_ids(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .chain(self.blocked_by.iter())
            .map(String::as_str)
    }

    /// Whether this item lists `id` in `dependencies` or `blocked_by`
    pub fn depends_on(&self, id: &str) -> bool {
        self.blocking_ids().any(|d| d == id)
    }

    /// The record without index-derived fields, for comparing document content
    pub fn without_derived(&self) -> Self {
        Self {
            children: ChildRefs::default(),
            ..self.clone()
        }
    }
}
