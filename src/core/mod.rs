//! Core module - item model, index engine, relationships and workflow

pub mod config;
pub mod identity;
pub mod index;
pub mod item;
pub mod project;
pub mod relations;
pub mod store;
pub mod workflow;

pub use config::Config;
pub use identity::{IdError, ItemType};
pub use index::{
    HealthReport, Index, IndexEngine, IndexError, ProjectOverview, RepairReport, SyncStats,
    UpdateOutcome,
};
pub use item::{ItemRecord, LifecycleStatus, Priority, ResolutionStatus, WorkflowState};
pub use project::{Project, ProjectError};
pub use relations::{Hierarchy, RelatedItems, RelationshipResolver};
pub use store::{DocumentStore, FieldUpdates, MarkdownStore, StoreError};
pub use workflow::{
    TransitionContext, TransitionError, TransitionOutcome, TransitionRequest, WorkflowConfig,
    WorkflowEngine,
};
