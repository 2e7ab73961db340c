//! Workflow engine for status transitions
//!
//! Validates moves between effective states against a fixed adjacency table,
//! records who moved an item and why, and produces the front matter update a
//! caller writes back through the document store.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_yml::{Mapping, Value};
use thiserror::Error;

use crate::core::item::{ItemRecord, LifecycleStatus, ResolutionStatus, TransitionRecord, WorkflowState};
use crate::core::store::FieldUpdates;

/// Workflow configuration from project config
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Warn about open blockers, dependents and children (default: true)
    pub check_dependencies: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            check_dependencies: true,
        }
    }
}

/// Errors that reject a transition outright
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("no such transition: {from} → {to} (allowed: {})", format_states(allowed))]
    NotAllowed {
        from: WorkflowState,
        to: WorkflowState,
        allowed: Vec<WorkflowState>,
    },

    #[error("item is already {0}")]
    AlreadyInState(WorkflowState),

    #[error("missing reason: moving to {0} requires a reason")]
    ReasonRequired(WorkflowState),
}

fn format_states(states: &[WorkflowState]) -> String {
    if states.is_empty() {
        return "none, state is terminal".to_string();
    }
    states
        .iter()
        .map(WorkflowState::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Legal next states from `from`
pub fn allowed_transitions(from: WorkflowState) -> &'static [WorkflowState] {
    use WorkflowState as S;

    match from {
        S::Lifecycle(LifecycleStatus::Planning) => &[S::ACTIVE, S::ARCHIVED, S::WONT_DO],
        S::Lifecycle(LifecycleStatus::Active) => &[
            S::READY_FOR_ENGINEERING,
            S::READY_FOR_QA,
            S::COMPLETED,
            S::ARCHIVED,
            S::WONT_DO,
        ],
        S::Lifecycle(LifecycleStatus::Completed) => &[
            S::ACTIVE,
            S::READY_FOR_DEPLOYMENT,
            S::ARCHIVED,
            S::WONT_DO,
        ],
        S::Lifecycle(LifecycleStatus::Archived) => &[S::PLANNING, S::WONT_DO],
        S::Resolution(ResolutionStatus::ReadyForEngineering) => {
            &[S::ACTIVE, S::READY_FOR_QA, S::WONT_DO]
        }
        S::Resolution(ResolutionStatus::ReadyForQa) => &[
            S::READY_FOR_ENGINEERING,
            S::READY_FOR_DEPLOYMENT,
            S::DONE,
            S::WONT_DO,
        ],
        S::Resolution(ResolutionStatus::ReadyForDeployment) => {
            &[S::READY_FOR_QA, S::DONE, S::WONT_DO]
        }
        S::Resolution(ResolutionStatus::Done) | S::Resolution(ResolutionStatus::WontDo) => &[],
    }
}

/// Check if a status transition is valid
pub fn is_valid_transition(from: WorkflowState, to: WorkflowState) -> bool {
    allowed_transitions(from).contains(&to)
}

/// An item related to the one being moved, with its current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedState {
    pub id: String,
    pub state: WorkflowState,
}

impl RelatedState {
    pub fn of(item: &ItemRecord) -> Self {
        Self {
            id: item.id.clone(),
            state: item.effective_state(),
        }
    }
}

/// Neighbours of an item used for soft precondition checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionContext {
    /// Items this one waits on
    pub blockers: Vec<RelatedState>,
    /// Items waiting on this one
    pub dependents: Vec<RelatedState>,
    /// Items below this one in the hierarchy
    pub children: Vec<RelatedState>,
}

/// Parameters of a requested transition
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub target: WorkflowState,
    pub actor: String,
    pub reason: Option<String>,
    pub reviewer: Option<String>,
    pub context: Option<TransitionContext>,
    pub at: Option<DateTime<Utc>>,
}

impl TransitionRequest {
    pub fn new(target: WorkflowState, actor: impl Into<String>) -> Self {
        Self {
            target,
            actor: actor.into(),
            reason: None,
            reviewer: None,
            context: None,
            at: None,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewer = Some(reviewer.into());
        self
    }

    pub fn context(mut self, context: TransitionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Fix the transition timestamp instead of using the current time
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }

    fn trimmed_reason(&self) -> Option<String> {
        non_blank(self.reason.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Result of a transition attempt
///
/// `item` is only present on success. Warnings never affect `success`; a
/// caller may refuse to persist when warnings are present.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub success: bool,
    pub previous_state: WorkflowState,
    pub item: Option<ItemRecord>,
    pub errors: Vec<TransitionError>,
    pub warnings: Vec<String>,
}

impl TransitionOutcome {
    /// Metadata changes to persist for a successful transition
    pub fn front_matter_updates(&self) -> Option<FieldUpdates> {
        let item = self.item.as_ref()?;

        let mut updates = FieldUpdates::new().set("status", item.status.as_str());
        updates = match item.resolution {
            Some(resolution) => updates.set("resolution", resolution.as_str()),
            None => updates.remove("resolution"),
        };
        if let Some(record) = &item.state_metadata {
            updates = updates.set("state_metadata", transition_value(record));
        }
        if let Some(updated_at) = item.updated_at {
            updates = updates.set("updated_at", timestamp(updated_at));
        }

        Some(updates)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn transition_value(record: &TransitionRecord) -> Value {
    let mut map = Mapping::new();
    map.insert("transitioned_by".into(), record.transitioned_by.as_str().into());
    map.insert("transitioned_at".into(), timestamp(record.transitioned_at).into());
    map.insert("previous_state".into(), record.previous_state.as_str().into());
    if let Some(reason) = &record.reason {
        map.insert("reason".into(), reason.as_str().into());
    }
    if let Some(reviewer) = &record.reviewer {
        map.insert("reviewer".into(), reviewer.as_str().into());
    }
    map.insert(
        "automation_eligible".into(),
        Value::Bool(record.automation_eligible),
    );
    Value::Mapping(map)
}

/// Workflow engine for managing status transitions
#[derive(Debug, Clone, Default)]
pub struct WorkflowEngine {
    config: WorkflowConfig,
}

impl WorkflowEngine {
    /// Create a new workflow engine
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Get the workflow configuration
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// The state used for workflow decisions
    pub fn get_effective_state(&self, item: &ItemRecord) -> WorkflowState {
        item.effective_state()
    }

    /// Legal next states for the item
    pub fn get_available_transitions(&self, item: &ItemRecord) -> Vec<WorkflowState> {
        allowed_transitions(item.effective_state()).to_vec()
    }

    /// Whether a non-human actor may perform the move
    ///
    /// Moves that need a human-authored reason are never eligible.
    pub fn can_automate(&self, item: &ItemRecord, target: WorkflowState) -> bool {
        target != WorkflowState::WONT_DO && is_valid_transition(item.effective_state(), target)
    }

    /// Validate and apply a transition to a copy of `item`
    pub fn transition_state(
        &self,
        item: &ItemRecord,
        request: &TransitionRequest,
    ) -> TransitionOutcome {
        let from = item.effective_state();
        let target = request.target;
        let reason = request.trimmed_reason();

        let mut errors = Vec::new();
        if from == target {
            errors.push(TransitionError::AlreadyInState(from));
        } else if !is_valid_transition(from, target) {
            errors.push(TransitionError::NotAllowed {
                from,
                to: target,
                allowed: allowed_transitions(from).to_vec(),
            });
        }
        if target == WorkflowState::WONT_DO && reason.is_none() {
            errors.push(TransitionError::ReasonRequired(target));
        }

        let warnings = match (&request.context, self.config.check_dependencies) {
            (Some(context), true) => self.precondition_warnings(target, context),
            _ => Vec::new(),
        };

        if !errors.is_empty() {
            return TransitionOutcome {
                success: false,
                previous_state: from,
                item: None,
                errors,
                warnings,
            };
        }

        let now = request.at.unwrap_or_else(Utc::now);
        let mut next = item.clone();
        match target {
            WorkflowState::Lifecycle(status) => {
                next.status = status;
                next.resolution = None;
            }
            WorkflowState::Resolution(ResolutionStatus::Done) => {
                next.status = LifecycleStatus::Completed;
                next.resolution = Some(ResolutionStatus::Done);
            }
            WorkflowState::Resolution(resolution) => {
                next.resolution = Some(resolution);
            }
        }
        next.state_metadata = Some(TransitionRecord {
            transitioned_by: request.actor.trim().to_string(),
            transitioned_at: now,
            previous_state: from,
            reason,
            reviewer: non_blank(request.reviewer.as_deref()),
            automation_eligible: self.can_automate(item, target),
        });
        next.updated_at = Some(now);

        TransitionOutcome {
            success: true,
            previous_state: from,
            item: Some(next),
            errors,
            warnings,
        }
    }

    fn precondition_warnings(
        &self,
        target: WorkflowState,
        context: &TransitionContext,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        let open = |related: &&RelatedState| !related.state.is_closed();

        let finishing = target.is_delivered() || target == WorkflowState::READY_FOR_DEPLOYMENT;
        let abandoning = target == WorkflowState::WONT_DO || target == WorkflowState::ARCHIVED;

        if finishing {
            for blocker in context.blockers.iter().filter(open) {
                warnings.push(format!(
                    "blocked by {} which is still {}",
                    blocker.id, blocker.state
                ));
            }
            for child in context.children.iter().filter(open) {
                warnings.push(format!("child {} is still {}", child.id, child.state));
            }
        }

        if abandoning {
            for dependent in context.dependents.iter().filter(open) {
                warnings.push(format!(
                    "{} depends on this item and is still {}",
                    dependent.id, dependent.state
                ));
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::ItemType;

    fn item_in(state: WorkflowState) -> ItemRecord {
        let mut item = ItemRecord::new(ItemType::Issue, "ISS-0001", "Login page");
        match state {
            WorkflowState::Lifecycle(status) => item.status = status,
            WorkflowState::Resolution(resolution) => {
                item.status = resolution.implied_lifecycle();
                item.resolution = Some(resolution);
            }
        }
        item
    }

    #[test]
    fn test_terminal_states_have_no_transitions() {
        assert!(allowed_transitions(WorkflowState::DONE).is_empty());
        assert!(allowed_transitions(WorkflowState::WONT_DO).is_empty());
    }

    #[test]
    fn test_wont_do_reachable_from_every_open_state() {
        for state in WorkflowState::all() {
            if !state.is_terminal() {
                assert!(is_valid_transition(state, WorkflowState::WONT_DO), "{}", state);
            }
        }
    }

    #[test]
    fn test_no_self_transitions_in_table() {
        for state in WorkflowState::all() {
            assert!(!is_valid_transition(state, state));
        }
    }

    #[test]
    fn test_active_transitions() {
        let engine = WorkflowEngine::default();
        let available = engine.get_available_transitions(&item_in(WorkflowState::ACTIVE));
        assert!(available.contains(&WorkflowState::READY_FOR_QA));
        assert!(available.contains(&WorkflowState::ARCHIVED));
        assert!(!available.contains(&WorkflowState::DONE));
    }

    #[test]
    fn test_wont_do_requires_reason() {
        let engine = WorkflowEngine::default();
        let item = item_in(WorkflowState::ACTIVE);

        let outcome = engine.transition_state(
            &item,
            &TransitionRequest::new(WorkflowState::WONT_DO, "alice"),
        );
        assert!(!outcome.success);
        assert!(outcome.item.is_none());
        assert!(outcome.errors[0].to_string().contains("reason"));

        let blank = engine.transition_state(
            &item,
            &TransitionRequest::new(WorkflowState::WONT_DO, "alice").reason("   "),
        );
        assert!(!blank.success);

        let outcome = engine.transition_state(
            &item,
            &TransitionRequest::new(WorkflowState::WONT_DO, "alice").reason("duplicate"),
        );
        assert!(outcome.success);
        let next = outcome.item.unwrap();
        let meta = next.state_metadata.unwrap();
        assert_eq!(meta.transitioned_by, "alice");
        assert_eq!(meta.reason.as_deref(), Some("duplicate"));
        assert_eq!(meta.previous_state, WorkflowState::ACTIVE);
        assert!(!meta.automation_eligible);
        assert_eq!(next.resolution, Some(ResolutionStatus::WontDo));
    }

    #[test]
    fn test_invalid_edge_is_reported() {
        let engine = WorkflowEngine::default();
        let outcome = engine.transition_state(
            &item_in(WorkflowState::PLANNING),
            &TransitionRequest::new(WorkflowState::DONE, "bot"),
        );
        assert!(!outcome.success);
        assert!(matches!(
            outcome.errors[0],
            TransitionError::NotAllowed { .. }
        ));
        assert!(outcome.errors[0].to_string().contains("no such transition"));
    }

    #[test]
    fn test_self_transition_is_rejected() {
        let engine = WorkflowEngine::default();
        let outcome = engine.transition_state(
            &item_in(WorkflowState::ACTIVE),
            &TransitionRequest::new(WorkflowState::ACTIVE, "bot"),
        );
        assert_eq!(
            outcome.errors,
            vec![TransitionError::AlreadyInState(WorkflowState::ACTIVE)]
        );
    }

    #[test]
    fn test_done_sets_completed_lifecycle() {
        let engine = WorkflowEngine::default();
        let outcome = engine.transition_state(
            &item_in(WorkflowState::READY_FOR_QA),
            &TransitionRequest::new(WorkflowState::DONE, "ci-bot"),
        );
        let next = outcome.item.unwrap();
        assert_eq!(next.status, LifecycleStatus::Completed);
        assert_eq!(next.effective_state(), WorkflowState::DONE);
        assert!(next.state_metadata.unwrap().automation_eligible);
    }

    #[test]
    fn test_lifecycle_target_clears_resolution() {
        let engine = WorkflowEngine::default();
        let outcome = engine.transition_state(
            &item_in(WorkflowState::READY_FOR_ENGINEERING),
            &TransitionRequest::new(WorkflowState::ACTIVE, "bob"),
        );
        let next = outcome.item.unwrap();
        assert_eq!(next.resolution, None);
        assert_eq!(next.effective_state(), WorkflowState::ACTIVE);
    }

    #[test]
    fn test_can_automate() {
        let engine = WorkflowEngine::default();
        let item = item_in(WorkflowState::ACTIVE);
        assert!(engine.can_automate(&item, WorkflowState::READY_FOR_QA));
        assert!(!engine.can_automate(&item, WorkflowState::WONT_DO));
        assert!(!engine.can_automate(&item, WorkflowState::DONE));
    }

    #[test]
    fn test_warnings_do_not_block() {
        let engine = WorkflowEngine::default();
        let context = TransitionContext {
            blockers: vec![RelatedState {
                id: "TSK-0009".into(),
                state: WorkflowState::ACTIVE,
            }],
            dependents: vec![],
            children: vec![RelatedState {
                id: "TSK-0010".into(),
                state: WorkflowState::DONE,
            }],
        };

        let outcome = engine.transition_state(
            &item_in(WorkflowState::READY_FOR_QA),
            &TransitionRequest::new(WorkflowState::DONE, "bob").context(context.clone()),
        );
        assert!(outcome.success);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("TSK-0009"));

        let quiet = WorkflowEngine::new(WorkflowConfig {
            check_dependencies: false,
        });
        let outcome = quiet.transition_state(
            &item_in(WorkflowState::READY_FOR_QA),
            &TransitionRequest::new(WorkflowState::DONE, "bob").context(context),
        );
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_dependents_warn_when_abandoning() {
        let engine = WorkflowEngine::default();
        let context = TransitionContext {
            dependents: vec![RelatedState {
                id: "ISS-0002".into(),
                state: WorkflowState::PLANNING,
            }],
            ..Default::default()
        };
        let outcome = engine.transition_state(
            &item_in(WorkflowState::ACTIVE),
            &TransitionRequest::new(WorkflowState::ARCHIVED, "bob").context(context),
        );
        assert!(outcome.success);
        assert!(outcome.warnings[0].contains("ISS-0002"));
    }

    #[test]
    fn test_front_matter_updates() {
        let engine = WorkflowEngine::default();
        let at = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let outcome = engine.transition_state(
            &item_in(WorkflowState::READY_FOR_ENGINEERING),
            &TransitionRequest::new(WorkflowState::ACTIVE, "bob").at(at),
        );

        let updates = outcome.front_matter_updates().unwrap();
        let fields: Vec<_> = updates.iter().collect();
        assert_eq!(fields[0], ("status", Some(&Value::from("active"))));
        assert_eq!(fields[1], ("resolution", None));
        assert_eq!(fields[2].0, "state_metadata");
        assert_eq!(fields[3], ("updated_at", Some(&Value::from("2024-03-01T12:00:00Z"))));
    }
}
