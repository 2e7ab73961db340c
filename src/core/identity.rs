//! Item identity: the type tag carried by every work item and its id prefix

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Work item types, from the top of the hierarchy down
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Project (root of the hierarchy, not indexed)
    Project,
    /// Epic
    Epic,
    /// Issue (belongs to an epic)
    Issue,
    /// Task (belongs to an issue)
    Task,
    /// Pull request
    Pr,
}

impl ItemType {
    /// Get the string representation of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Project => "project",
            ItemType::Epic => "epic",
            ItemType::Issue => "issue",
            ItemType::Task => "task",
            ItemType::Pr => "pr",
        }
    }

    /// Id prefix including the trailing dash (e.g. "EP-")
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ItemType::Project => "PRJ-",
            ItemType::Epic => "EP-",
            ItemType::Issue => "ISS-",
            ItemType::Task => "TSK-",
            ItemType::Pr => "PR-",
        }
    }

    /// Directory (relative to the project root) holding documents of this type
    pub fn directory(&self) -> &'static str {
        match self {
            ItemType::Project => "projects",
            ItemType::Epic => "epics",
            ItemType::Issue => "issues",
            ItemType::Task => "tasks",
            ItemType::Pr => "prs",
        }
    }

    /// Plural label used in reports
    pub fn plural(&self) -> &'static str {
        match self {
            ItemType::Project => "projects",
            ItemType::Epic => "epics",
            ItemType::Issue => "issues",
            ItemType::Task => "tasks",
            ItemType::Pr => "pull requests",
        }
    }

    /// The types that have a mapping in the index, in hierarchy order
    pub fn indexed() -> &'static [ItemType] {
        &[ItemType::Epic, ItemType::Issue, ItemType::Task, ItemType::Pr]
    }

    /// Whether this type has a mapping in the index
    pub fn is_indexed(&self) -> bool {
        !matches!(self, ItemType::Project)
    }

    /// Check that `id` carries this type's prefix
    pub fn check_id(&self, id: &str) -> Result<(), IdError> {
        let prefix = self.id_prefix();
        match id.strip_prefix(prefix) {
            Some(rest) if !rest.is_empty() => Ok(()),
            Some(_) => Err(IdError::Empty(id.to_string())),
            None => Err(IdError::PrefixMismatch {
                id: id.to_string(),
                item_type: *self,
                expected: prefix,
            }),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "project" | "projects" => Ok(ItemType::Project),
            "epic" | "epics" => Ok(ItemType::Epic),
            "issue" | "issues" => Ok(ItemType::Issue),
            "task" | "tasks" => Ok(ItemType::Task),
            "pr" | "prs" | "pull_request" | "pull-request" => Ok(ItemType::Pr),
            _ => Err(IdError::UnknownType(s.to_string())),
        }
    }
}

/// Errors raised when checking ids and type names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("unknown item type: {0}")]
    UnknownType(String),

    #[error("id '{id}' does not match type {item_type} (expected prefix '{expected}')")]
    PrefixMismatch {
        id: String,
        item_type: ItemType,
        expected: &'static str,
    },

    #[error("id '{0}' has no suffix after its prefix")]
    Empty(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_id() {
        assert!(ItemType::Epic.check_id("EP-0001").is_ok());
        assert!(ItemType::Issue.check_id("ISS-0001").is_ok());
        assert!(ItemType::Task.check_id("TSK-0002").is_ok());
        assert!(ItemType::Pr.check_id("PR-17").is_ok());

        assert!(matches!(
            ItemType::Epic.check_id("ISS-0001"),
            Err(IdError::PrefixMismatch { .. })
        ));
        assert!(matches!(ItemType::Task.check_id("TSK-"), Err(IdError::Empty(_))));
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!("epic".parse::<ItemType>().unwrap(), ItemType::Epic);
        assert_eq!("Issues".parse::<ItemType>().unwrap(), ItemType::Issue);
        assert_eq!("pull-request".parse::<ItemType>().unwrap(), ItemType::Pr);
        assert!("story".parse::<ItemType>().is_err());
    }

    #[test]
    fn test_indexed_types_exclude_project() {
        assert_eq!(ItemType::indexed().len(), 4);
        assert!(!ItemType::indexed().contains(&ItemType::Project));
        assert!(!ItemType::Project.is_indexed());
    }
}
