//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use console::{style, StyledObject};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::item::{ItemRecord, WorkflowState};
use crate::core::project::Project;
use crate::core::relations::RelationshipResolver;

/// Locate the project from `--project` or by searching upwards
pub fn open_project(global: &GlobalOpts) -> Result<Project> {
    let project = match &global.project {
        Some(path) => Project::open(path),
        None => Project::discover(),
    };
    project.map_err(|e| miette::miette!("{}", e))
}

/// Open the project together with its merged configuration and a resolver
pub fn open_resolver(global: &GlobalOpts) -> Result<(Config, RelationshipResolver)> {
    let project = open_project(global)?;
    let config = Config::load_with(Some(&project));
    let resolver = RelationshipResolver::open(project, &config);
    Ok((config, resolver))
}

/// Truncate a string to max_len, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Color a workflow state by how far along it is
pub fn styled_state(state: WorkflowState) -> StyledObject<String> {
    let text = state.to_string();
    match state {
        WorkflowState::DONE | WorkflowState::COMPLETED => style(text).green(),
        WorkflowState::WONT_DO | WorkflowState::ARCHIVED => style(text).dim(),
        WorkflowState::PLANNING => style(text).white(),
        _ => style(text).yellow(),
    }
}

/// One-line summary used in trees and relation lists
pub fn item_line(item: &ItemRecord) -> String {
    format!(
        "{} {} [{}]",
        style(&item.id).cyan(),
        truncate_str(&item.title, 50),
        styled_state(item.effective_state())
    )
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

/// Print a value as YAML
pub fn print_yaml<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let yaml = serde_yml::to_string(value).into_diagnostic()?;
    print!("{}", yaml);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
    }

    #[test]
    fn test_truncate_str_multibyte() {
        assert_eq!(truncate_str("über-long title", 7), "über...");
    }
}
