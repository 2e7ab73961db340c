//! Workline: work items as plain-text Markdown
//!
//! Epics, issues, tasks and pull requests live as Markdown documents with
//! YAML front matter. This crate keeps a derived JSON index of them, resolves
//! the relationships between them and enforces a status workflow.

pub mod cli;
pub mod core;
pub mod yaml;
