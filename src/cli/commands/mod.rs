//! Command implementations

pub mod completions;
pub mod index;
pub mod init;
pub mod list;
pub mod overview;
pub mod related;
pub mod show;
pub mod transition;
pub mod tree;
