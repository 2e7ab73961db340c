//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::workflow::WorkflowConfig;
use crate::core::Project;

/// Default lifetime of the in-memory index before it is re-read from disk
pub const DEFAULT_INDEX_TTL_SECS: u64 = 300;

/// Default lifetime of the relationship graph
pub const DEFAULT_RELATION_TTL_SECS: u64 = 60;

/// Workline configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default actor recorded on transitions
    pub author: Option<String>,

    /// In-memory index lifetime in seconds
    pub index_ttl_secs: Option<u64>,

    /// Relationship graph lifetime in seconds
    pub relation_ttl_secs: Option<u64>,

    /// Status workflow settings
    pub workflow: Option<WorkflowConfig>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load_with(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // Global user config (~/.config/workline/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // Project config (.workline/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read_file(&project.config_path()) {
                config.merge(project_config);
            }
        }

        // Environment variables
        if let Ok(author) = std::env::var("WORKLINE_AUTHOR") {
            config.author = Some(author);
        }
        if let Some(ttl) = env_secs("WORKLINE_INDEX_TTL") {
            config.index_ttl_secs = Some(ttl);
        }
        if let Some(ttl) = env_secs("WORKLINE_RELATION_TTL") {
            config.relation_ttl_secs = Some(ttl);
        }

        config
    }

    fn read_file(path: &std::path::Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "workline")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.index_ttl_secs.is_some() {
            self.index_ttl_secs = other.index_ttl_secs;
        }
        if other.relation_ttl_secs.is_some() {
            self.relation_ttl_secs = other.relation_ttl_secs;
        }
        if other.workflow.is_some() {
            self.workflow = other.workflow;
        }
    }

    /// How long a loaded index is trusted before re-reading the index file
    pub fn index_ttl(&self) -> Duration {
        Duration::from_secs(self.index_ttl_secs.unwrap_or(DEFAULT_INDEX_TTL_SECS))
    }

    /// How long the relationship graph is reused
    pub fn relation_ttl(&self) -> Duration {
        Duration::from_secs(self.relation_ttl_secs.unwrap_or(DEFAULT_RELATION_TTL_SECS))
    }

    /// Workflow settings with defaults applied
    pub fn workflow(&self) -> WorkflowConfig {
        self.workflow.clone().unwrap_or_default()
    }

    /// Get the author name, falling back to git config or username
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }

        if let Ok(output) = std::process::Command::new("git")
            .args(["config", "user.name"])
            .output()
        {
            if output.status.success() {
                let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

fn env_secs(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.index_ttl(), Duration::from_secs(300));
        assert_eq!(config.relation_ttl(), Duration::from_secs(60));
        assert!(config.workflow().check_dependencies);
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            author: Some("base".into()),
            index_ttl_secs: Some(10),
            ..Default::default()
        };
        base.merge(Config {
            author: Some("override".into()),
            relation_ttl_secs: Some(5),
            ..Default::default()
        });

        assert_eq!(base.author.as_deref(), Some("override"));
        assert_eq!(base.index_ttl(), Duration::from_secs(10));
        assert_eq!(base.relation_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_project_config() {
        let yaml = "author: alice\nindex_ttl_secs: 30\nworkflow:\n  check_dependencies: false\n";
        let config: Config = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.author.as_deref(), Some("alice"));
        assert_eq!(config.index_ttl(), Duration::from_secs(30));
        assert!(!config.workflow().check_dependencies);
    }
}
