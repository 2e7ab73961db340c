//! Project discovery and directory layout

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::identity::ItemType;

/// Name of the project metadata directory
pub const PROJECT_DIR: &str = ".workline";

/// Index file location relative to the project root
pub const INDEX_FILE: &str = ".workline/index.json";

/// Represents a workline project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .workline/ and the item directories)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current =
            std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Open an existing directory as a project root without requiring `.workline/`
    ///
    /// The directory itself must exist and be readable; nothing else can proceed
    /// without it.
    pub fn open(root: &Path) -> Result<Self, ProjectError> {
        let root = root
            .canonicalize()
            .map_err(|_| ProjectError::RootUnavailable(root.to_path_buf()))?;

        if !root.is_dir() || std::fs::read_dir(&root).is_err() {
            return Err(ProjectError::RootUnavailable(root));
        }

        Ok(Self { root })
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }

        Self::init_force(&root)
    }

    /// Initialize even if .workline/ exists (rewrites the default config)
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        std::fs::create_dir_all(path).map_err(|e| ProjectError::IoError(e.to_string()))?;
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let meta_dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(&meta_dir).map_err(|e| ProjectError::IoError(e.to_string()))?;

        std::fs::write(meta_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        // The index is derived data; keep it out of version control
        std::fs::write(meta_dir.join(".gitignore"), "index.json\n")
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        for item_type in ItemType::indexed() {
            std::fs::create_dir_all(root.join(item_type.directory()))
                .map_err(|e| ProjectError::IoError(e.to_string()))?;
        }

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Workline project configuration

# Default actor recorded on status transitions (falls back to git user.name)
# author: ""

# Seconds an in-memory index stays fresh before it is re-read from disk
# index_ttl_secs: 300

# Seconds the relationship graph is reused before it is recomputed
# relation_ttl_secs: 60

# workflow:
#   # Warn about open blockers, dependents and children on transitions
#   check_dependencies: true
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .workline metadata directory
    pub fn meta_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Path of the persisted index file
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Path of the project configuration file
    pub fn config_path(&self) -> PathBuf {
        self.meta_dir().join("config.yaml")
    }

    /// Directory holding documents of the given type
    pub fn item_directory(&self, item_type: ItemType) -> PathBuf {
        self.root.join(item_type.directory())
    }

    /// Canonical path for a document with the given id
    pub fn item_path(&self, item_type: ItemType, id: &str) -> PathBuf {
        self.item_directory(item_type).join(format!("{}.md", id))
    }

    /// Path relative to the project root (unchanged if outside it)
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a workline project (searched from {searched_from:?}). Run 'wl init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("workline project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("project root {0:?} does not exist or cannot be read")]
    RootUnavailable(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}
