use std::path::{Path, PathBuf};

use tracing::debug;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

/// Extension of Luma source files.
pub const SOURCE_EXTENSION: &str = "lu";

#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterConfig {
    /// Root of `@std` modules. Discovered when unset.
    pub stdlib_root: Option<PathBuf>,
    /// Root of the project; `@app` modules live in its `src/` directory.
    pub project_root: Option<PathBuf>,
    pub executable_path: Option<PathBuf>,
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            stdlib_root: None,
            project_root: None,
            executable_path: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl InterpreterConfig {
    /// Configuration for running `entry`: the project root is the file's
    /// directory, or that directory's parent when it is named `src`.
    pub fn for_entry_file(entry: &Path) -> Self {
        InterpreterConfig::default().with_project_root(project_root_of(entry))
    }

    pub fn with_stdlib_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.stdlib_root = Some(root.into());
        self
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn with_executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// The directory `@app.*` ids resolve under.
    pub fn app_root(&self) -> PathBuf {
        self.project_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
            .join("src")
    }

    /// The directory `@std.*` ids resolve under: the configured root, else an
    /// installed `Module/` folder next to the executable, else `<project>/std`,
    /// else `<cwd>/std`.
    pub fn std_root(&self) -> Option<PathBuf> {
        if let Some(root) = &self.stdlib_root {
            return Some(root.clone());
        }

        let installed = self
            .executable_path
            .as_deref()
            .and_then(Path::parent)
            .map(|dir| dir.join("Module"));
        let project = self.project_root.as_ref().map(|root| root.join("std"));
        let cwd = std::env::current_dir().ok().map(|dir| dir.join("std"));

        let found = [installed, project, cwd]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_dir());
        debug!(root = ?found, "resolved stdlib root");
        found
    }
}

fn project_root_of(entry: &Path) -> PathBuf {
    let entry = std::path::absolute(entry).unwrap_or_else(|_| entry.to_path_buf());
    let dir = entry.parent().map(Path::to_path_buf).unwrap_or_default();
    if dir.file_name().is_some_and(|name| name == "src") {
        dir.parent().map(Path::to_path_buf).unwrap_or(dir)
    } else {
        dir
    }
}
