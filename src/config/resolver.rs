use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CLAUDE_DIR: &str = ".claude";
const LOGS_DIR: &str = "logs";

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Could not determine the home directory; set store.global_root")]
    NoHome,

    #[error("Not inside a project (no .claude directory above {})", .0.display())]
    NotInProject(PathBuf),

    #[error("Could not read the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

/// Which store a command operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Project,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Project => "project",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps scopes to store roots
///
/// The global store is `$HOME/.claude/logs` unless overridden. A project
/// store is `{project}/.claude/logs`, where the project is the nearest
/// ancestor of the working directory holding a `.claude` directory that is
/// not the home directory itself.
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    home: Option<PathBuf>,
    cwd: PathBuf,
    global_override: Option<PathBuf>,
}

impl ScopeResolver {
    pub fn with_paths(
        home: Option<PathBuf>,
        cwd: impl Into<PathBuf>,
        global_override: Option<PathBuf>,
    ) -> Self {
        Self {
            home,
            cwd: cwd.into(),
            global_override,
        }
    }

    pub fn from_env(global_override: Option<PathBuf>) -> Result<Self, ResolverError> {
        let cwd = std::env::current_dir().map_err(ResolverError::CurrentDir)?;
        Ok(Self::with_paths(dirs::home_dir(), cwd, global_override))
    }

    pub fn global_root(&self) -> Result<PathBuf, ResolverError> {
        if let Some(root) = &self.global_override {
            return Ok(root.clone());
        }
        self.home
            .as_ref()
            .map(|home| home.join(CLAUDE_DIR).join(LOGS_DIR))
            .ok_or(ResolverError::NoHome)
    }

    pub fn project_dir(&self) -> Option<&Path> {
        self.cwd.ancestors().find(|dir| {
            Some(*dir) != self.home.as_deref() && dir.join(CLAUDE_DIR).is_dir()
        })
    }

    pub fn project_root(&self) -> Result<PathBuf, ResolverError> {
        self.project_dir()
            .map(|dir| dir.join(CLAUDE_DIR).join(LOGS_DIR))
            .ok_or_else(|| ResolverError::NotInProject(self.cwd.clone()))
    }

    pub fn resolve(&self, scope: Scope) -> Result<PathBuf, ResolverError> {
        match scope {
            Scope::Global => self.global_root(),
            Scope::Project => self.project_root(),
        }
    }

    /// Project store when preferred and available, else global
    pub fn preferred(&self, prefer_project: bool) -> Result<(Scope, PathBuf), ResolverError> {
        if prefer_project {
            if let Ok(root) = self.project_root() {
                return Ok((Scope::Project, root));
            }
        }
        Ok((Scope::Global, self.global_root()?))
    }
}
