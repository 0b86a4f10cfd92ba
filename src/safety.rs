use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keeps rewrites inside one workspace and out of toolchain, build and VCS
/// directories.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
    forbidden: Vec<Forbidden>,
}

#[derive(Debug, Clone)]
struct Forbidden {
    path: PathBuf,
    label: &'static str,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("{path} is outside workspace {workspace}")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("{path} is inside {label} directory {forbidden}")]
    ForbiddenPath {
        path: PathBuf,
        forbidden: PathBuf,
        label: &'static str,
    },

    #[error("cannot resolve {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn canonical(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize().map_err(|source| SafetyError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

impl WorkspaceGuard {
    /// Guard rooted at `root`, resolved through symlinks.
    ///
    /// Forbidden: the cargo registry and git checkouts, rustup toolchains,
    /// and the workspace's own `target/` and `.git/`. Directories that do
    /// not exist are skipped.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = canonical(root.as_ref())?;

        let mut candidates: Vec<(PathBuf, &'static str)> = Vec::new();
        if let Some(home) = home::home_dir() {
            candidates.push((home.join(".cargo/registry"), "cargo registry"));
            candidates.push((home.join(".cargo/git"), "cargo git"));
            candidates.push((home.join(".rustup"), "rustup"));
        }
        candidates.push((root.join("target"), "build output"));
        candidates.push((root.join(".git"), "git metadata"));

        let forbidden = candidates
            .into_iter()
            .filter_map(|(path, label)| {
                path.canonicalize()
                    .ok()
                    .map(|path| Forbidden { path, label })
            })
            .collect();

        Ok(Self { root, forbidden })
    }

    /// Resolve `path` (relative paths against the root) and check it.
    ///
    /// Returns the canonical path when the file may be rewritten.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let resolved = canonical(&absolute)?;
        self.check(&resolved)?;
        Ok(resolved)
    }

    /// Check an already-validated path again right before writing, in case
    /// a symlink was swapped in between.
    pub fn revalidate(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        let resolved = canonical(path)?;
        self.check(&resolved)?;
        Ok(resolved)
    }

    fn check(&self, resolved: &Path) -> Result<(), SafetyError> {
        if !resolved.starts_with(&self.root) {
            return Err(SafetyError::OutsideWorkspace {
                path: resolved.to_path_buf(),
                workspace: self.root.clone(),
            });
        }
        if let Some(hit) = self.forbidden.iter().find(|f| resolved.starts_with(&f.path)) {
            return Err(SafetyError::ForbiddenPath {
                path: resolved.to_path_buf(),
                forbidden: hit.path.clone(),
                label: hit.label,
            });
        }
        Ok(())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.root
    }
}
