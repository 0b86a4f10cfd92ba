use crate::config::schema::{ThreaderConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Directory under the workspace root holding threader configs.
pub const THREADS_DIR: &str = "threads";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read threader config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed threader config{}: {source}", located(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("invalid threader config{}:\n{source}", located(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },

    #[error("no --config given and {} does not exist", .dir.display())]
    NoThreadsDir { dir: PathBuf },

    #[error("no .toml threader configs found in {}", .dir.display())]
    NoConfigs { dir: PathBuf },

    #[error("cannot list threader configs in {}: {source}", .dir.display())]
    Walk {
        dir: PathBuf,
        source: walkdir::Error,
    },
}

fn located(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path.to_path_buf()),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<ThreaderConfig, ConfigError> {
    let config: ThreaderConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ThreaderConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Every `*.toml` directly under `<workspace>/threads`, sorted by path.
pub fn discover_configs(workspace: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let dir = workspace.join(THREADS_DIR);
    if !dir.is_dir() {
        return Err(ConfigError::NoThreadsDir { dir });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&dir).max_depth(1) {
        let entry = entry.map_err(|source| ConfigError::Walk {
            dir: dir.clone(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
        {
            files.push(entry.into_path());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(ConfigError::NoConfigs { dir });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ValidationIssue;

    const MINIMAL: &str = r#"
[meta]
name = "minimal"

[files]
paths = ["src/lib.rs"]

[chain.parameter]
name = "trace_id"
ty = "u64"

[[chain.context]]
name = "ctx"
ty = "&Context"

[chain.entry]
function = "handle"
"#;

    #[test]
    fn loads_minimal_config() {
        let config = load_from_str(MINIMAL).unwrap();
        assert_eq!(config.meta.name, "minimal");
        assert!(!config.meta.workspace_relative);
        assert_eq!(config.chain.parameter.name, "trace_id");
        assert!(config.chain.links.is_empty());
        assert!(config.repair.is_empty());
    }

    #[test]
    fn reports_every_issue() {
        let input = r#"
[chain.parameter]
name = "bad-name"
ty = "u64"

[chain.entry]
function = "handle"

[[chain.links]]
function = "a"
prefix = "b"

[[repair]]
id = "loop"
search = "x)"
replace = "(x)"
"#;
        let err = load_from_str(input).unwrap_err();
        let ConfigError::Validation { source, path } = err else {
            panic!("expected validation error, got {err}");
        };
        assert!(path.is_none());
        assert!(source
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::EmptyFileList)));
        assert!(source
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::InvalidIdentifier { value, .. } if value == "bad-name")));
        assert!(source
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::MissingField { field: "context", .. })));
        assert_eq!(
            source
                .issues
                .iter()
                .filter(|i| matches!(i, ValidationIssue::InvalidCombo { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn toml_errors_carry_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[chain\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: Some(_), .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn repair_rebuilt_by_neighbours_is_invalid() {
        let input = format!("{MINIMAL}\n[[repair]]\nid = \"double-close\"\nsearch = \")),\"\nreplace = \"),\"\n");
        let err = load_from_str(&input).unwrap_err();
        let ConfigError::Validation { source, .. } = &err else {
            panic!("expected validation error, got {err}");
        };
        assert!(source.issues.iter().any(|i| matches!(
            i,
            ValidationIssue::InvalidCombo { message, .. } if message.contains("rebuild")
        )));
    }

    #[test]
    fn discovers_sorted_toml_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let threads = dir.path().join(THREADS_DIR);
        fs::create_dir_all(threads.join("nested")).unwrap();
        fs::write(threads.join("b.toml"), MINIMAL).unwrap();
        fs::write(threads.join("a.toml"), MINIMAL).unwrap();
        fs::write(threads.join("notes.md"), "").unwrap();
        fs::write(threads.join("nested/c.toml"), MINIMAL).unwrap();

        let found = discover_configs(dir.path()).unwrap();
        assert_eq!(found, [threads.join("a.toml"), threads.join("b.toml")]);
    }

    #[test]
    fn discovery_errors_name_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_configs(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NoThreadsDir { .. }));
        assert!(err.to_string().contains("threads"));

        fs::create_dir(dir.path().join(THREADS_DIR)).unwrap();
        let err = discover_configs(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NoConfigs { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_from_path("/nonexistent/threads/none.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
