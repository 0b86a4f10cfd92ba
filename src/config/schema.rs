use crate::rule::literal_refires;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A threading job: which files, which call chain, which repairs.
#[derive(Debug, Deserialize, Clone)]
pub struct ThreaderConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub files: FileSet,
    pub chain: ChainSpec,
    #[serde(default)]
    pub repair: Vec<RepairFix>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub workspace_relative: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct FileSet {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// A parameter as written in a signature: `name: ty`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// The call chain a parameter is threaded through.
///
/// Every link's signature is `fn name(<leading>, <context>)` and every call
/// into it passes the parameter names as arguments in the same order.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSpec {
    /// The parameter being threaded
    pub parameter: Param,
    /// Trailing parameters shared by every link
    pub context: Vec<Param>,
    /// Function that already declares the parameter as `_name`
    pub entry: EntrySpec,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub constructors: Vec<ConstructorSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EntrySpec {
    pub function: String,
    #[serde(default)]
    pub leading: Vec<Param>,
}

/// A dispatch link: one function, or a family of functions sharing a
/// name prefix and suffix (`parse_*_event`).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LinkSpec {
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub leading: Vec<Param>,
}

/// Which functions a link names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    Exact(String),
    Family { prefix: String, suffix: String },
}

impl Callee {
    /// Regex matching the callee's name (no anchors or boundaries).
    pub fn name_pattern(&self) -> String {
        match self {
            Callee::Exact(name) => regex::escape(name),
            Callee::Family { prefix, suffix } => {
                format!(r"{}\w+{}", regex::escape(prefix), regex::escape(suffix))
            }
        }
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Exact(name) => write!(f, "{name}"),
            Callee::Family { prefix, suffix } => write!(f, "{prefix}*{suffix}"),
        }
    }
}

impl LinkSpec {
    pub fn callee(&self) -> Result<Callee, String> {
        match (&self.function, &self.prefix, &self.suffix) {
            (Some(function), None, None) => Ok(Callee::Exact(function.clone())),
            (None, prefix, suffix) if prefix.is_some() || suffix.is_some() => {
                let prefix = prefix.clone().unwrap_or_default();
                let suffix = suffix.clone().unwrap_or_default();
                if prefix.is_empty() && suffix.is_empty() {
                    return Err("family link needs a non-empty prefix or suffix".to_string());
                }
                Ok(Callee::Family { prefix, suffix })
            }
            (Some(_), _, _) => Err("link names both a function and a family".to_string()),
            (None, _, _) => Err("link needs either `function` or `prefix`/`suffix`".to_string()),
        }
    }
}

/// A leaf constructor called with `(<context args>, <rest...>)`.
#[derive(Debug, Deserialize, Clone)]
pub struct ConstructorSpec {
    pub function: String,
}

/// A literal repair: `search` becomes `replace`.
#[derive(Debug, Deserialize, Clone)]
pub struct RepairFix {
    pub id: String,
    pub search: String,
    pub replace: String,
}

impl ThreaderConfig {
    /// Resolve the configured file list against a workspace root.
    pub fn resolved_files(&self, workspace_root: &Path) -> Vec<PathBuf> {
        self.files
            .paths
            .iter()
            .map(|p| {
                if self.meta.workspace_relative {
                    workspace_root.join(p)
                } else {
                    PathBuf::from(p)
                }
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.files.paths.is_empty() {
            issues.push(ValidationIssue::EmptyFileList);
        }
        for path in &self.files.paths {
            if path.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    context: "files".to_string(),
                    field: "paths[]",
                });
            }
        }

        self.chain.collect_issues(&mut issues);

        for fix in &self.repair {
            let context = format!("repair '{}'", fix.id);
            if fix.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    context: "repair".to_string(),
                    field: "id",
                });
            }
            if fix.search.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    context: context.clone(),
                    field: "search",
                });
            } else if fix.search.contains('\n') {
                issues.push(ValidationIssue::InvalidCombo {
                    context: context.clone(),
                    message: "search text must be a single line".to_string(),
                });
            } else if literal_refires(&fix.search, &fix.replace) {
                issues.push(ValidationIssue::InvalidCombo {
                    context,
                    message: "replacement can rebuild the search text, so a second run would fire again"
                        .to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

impl ChainSpec {
    fn collect_issues(&self, issues: &mut Vec<ValidationIssue>) {
        check_param(&self.parameter, "chain.parameter", issues);

        if self.context.is_empty() {
            issues.push(ValidationIssue::MissingField {
                context: "chain".to_string(),
                field: "context",
            });
        }
        for param in &self.context {
            check_param(param, "chain.context", issues);
        }
        if self
            .context
            .iter()
            .chain(&self.entry.leading)
            .any(|p| p.name == self.parameter.name)
        {
            issues.push(ValidationIssue::InvalidCombo {
                context: "chain".to_string(),
                message: format!(
                    "parameter '{}' is already part of the chain's context",
                    self.parameter.name
                ),
            });
        }

        check_ident(&self.entry.function, "chain.entry", "function", issues);
        for param in &self.entry.leading {
            check_param(param, "chain.entry.leading", issues);
        }

        for (idx, link) in self.links.iter().enumerate() {
            let context = format!("chain.links[{idx}]");
            match link.callee() {
                Ok(Callee::Exact(name)) => check_ident(&name, &context, "function", issues),
                Ok(Callee::Family { prefix, suffix }) => {
                    if !prefix.chars().chain(suffix.chars()).all(is_ident_char) {
                        issues.push(ValidationIssue::InvalidIdentifier {
                            context: context.clone(),
                            value: format!("{prefix}*{suffix}"),
                        });
                    }
                }
                Err(message) => issues.push(ValidationIssue::InvalidCombo {
                    context: context.clone(),
                    message,
                }),
            }
            for param in &link.leading {
                check_param(param, &context, issues);
            }
        }

        for (idx, ctor) in self.constructors.iter().enumerate() {
            check_ident(
                &ctor.function,
                &format!("chain.constructors[{idx}]"),
                "function",
                issues,
            );
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_') && chars.all(is_ident_char)
}

fn check_ident(value: &str, context: &str, field: &'static str, issues: &mut Vec<ValidationIssue>) {
    if value.trim().is_empty() {
        issues.push(ValidationIssue::MissingField {
            context: context.to_string(),
            field,
        });
    } else if !is_ident(value) {
        issues.push(ValidationIssue::InvalidIdentifier {
            context: context.to_string(),
            value: value.to_string(),
        });
    }
}

fn check_param(param: &Param, context: &str, issues: &mut Vec<ValidationIssue>) {
    check_ident(&param.name, context, "name", issues);
    if param.ty.trim().is_empty() {
        issues.push(ValidationIssue::MissingField {
            context: format!("{context} '{}'", param.name),
            field: "ty",
        });
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyFileList,
    MissingField {
        context: String,
        field: &'static str,
    },
    InvalidIdentifier {
        context: String,
        value: String,
    },
    InvalidCombo {
        context: String,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyFileList => write!(f, "threader config lists no files"),
            ValidationIssue::MissingField { context, field } => {
                write!(f, "{context}: missing required field '{field}'")
            }
            ValidationIssue::InvalidIdentifier { context, value } => {
                write!(f, "{context}: '{value}' is not a valid identifier")
            }
            ValidationIssue::InvalidCombo { context, message } => {
                write!(f, "{context}: invalid configuration: {message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_callee_resolution() {
        let exact = LinkSpec {
            function: Some("parse_text_log".to_string()),
            ..Default::default()
        };
        assert_eq!(
            exact.callee().unwrap(),
            Callee::Exact("parse_text_log".to_string())
        );

        let family = LinkSpec {
            prefix: Some("parse_".to_string()),
            suffix: Some("_event".to_string()),
            ..Default::default()
        };
        let callee = family.callee().unwrap();
        assert_eq!(callee.to_string(), "parse_*_event");
        assert_eq!(callee.name_pattern(), r"parse_\w+_event");

        let both = LinkSpec {
            function: Some("f".to_string()),
            prefix: Some("p".to_string()),
            ..Default::default()
        };
        assert!(both.callee().is_err());
        assert!(LinkSpec::default().callee().is_err());

        let empty_family = LinkSpec {
            prefix: Some(String::new()),
            ..Default::default()
        };
        assert!(empty_family.callee().is_err());
    }

    #[test]
    fn identifiers() {
        assert!(is_ident("grpc_recv_us"));
        assert!(is_ident("_x1"));
        assert!(!is_ident("1x"));
        assert!(!is_ident("a-b"));
        assert!(!is_ident(""));
    }

    #[test]
    fn param_display() {
        assert_eq!(Param::new("slot", "u64").to_string(), "slot: u64");
    }
}
