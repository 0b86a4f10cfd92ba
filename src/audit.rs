//! Read-only consistency checks for a threading job.
//!
//! The rewrite pass never verifies its own matches, so this is where a
//! half-threaded tree shows up: calls whose argument count disagrees with
//! the function they call, rules whose matches overlap, and sites the
//! threading rules would still rewrite.

use crate::config::{Callee, ChainSpec};
use crate::rule::scan::{find_close, split_top_level};
use crate::rule::{RuleError, RuleSet};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Finding {
    /// A call passes a different number of arguments than any definition
    /// of the function in the same file accepts
    ArityMismatch {
        path: PathBuf,
        line: usize,
        function: String,
        expected: Vec<usize>,
        found: usize,
    },
    /// Two rules match overlapping text, so rule order matters
    RuleOverlap {
        path: PathBuf,
        line: usize,
        first: String,
        second: String,
    },
    Unreadable { path: PathBuf, reason: String },
}

/// A rule that would still rewrite sites in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pending {
    pub path: PathBuf,
    pub rule: String,
    pub sites: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub files: usize,
    pub findings: Vec<Finding>,
    pub pending: Vec<Pending>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

pub fn audit_files<P: AsRef<Path>>(
    files: &[P],
    chain: &ChainSpec,
    rules: &RuleSet,
) -> Result<AuditReport, RuleError> {
    let checker = ArityChecker::new(chain)?;
    let mut report = AuditReport::default();

    for path in files {
        let path = path.as_ref();
        report.files += 1;
        let text = match fs::read(path).map(String::from_utf8) {
            Ok(Ok(text)) => text,
            Ok(Err(_)) => {
                report.findings.push(Finding::Unreadable {
                    path: path.to_path_buf(),
                    reason: "not valid UTF-8".to_string(),
                });
                continue;
            }
            Err(error) => {
                report.findings.push(Finding::Unreadable {
                    path: path.to_path_buf(),
                    reason: error.to_string(),
                });
                continue;
            }
        };

        report.findings.extend(checker.check(path, &text));
        report.findings.extend(overlaps(path, &text, rules));
        report.pending.extend(pending(path, &text, rules));
    }

    tracing::debug!(
        files = report.files,
        findings = report.findings.len(),
        "audit finished"
    );
    Ok(report)
}

fn overlaps(path: &Path, text: &str, rules: &RuleSet) -> Vec<Finding> {
    rules
        .domain_conflicts(text)
        .into_iter()
        .map(|c| Finding::RuleOverlap {
            path: path.to_path_buf(),
            line: line_of(text, c.first_span.start.max(c.second_span.start)),
            first: c.first,
            second: c.second,
        })
        .collect()
}

fn pending(path: &Path, text: &str, rules: &RuleSet) -> Vec<Pending> {
    rules
        .apply(text)
        .hits
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(rule, sites)| Pending {
            path: path.to_path_buf(),
            rule,
            sites,
        })
        .collect()
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Compares call sites against definitions for every function the chain
/// names.
struct ArityChecker {
    definition: Regex,
    call: Regex,
}

impl ArityChecker {
    fn new(chain: &ChainSpec) -> Result<Self, RuleError> {
        let mut names: Vec<String> = vec![regex::escape(&chain.entry.function)];
        names.extend(
            chain
                .links
                .iter()
                .filter_map(|l| l.callee().ok())
                .map(|c| c.name_pattern()),
        );
        names.extend(
            chain
                .constructors
                .iter()
                .map(|c| Callee::Exact(c.function.clone()).name_pattern()),
        );
        let names = names.join("|");

        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|source| RuleError::InvalidPattern {
                rule: "audit:arity".to_string(),
                source,
            })
        };
        Ok(Self {
            definition: compile(format!(r"\bfn\s+({names})\s*\("))?,
            call: compile(format!(r"(\.|::)?\b({names})\s*\("))?,
        })
    }

    fn check(&self, path: &Path, text: &str) -> Vec<Finding> {
        // name -> (arity excluding self, is_method) per definition
        let mut defs: BTreeMap<&str, Vec<(usize, bool)>> = BTreeMap::new();
        let mut def_opens = Vec::new();

        for caps in self.definition.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Some(close) = find_close(text, whole.end()) else {
                continue;
            };
            let params = split_top_level(&text[whole.end()..close], true);
            let is_method = params.first().is_some_and(|p| is_self_param(p));
            let arity = params.len() - usize::from(is_method);
            defs.entry(name.as_str()).or_default().push((arity, is_method));
            def_opens.push(whole.end());
        }

        let mut findings = Vec::new();
        for caps in self.call.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            if def_opens.contains(&whole.end()) {
                continue;
            }
            let Some(candidates) = defs.get(name.as_str()) else {
                continue;
            };
            let Some(close) = find_close(text, whole.end()) else {
                continue;
            };
            let found = split_top_level(&text[whole.end()..close], false).len();
            let method_syntax = caps.get(1).is_some_and(|m| m.as_str() == ".");

            let expected: Vec<usize> = candidates
                .iter()
                .map(|&(arity, is_method)| {
                    // `Self::f(self, ..)` passes the receiver explicitly
                    if is_method && !method_syntax {
                        arity + 1
                    } else {
                        arity
                    }
                })
                .collect();
            if !expected.contains(&found) {
                findings.push(Finding::ArityMismatch {
                    path: path.to_path_buf(),
                    line: line_of(text, name.start()),
                    function: name.as_str().to_string(),
                    expected,
                    found,
                });
            }
        }
        findings
    }
}

fn is_self_param(param: &str) -> bool {
    let param = param.trim_start_matches('&').trim_start();
    let param = param
        .strip_prefix('\'')
        .and_then(|rest| rest.split_once(char::is_whitespace).map(|(_, r)| r))
        .unwrap_or(param);
    let param = param.strip_prefix("mut ").unwrap_or(param).trim_start();
    param == "self" || param.starts_with("self:") || param.starts_with("self ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::pipeline::derive_threading;

    const CONFIG: &str = r#"
[files]
paths = ["parser.rs"]

[chain.parameter]
name = "recv_us"
ty = "i64"

[[chain.context]]
name = "slot"
ty = "u64"

[chain.entry]
function = "parse"
leading = [{ name = "log", ty = "&str" }]

[[chain.links]]
prefix = "parse_"
suffix = "_event"
leading = [{ name = "data", ty = "&[u8]" }]

[[chain.constructors]]
function = "meta"
"#;

    fn chain() -> ChainSpec {
        load_from_str(CONFIG).unwrap().chain
    }

    fn audit(text: &str) -> (Vec<Finding>, Vec<Pending>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parser.rs");
        fs::write(&path, text).unwrap();
        let chain = chain();
        let rules = derive_threading(&chain).unwrap();
        let report = audit_files(&[&path], &chain, &rules).unwrap();
        assert_eq!(report.files, 1);
        (report.findings, report.pending)
    }

    #[test]
    fn consistent_file_is_clean() {
        let text = "fn parse(log: &str, slot: u64, recv_us: i64) {\n    parse_swap_event(data, slot, recv_us);\n}\n\nfn parse_swap_event(data: &[u8], slot: u64, recv_us: i64) {}\n";
        let (findings, pending) = audit(text);
        assert!(findings.is_empty(), "{findings:?}");
        assert!(pending.is_empty());
    }

    #[test]
    fn half_threaded_call_is_flagged() {
        let text = "fn parse(log: &str, slot: u64, recv_us: i64) {\n    parse_swap_event(data, slot);\n}\n\nfn parse_swap_event(data: &[u8], slot: u64, recv_us: i64) {}\n";
        let (findings, pending) = audit(text);
        assert_eq!(findings.len(), 1);
        match &findings[0] {
            Finding::ArityMismatch {
                line,
                function,
                expected,
                found,
                ..
            } => {
                assert_eq!(*line, 2);
                assert_eq!(function, "parse_swap_event");
                assert_eq!(expected, &[3]);
                assert_eq!(*found, 2);
            }
            other => panic!("unexpected finding {other:?}"),
        }
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].rule, "call:parse_*_event");
    }

    #[test]
    fn method_receiver_is_not_an_argument() {
        let text = "impl P {\n    fn parse_swap_event(&self, data: &[u8], slot: u64) {}\n    fn run(&self) {\n        self.parse_swap_event(data, slot);\n        Self::parse_swap_event(self, data, slot);\n    }\n}\n";
        let (findings, _) = audit(text);
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn unreadable_file_is_reported() {
        let chain = chain();
        let rules = derive_threading(&chain).unwrap();
        let report = audit_files(&["/nonexistent/parser.rs"], &chain, &rules).unwrap();
        assert!(matches!(report.findings[0], Finding::Unreadable { .. }));
        assert!(!report.is_clean());
    }

    #[test]
    fn self_params() {
        for p in ["self", "&self", "&mut self", "mut self", "&'a self", "self: Box<Self>"] {
            assert!(is_self_param(p), "{p}");
        }
        for p in ["selfish: u8", "data: &[u8]", "&str"] {
            assert!(!is_self_param(p), "{p}");
        }
    }
}
