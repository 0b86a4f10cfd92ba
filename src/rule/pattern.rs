use crate::edit::{apply_splices, Splice};
use crate::rule::errors::RuleError;
use crate::rule::matcher::{Matcher, RuleMatch, Scope};
use crate::rule::template::Template;
use regex::Regex;
use std::borrow::Cow;

/// One textual transformation: a matcher plus a replacement template.
///
/// Immutable once built. Construction validates the pattern and checks the
/// template only references groups the pattern actually has.
#[derive(Debug, Clone)]
pub struct PatternRule {
    id: String,
    matcher: Matcher,
    template: Template,
}

/// Pieces of a multi-line-bounded rule.
#[derive(Debug, Clone)]
pub struct Bounds<'a> {
    /// Regex whose match must end with the open delimiter
    pub anchor: &'a str,
    /// Regex that must match the entire delimited list
    pub body: &'a str,
    /// Regex that rejects a candidate when it matches the list
    pub guard: Option<&'a str>,
}

/// Output of applying a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite<'t> {
    pub text: Cow<'t, str>,
    /// Number of matches whose replacement changed the text
    pub hits: usize,
}

impl PatternRule {
    /// Exact-text substitution on a single line.
    ///
    /// When `search` starts with an identifier character, occurrences glued
    /// to a longer identifier (`_grpc_recv_us` for `grpc_recv_us`) are skipped.
    pub fn literal(
        id: impl Into<String>,
        search: &str,
        replace: &str,
    ) -> Result<Self, RuleError> {
        let id = id.into();
        if search.is_empty() {
            return Err(RuleError::EmptyPattern { rule: id });
        }
        if search.contains('\n') {
            return Err(RuleError::MultiLineLiteral { rule: id });
        }
        if literal_refires(search, replace) {
            return Err(RuleError::NotIdempotent { rule: id });
        }
        let token_start = search.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_');

        Ok(Self {
            matcher: Matcher::Literal {
                needle: search.to_string(),
                token_start,
            },
            template: Template::literal(replace),
            id,
        })
    }

    /// Regex substitution applied to each line independently.
    pub fn single_line(
        id: impl Into<String>,
        pattern: &str,
        template: &str,
    ) -> Result<Self, RuleError> {
        let id = id.into();
        if pattern.is_empty() {
            return Err(RuleError::EmptyPattern { rule: id });
        }
        let re = compile(&id, pattern)?;
        Self::build(id, Matcher::Line(re), template)
    }

    /// Anchor-to-closing-delimiter substitution that may span lines.
    pub fn bounded(
        id: impl Into<String>,
        bounds: Bounds<'_>,
        template: &str,
    ) -> Result<Self, RuleError> {
        let id = id.into();
        if bounds.anchor.is_empty() {
            return Err(RuleError::EmptyPattern { rule: id });
        }
        if !ends_with_open_delimiter(bounds.anchor) {
            return Err(RuleError::UnbalancedAnchor { rule: id });
        }

        let anchor = compile(&id, bounds.anchor)?;
        let body = compile(&id, &format!("^(?:{})$", bounds.body))?;
        let guard = bounds.guard.map(|g| compile(&id, g)).transpose()?;

        Self::build(
            id,
            Matcher::Bounded {
                anchor,
                body,
                guard,
            },
            template,
        )
    }

    fn build(id: String, matcher: Matcher, template: &str) -> Result<Self, RuleError> {
        let template = Template::parse(&id, template)?;
        let available = matcher.group_count();
        if let Some(group) = template.max_group() {
            if group > available {
                return Err(RuleError::UnknownGroup {
                    rule: id,
                    group,
                    available,
                });
            }
        }
        Ok(Self {
            id,
            matcher,
            template,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> Scope {
        self.matcher.scope()
    }

    pub fn template(&self) -> &str {
        self.template.as_str()
    }

    /// Pattern source for display.
    pub fn pattern(&self) -> String {
        match &self.matcher {
            Matcher::Literal { needle, .. } => needle.clone(),
            Matcher::Line(re) => re.as_str().to_string(),
            Matcher::Bounded { anchor, body, .. } => format!("{} … {}", anchor.as_str(), body.as_str()),
        }
    }

    /// All non-overlapping matches in `text`.
    pub fn find(&self, text: &str) -> Vec<RuleMatch> {
        self.matcher.find_all(text)
    }

    /// Replace every match in `text`.
    ///
    /// A rule that does not match returns the input borrowed, byte for byte.
    pub fn apply<'t>(&self, text: &'t str) -> Rewrite<'t> {
        let splices: Vec<Splice> = self
            .find(text)
            .into_iter()
            .map(|m| {
                let replacement = self.template.render(text, &m.groups);
                Splice::new(m.span.start, m.span.end, replacement, m.text(text))
            })
            .filter(|s| !s.is_noop(text))
            .collect();

        if splices.is_empty() {
            return Rewrite {
                text: Cow::Borrowed(text),
                hits: 0,
            };
        }

        let hits = splices.len();
        match apply_splices(text, splices) {
            Ok(rewritten) => {
                tracing::trace!(rule = %self.id, hits, "rule fired");
                Rewrite {
                    text: Cow::Owned(rewritten),
                    hits,
                }
            }
            // Matches come from one left-to-right scan of this exact text,
            // so they are disjoint and verified; this arm is unreachable in practice.
            Err(error) => {
                tracing::warn!(rule = %self.id, %error, "discarding inconsistent matches");
                Rewrite {
                    text: Cow::Borrowed(text),
                    hits: 0,
                }
            }
        }
    }
}

/// Whether replacing `search` with `replace` can leave a fresh `search`
/// behind: inside the replacement, or glued to a partial occurrence on
/// either side (`)),` -> `),` turns `))),` back into `)),`).
pub fn literal_refires(search: &str, replace: &str) -> bool {
    if replace.contains(search) {
        return true;
    }
    // Proper prefixes and proper suffixes, split on char boundaries
    let prefixes: Vec<&str> = search.char_indices().map(|(i, _)| &search[..i]).collect();
    let suffixes: Vec<&str> = search
        .char_indices()
        .map(|(i, c)| &search[i + c.len_utf8()..])
        .collect();

    prefixes.iter().any(|before| {
        suffixes.iter().any(|after| {
            let glued = format!("{before}{replace}{after}");
            glued.contains(search)
        })
    })
}

fn compile(id: &str, pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
        rule: id.to_string(),
        source,
    })
}

fn ends_with_open_delimiter(anchor: &str) -> bool {
    // Allow a closing group paren after the escaped delimiter: `(fn\s+f\()`
    let trimmed = anchor.trim_end_matches(')');
    let trimmed = if trimmed.ends_with('\\') {
        // `\)` was the last thing: put the escaped paren back
        &anchor[..trimmed.len() + 1]
    } else {
        trimmed
    };
    [r"\(", r"\[", r"\{"].iter().any(|d| trimmed.ends_with(d))
}
