use crate::rule::scan;
use regex::Regex;
use std::ops::Range;

/// A single match of a rule against a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// Byte span of the whole match
    pub span: Range<usize>,
    /// Capture spans; index 0 is the whole match
    pub groups: Vec<Option<Range<usize>>>,
}

impl RuleMatch {
    pub fn text<'t>(&self, text: &'t str) -> &'t str {
        &text[self.span.clone()]
    }
}

/// Where a rule is allowed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// Matches never cross a line terminator
    SingleLine,
    /// Matches run from an anchor through its balanced closing delimiter
    MultiLineBounded,
}

/// How a rule finds its matches.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Exact text. With `token_start`, an occurrence only counts when it is
    /// not preceded by an identifier character.
    Literal { needle: String, token_start: bool },
    /// A regex applied to each line on its own.
    Line(Regex),
    /// Anchor regex ending at an open delimiter, a body regex that must
    /// match the whole delimited list, and an optional rejecting guard.
    Bounded {
        anchor: Regex,
        body: Regex,
        guard: Option<Regex>,
    },
}

impl Matcher {
    pub fn scope(&self) -> Scope {
        match self {
            Matcher::Literal { .. } | Matcher::Line(_) => Scope::SingleLine,
            Matcher::Bounded { .. } => Scope::MultiLineBounded,
        }
    }

    /// Number of capture groups a template may reference, excluding group 0.
    pub fn group_count(&self) -> usize {
        match self {
            Matcher::Literal { .. } => 0,
            Matcher::Line(re) => re.captures_len() - 1,
            Matcher::Bounded { anchor, body, .. } => {
                anchor.captures_len() - 1 + body.captures_len() - 1
            }
        }
    }

    /// All non-overlapping matches, left to right.
    pub fn find_all(&self, text: &str) -> Vec<RuleMatch> {
        match self {
            Matcher::Literal {
                needle,
                token_start,
            } => find_literal(text, needle, *token_start),
            Matcher::Line(re) => find_per_line(text, re),
            Matcher::Bounded {
                anchor,
                body,
                guard,
            } => find_bounded(text, anchor, body, guard.as_ref()),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        !self.find_all(text).is_empty()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn find_literal(text: &str, needle: &str, token_start: bool) -> Vec<RuleMatch> {
    let mut matches = Vec::new();
    if needle.is_empty() {
        return matches;
    }
    let step = needle.chars().next().map_or(1, char::len_utf8);
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(needle) {
        let start = pos + offset;
        let at_boundary = !token_start
            || text[..start]
                .chars()
                .next_back()
                .map_or(true, |c| !is_ident_char(c));

        if at_boundary {
            let span = start..start + needle.len();
            matches.push(RuleMatch {
                groups: vec![Some(span.clone())],
                span,
            });
            pos = start + needle.len();
        } else {
            pos = start + step;
        }
    }
    matches
}

fn find_per_line(text: &str, re: &Regex) -> Vec<RuleMatch> {
    let mut matches = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches('\n').trim_end_matches('\r');
        for caps in re.captures_iter(body) {
            let groups: Vec<_> = caps
                .iter()
                .map(|g| g.map(|m| offset + m.start()..offset + m.end()))
                .collect();
            if let Some(Some(span)) = groups.first().cloned() {
                matches.push(RuleMatch { span, groups });
            }
        }
        offset += line.len();
    }
    matches
}

fn find_bounded(text: &str, anchor: &Regex, body: &Regex, guard: Option<&Regex>) -> Vec<RuleMatch> {
    let mut matches = Vec::new();
    let mut pos = 0;

    while pos <= text.len() {
        let Some(anchor_caps) = anchor.captures_at(text, pos) else {
            break;
        };
        let Some(whole) = anchor_caps.get(0) else {
            break;
        };
        // Anchors are non-empty by construction; guard against stalling anyway
        let resume = whole.end().max(whole.start() + 1);

        let Some(close) = scan::find_close(text, whole.end()) else {
            pos = resume;
            continue;
        };
        let inner_start = whole.end();
        let inner = &text[inner_start..close];

        if guard.is_some_and(|g| g.is_match(inner)) {
            pos = resume;
            continue;
        }
        let Some(body_caps) = body.captures(inner) else {
            pos = resume;
            continue;
        };

        let span = whole.start()..close + 1;
        let mut groups = vec![Some(span.clone())];
        groups.extend(
            anchor_caps
                .iter()
                .skip(1)
                .map(|g| g.map(|m| m.start()..m.end())),
        );
        groups.extend(
            body_caps
                .iter()
                .skip(1)
                .map(|g| g.map(|m| inner_start + m.start()..inner_start + m.end())),
        );

        matches.push(RuleMatch { span, groups });
        pos = close + 1;
    }
    matches
}
