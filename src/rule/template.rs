use crate::rule::errors::RuleError;
use std::ops::Range;

/// A parsed replacement template.
///
/// Syntax: `$N` or `${N}` inserts capture group N, `$$` is a literal `$`.
/// Everything else is copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Group(usize),
}

impl Template {
    /// Parse a template string. `rule` is only used in error messages.
    pub fn parse(rule: &str, source: &str) -> Result<Self, RuleError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }

            match chars.peek().copied() {
                Some((_, '$')) => {
                    chars.next();
                    literal.push('$');
                }
                Some((_, '{')) => {
                    chars.next();
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, d)) if d.is_ascii_digit() => digits.push(d),
                            _ => {
                                return Err(RuleError::MalformedTemplate {
                                    rule: rule.to_string(),
                                    message: format!("unterminated or non-numeric group at byte {pos}"),
                                })
                            }
                        }
                    }
                    let group = parse_group(rule, &digits, pos)?;
                    flush(&mut literal, &mut segments);
                    segments.push(Segment::Group(group));
                }
                Some((_, d)) if d.is_ascii_digit() => {
                    let mut digits = String::new();
                    while let Some((_, d)) = chars.peek().copied() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        digits.push(d);
                        chars.next();
                    }
                    let group = parse_group(rule, &digits, pos)?;
                    flush(&mut literal, &mut segments);
                    segments.push(Segment::Group(group));
                }
                _ => {
                    return Err(RuleError::MalformedTemplate {
                        rule: rule.to_string(),
                        message: format!("stray '$' at byte {pos} (use $$ for a literal dollar)"),
                    })
                }
            }
        }
        flush(&mut literal, &mut segments);

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// A template that always renders `text` verbatim.
    pub fn literal(text: &str) -> Self {
        let segments = if text.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal(text.to_string())]
        };
        Self {
            source: text.replace('$', "$$"),
            segments,
        }
    }

    /// Highest group number referenced, if any.
    pub fn max_group(&self) -> Option<usize> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Group(g) => Some(*g),
                Segment::Literal(_) => None,
            })
            .max()
    }

    /// Render against `text` using capture spans. Groups that did not
    /// participate in the match render as the empty string.
    pub fn render(&self, text: &str, groups: &[Option<Range<usize>>]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Group(g) => {
                    if let Some(Some(span)) = groups.get(*g) {
                        out.push_str(&text[span.clone()]);
                    }
                }
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn parse_group(rule: &str, digits: &str, pos: usize) -> Result<usize, RuleError> {
    digits.parse().map_err(|_| RuleError::MalformedTemplate {
        rule: rule.to_string(),
        message: format!("empty group reference at byte {pos}"),
    })
}

fn flush(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}
