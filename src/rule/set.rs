use crate::rule::errors::RuleError;
use crate::rule::pattern::PatternRule;
use std::collections::HashSet;
use std::ops::Range;

/// An ordered, non-empty sequence of rules folded over a text.
///
/// Rules in one set are meant to have disjoint match domains, which makes
/// the fold independent of rule order. The set does not enforce this;
/// [`RuleSet::domain_conflicts`] reports where it fails for a given input.
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    rules: Vec<PatternRule>,
}

/// Result of folding a rule set over one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOutcome {
    pub text: String,
    /// Hits per rule id, in rule order
    pub hits: Vec<(String, usize)>,
}

impl SetOutcome {
    pub fn total_hits(&self) -> usize {
        self.hits.iter().map(|(_, n)| n).sum()
    }
}

/// Two rules whose matches overlap on the same input.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DomainConflict {
    pub first: String,
    pub second: String,
    pub first_span: Range<usize>,
    pub second_span: Range<usize>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, rules: Vec<PatternRule>) -> Result<Self, RuleError> {
        let name = name.into();
        if rules.is_empty() {
            return Err(RuleError::EmptyRuleSet { name });
        }
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id()) {
                return Err(RuleError::DuplicateRuleId {
                    name,
                    rule: rule.id().to_string(),
                });
            }
        }
        Ok(Self { name, rules })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Sequence `other` after this set, as one fold.
    ///
    /// The result is an ordered pipeline, not a confluent set: `other`'s
    /// rules see this set's output.
    pub fn then(&self, other: &RuleSet) -> Result<RuleSet, RuleError> {
        let mut rules = self.rules.clone();
        rules.extend(other.rules.iter().cloned());
        RuleSet::new(format!("{}+{}", self.name, other.name), rules)
    }

    /// The same rules in a different order. `order` holds indices into the
    /// current rule list; indices that are missing or repeated are an error.
    pub fn reordered(&self, order: &[usize]) -> Option<RuleSet> {
        let mut seen = vec![false; self.rules.len()];
        if order.len() != self.rules.len() {
            return None;
        }
        let mut rules = Vec::with_capacity(order.len());
        for &i in order {
            if *seen.get(i)? {
                return None;
            }
            seen[i] = true;
            rules.push(self.rules[i].clone());
        }
        Some(RuleSet {
            name: self.name.clone(),
            rules,
        })
    }

    /// Fold every rule over `text`, left to right.
    pub fn apply(&self, text: &str) -> SetOutcome {
        let mut current = text.to_string();
        let mut hits = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            let rewrite = rule.apply(&current);
            let n = rewrite.hits;
            if n > 0 {
                current = rewrite.text.into_owned();
            }
            hits.push((rule.id().to_string(), n));
        }

        SetOutcome {
            text: current,
            hits,
        }
    }

    /// Pairs of rules whose matches on `text` overlap.
    ///
    /// An empty result means every rule sees the same matches no matter
    /// which order the set runs in.
    pub fn domain_conflicts(&self, text: &str) -> Vec<DomainConflict> {
        let spans: Vec<(&str, Vec<Range<usize>>)> = self
            .rules
            .iter()
            .map(|r| (r.id(), r.find(text).into_iter().map(|m| m.span).collect()))
            .collect();

        let mut conflicts = Vec::new();
        for (i, (first, first_spans)) in spans.iter().enumerate() {
            for (second, second_spans) in &spans[i + 1..] {
                let overlap = first_spans.iter().find_map(|a| {
                    second_spans
                        .iter()
                        .find(|b| a.start < b.end && b.start < a.end)
                        .map(|b| (a.clone(), b.clone()))
                });
                if let Some((first_span, second_span)) = overlap {
                    conflicts.push(DomainConflict {
                        first: first.to_string(),
                        second: second.to_string(),
                        first_span,
                        second_span,
                    });
                }
            }
        }
        conflicts
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a PatternRule;
    type IntoIter = std::slice::Iter<'a, PatternRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
