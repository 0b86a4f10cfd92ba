use crate::config::RepairFix;
use crate::pipeline::PipelineError;
use crate::rule::{PatternRule, RuleSet};

pub const REPAIR_SET: &str = "repair";

/// Literal cleanup rules for doubled closing delimiters and similar
/// leftovers of a naive insertion.
pub fn derive(fixes: &[RepairFix]) -> Result<RuleSet, PipelineError> {
    if fixes.is_empty() {
        return Err(PipelineError::NoRepairs);
    }
    let rules = fixes
        .iter()
        .map(|fix| PatternRule::literal(format!("repair:{}", fix.id), &fix.search, &fix.replace))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RuleSet::new(REPAIR_SET, rules)?)
}
