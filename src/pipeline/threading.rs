//! Derive the threading rule set from a call chain.
//!
//! Four rule shapes cover every role in a chain:
//!
//! - `promote:<entry>` renames the entry's unused `_param` to `param`
//! - `call:<link>` appends `param` to single-line calls into a link
//! - `signature:<link>` appends `param: Type` to a link's parameter list,
//!   keeping the indentation of the last parameter and its trailing comma
//! - `constructor:<ctor>` appends `param` after a variable-length argument
//!   tail, unless the list already ends with it
//!
//! Call sites are assumed to pass arguments named exactly like the
//! parameters they bind to.

use crate::config::{Callee, ChainSpec, Param};
use crate::pipeline::PipelineError;
use crate::rule::{Bounds, PatternRule, RuleSet};

pub const THREADING_SET: &str = "threading";

/// Build the rules in chain order: entry, then each link's call and
/// signature rules, then constructors.
pub fn derive(chain: &ChainSpec) -> Result<RuleSet, PipelineError> {
    let mut rules = vec![promote_rule(chain)?];

    for (index, link) in chain.links.iter().enumerate() {
        let callee = link
            .callee()
            .map_err(|message| PipelineError::InvalidLink { index, message })?;
        let params: Vec<&Param> = link.leading.iter().chain(&chain.context).collect();
        rules.push(call_rule(&callee, &params, &chain.parameter)?);
        rules.push(signature_rule(&callee, &params, &chain.parameter)?);
    }

    for ctor in &chain.constructors {
        rules.push(constructor_rule(&ctor.function, chain)?);
    }

    tracing::debug!(rules = rules.len(), parameter = %chain.parameter.name, "derived threading rules");
    Ok(RuleSet::new(THREADING_SET, rules)?)
}

/// Whitespace-tolerant regex for a type as written in a signature.
fn ty_pattern(ty: &str) -> String {
    ty.split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s*")
}

fn param_pattern(param: &Param) -> String {
    format!(
        r"\s*{}\s*:\s*{}\s*",
        regex::escape(&param.name),
        ty_pattern(&param.ty)
    )
}

fn promote_rule(chain: &ChainSpec) -> Result<PatternRule, PipelineError> {
    let entry = &chain.entry;
    let param = &chain.parameter;
    let head: String = entry
        .leading
        .iter()
        .chain(&chain.context)
        .map(|p| format!("{},", param_pattern(p)))
        .collect();
    let anchor = format!(r"\b(fn\s+{}\()", regex::escape(&entry.function));
    let body = format!(
        r"({head}\s*)_{}(\s*:\s*{}\s*,?\s*)",
        regex::escape(&param.name),
        ty_pattern(&param.ty)
    );

    Ok(PatternRule::bounded(
        format!("promote:{}", entry.function),
        Bounds {
            anchor: &anchor,
            body: &body,
            guard: None,
        },
        &format!("${{1}}${{2}}{}${{3}})", param.name),
    )?)
}

fn call_rule(callee: &Callee, params: &[&Param], param: &Param) -> Result<PatternRule, PipelineError> {
    let args = params
        .iter()
        .map(|p| format!(r"[ \t]*{}", regex::escape(&p.name)))
        .collect::<Vec<_>>()
        .join(r"[ \t]*,");
    let pattern = format!(r"\b({}\({args})[ \t]*\)", callee.name_pattern());

    Ok(PatternRule::single_line(
        format!("call:{callee}"),
        &pattern,
        &format!("${{1}}, {})", param.name),
    )?)
}

fn signature_rule(
    callee: &Callee,
    params: &[&Param],
    param: &Param,
) -> Result<PatternRule, PipelineError> {
    let id = format!("signature:{callee}");
    let anchor = format!(r"\b(fn\s+{}\()", callee.name_pattern());

    let (body, template) = match params.split_last() {
        Some((last, init)) if !init.is_empty() => {
            let head: String = init.iter().map(|p| format!("{},", param_pattern(p))).collect();
            (
                format!(
                    r"({head}(\s*){}\s*:\s*{})(,?)(\s*)",
                    regex::escape(&last.name),
                    ty_pattern(&last.ty)
                ),
                format!("${{1}}${{2}},${{3}}{param}${{4}}${{5}})"),
            )
        }
        // A lone parameter has no separator whitespace to copy.
        Some((last, _)) => (
            format!(
                r"(\s*{}\s*:\s*{})(,?)(\s*)",
                regex::escape(&last.name),
                ty_pattern(&last.ty)
            ),
            format!("${{1}}${{2}}, {param}${{3}}${{4}})"),
        ),
        None => (
            r"(\s*)".to_string(),
            format!("${{1}}{param}${{2}})"),
        ),
    };

    Ok(PatternRule::bounded(
        id,
        Bounds {
            anchor: &anchor,
            body: &body,
            guard: None,
        },
        &template,
    )?)
}

fn constructor_rule(function: &str, chain: &ChainSpec) -> Result<PatternRule, PipelineError> {
    let param = &chain.parameter;
    let context: String = chain
        .context
        .iter()
        .map(|p| format!(r"\s*{}\s*,", regex::escape(&p.name)))
        .collect();
    let anchor = format!(r"\b({}\()", regex::escape(function));
    let body = format!(r"({context}\s*\S[\s\S]*?)(,?\s*)");
    let guard = format!(r",\s*{}\s*,?\s*$", regex::escape(&param.name));

    Ok(PatternRule::bounded(
        format!("constructor:{function}"),
        Bounds {
            anchor: &anchor,
            body: &body,
            guard: Some(&guard),
        },
        &format!("${{1}}${{2}}, {}${{3}})", param.name),
    )?)
}
