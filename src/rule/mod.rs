//! Pattern rules: textual transformations over raw source text.
//!
//! A rule is a matcher (literal, per-line regex, or anchor-bounded list)
//! plus a positional replacement template (`$1`, `${2}`, `$$`). Rules are
//! folded over a file in order by a [`RuleSet`].

pub mod errors;
pub mod matcher;
pub mod pattern;
pub mod scan;
pub mod set;
pub mod template;

pub use errors::RuleError;
pub use matcher::{RuleMatch, Scope};
pub use pattern::{literal_refires, Bounds, PatternRule, Rewrite};
pub use set::{DomainConflict, RuleSet, SetOutcome};
pub use template::Template;
