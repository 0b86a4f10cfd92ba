use thiserror::Error;

/// Rule construction errors.
///
/// Applying a rule never fails; everything that can go wrong with a rule is
/// caught when it is built.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("rule '{rule}': invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{rule}': template references ${group} but the pattern has {available} groups")]
    UnknownGroup {
        rule: String,
        group: usize,
        available: usize,
    },

    #[error("rule '{rule}': malformed template: {message}")]
    MalformedTemplate { rule: String, message: String },

    #[error("rule '{rule}': anchor must end with an open delimiter")]
    UnbalancedAnchor { rule: String },

    #[error("rule '{rule}': literal search text spans multiple lines")]
    MultiLineLiteral { rule: String },

    #[error("rule '{rule}': empty search pattern")]
    EmptyPattern { rule: String },

    #[error("rule '{rule}': replacement re-introduces the search text")]
    NotIdempotent { rule: String },

    #[error("rule set '{name}' contains no rules")]
    EmptyRuleSet { name: String },

    #[error("rule set '{name}' contains duplicate rule id '{rule}'")]
    DuplicateRuleId { name: String, rule: String },
}
