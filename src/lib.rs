//! Param Threader: thread an extra parameter through a call chain by
//! rewriting source text.
//!
//! The engine works on raw text, not syntax trees. A call chain (an entry
//! function, dispatch links, leaf constructors) is declared as data and
//! turned into a [`RuleSet`](rule::RuleSet) of pattern rules; a driver folds
//! that set over a list of files and writes back the ones that changed.
//!
//! # Architecture
//!
//! - [`rule`]: pattern rules (literal, single-line regex, delimiter-bounded)
//!   with positional templates, and ordered rule sets
//! - [`pipeline`]: rule sets derived from config, threading and repair
//! - [`driver`]: sequential batch runs with per-file reports
//! - [`audit`]: read-only arity and overlap checks
//! - [`edit`]: verified byte-span splices and atomic persistence
//!
//! # Safety
//!
//! - A rule that matches nothing leaves the text byte-identical
//! - Splices verify their before-text and never overlap
//! - Writes are atomic (tempfile + fsync + rename)
//! - An optional [`WorkspaceGuard`](safety::WorkspaceGuard) keeps writes inside one workspace
//!
//! # Example
//!
//! ```no_run
//! use param_threader::config::load_from_path;
//! use param_threader::driver;
//! use param_threader::pipeline::derive_threading;
//! use std::path::Path;
//!
//! let config = load_from_path("threads/grpc_recv_us.toml")?;
//! let rules = derive_threading(&config.chain)?;
//! let report = driver::run(&config.resolved_files(Path::new(".")), &rules);
//! println!("{} files modified", report.modified());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audit;
pub mod config;
pub mod driver;
pub mod edit;
pub mod pipeline;
pub mod rule;
pub mod safety;

pub use driver::{run, run_with, FileReport, FileStatus, RunOptions, RunReport};
pub use edit::{EditError, Splice, SpliceVerification};
pub use rule::{PatternRule, RuleError, RuleSet};
pub use safety::{SafetyError, WorkspaceGuard};
