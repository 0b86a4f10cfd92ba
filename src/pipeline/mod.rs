//! Rule sets derived from configuration.
//!
//! [`threading`] turns a call chain into the rules that thread one extra
//! parameter through it; [`repair`] turns literal fixes into a cleanup pass.

pub mod repair;
pub mod threading;

use crate::rule::RuleError;
use thiserror::Error;

pub use repair::{derive as derive_repair, REPAIR_SET};
pub use threading::{derive as derive_threading, THREADING_SET};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("chain link {index}: {message}")]
    InvalidLink { index: usize, message: String },

    #[error("no repair fixes configured")]
    NoRepairs,

    #[error(transparent)]
    Rule(#[from] RuleError),
}
