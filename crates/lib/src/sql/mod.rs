//! # SQL Handling
//!
//! Locating candidate statements in completion text and deciding whether they
//! are safe to execute.

pub mod extract;
pub mod validator;

pub use extract::{ExtractionPipeline, Extracted, SqlExtractor};
pub use validator::{Rejection, RejectionKind, SqlValidator, ValidationOutcome};
