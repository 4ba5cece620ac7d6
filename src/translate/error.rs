//! Error types for translator construction
//!
//! Only compilation raises errors; query-time resolution gaps silently
//! reduce the result set instead.

use thiserror::Error;

/// Errors that can occur while compiling a translator
#[derive(Error, Debug)]
pub enum TranslateError {
    /// A rule pattern does not compile to a valid matcher
    #[error("Cannot compile pattern '{pattern}': {message}")]
    BadPattern { pattern: String, message: String },
}

/// Result type for translator operations
pub type TranslateResult<T> = Result<T, TranslateError>;
