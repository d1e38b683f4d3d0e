//! Error types for duration parsing.

use crate::parsed::join_words;
use thiserror::Error;

/// Result type for duration parsing.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Why a duration expression was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No tokens at all.
    #[error("no duration given")]
    Empty,

    /// Tokens whose unit (or shape) was not recognized, in encounter order.
    #[error("I don't have these keycode(s): {}", join_words(.0))]
    UnknownKeys(Vec<String>),

    /// The total does not fit in 64 bits of seconds.
    #[error("duration is too long")]
    Overflow,
}
