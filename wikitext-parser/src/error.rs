//! Parser failures.

use thiserror::Error;

/// Errors raised while turning wikitext into a [`SyntaxTree`](crate::SyntaxTree).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Constructs nest deeper than the parser is willing to follow.
    #[error("nesting depth exceeds {limit} at byte {offset}")]
    TooDeep { offset: usize, limit: usize },

    /// The document is larger than the parser accepts.
    #[error("document of {len} bytes exceeds the {limit} byte limit")]
    TooLarge { len: usize, limit: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;
