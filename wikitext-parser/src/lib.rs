//! # wikitext-parser
//!
//! A compact wikitext parser and linter used by the wikitext language server.
//!
//! The crate turns a page source into an immutable [`SyntaxTree`] whose nodes carry absolute
//! byte spans, a structural [`NodeKind`] and, where it makes sense, a normalized name
//! (page titles for links and templates, canonical magic words, lowercase tag names).
//!
//! It does not try to reproduce MediaWiki exactly. It recognizes the constructs editor
//! features care about:
//!
//!     comments, headings, tables
//!     templates, parser functions, magic variables, template arguments
//!     wiki links, file links with image options, external and free links, magic links
//!     html tags, extension tags with attributes, behavior switches
//!
//! Site specifics (namespaces, tag lists, parser functions, URL protocols) come from a
//! [`ParserConfig`], which can be loaded from JSON.
//!
//! The server only depends on the [`Parser`] trait, so another engine can be dropped in.

pub mod config;
pub mod error;
pub mod lint;
mod parser;
pub mod title;
pub mod tree;

use std::sync::Arc;

pub use config::ParserConfig;
pub use error::{ParseError, ParseResult};
pub use lint::{Fix, LintError, LintSeverity};
pub use parser::{MAX_DEPTH, MAX_LEN};
pub use title::Title;
pub use tree::{Node, NodeId, NodeKind, SyntaxTree};

/// Anything that can turn wikitext into a [`SyntaxTree`].
///
/// Implementations must be deterministic and safe to call from several threads.
pub trait Parser: Send + Sync + 'static {
    fn parse(&self, text: &str) -> ParseResult<SyntaxTree>;

    /// Site configuration the tree was built against.
    fn config(&self) -> &ParserConfig;
}

/// The built-in recursive descent parser.
#[derive(Debug, Clone, Default)]
pub struct WikitextParser {
    config: Arc<ParserConfig>,
}

impl WikitextParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn with_shared_config(config: Arc<ParserConfig>) -> Self {
        Self { config }
    }
}

impl Parser for WikitextParser {
    fn parse(&self, text: &str) -> ParseResult<SyntaxTree> {
        parser::parse(text, &self.config)
    }

    fn config(&self) -> &ParserConfig {
        &self.config
    }
}
