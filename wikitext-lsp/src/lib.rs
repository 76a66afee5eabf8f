//! Language Server Protocol (LSP) implementation for MediaWiki wikitext
//!
//!     This crate adapts the wikitext parser and linter to the LSP, giving any LSP-capable
//!     editor diagnostics, completion, navigation and editing help for wiki pages.
//!
//! Feature Set
//!
//!     Diagnostics (textDocument/diagnostic, pull model):
//!         - Lint problems with automatic fixes and suggestions carried in `data`
//!         - JSON payloads of `templatedata`, `mapframe`, `maplink` and `graph`
//!         - TeX and LilyPond fragments checked by external validators from the settings
//!
//!     Code Actions (textDocument/codeAction):
//!         - Quick fixes and suggestions per diagnostic
//!         - Fix all, per rule and for every rule at once (also as `source.fixAll`)
//!         - Escape a selection with magic words (`{{!}}`, `{{!!}}`, `{{=}}`)
//!
//!     Completion (textDocument/completion):
//!         - Tags, attributes and attribute values
//!         - Parser functions, variables, behavior switches and URL protocols
//!         - Templates, arguments, parameter keys and link targets used in the page
//!         - Image options of file links
//!
//!     Navigation:
//!         - Document links to articles, templates, modules, files and external URLs
//!         - References, highlights, rename and footnote definitions
//!         - Section outline (document symbols) and folding ranges
//!
//!     Editing help:
//!         - Hover and signature help for magic words
//!         - Inlay hints for implicit template parameter keys
//!         - Color swatches for hex, functional and named CSS colors
//!
//! Architecture
//!
//!     LSP Layer (tower-lsp):
//!         - JSON-RPC over stdio, capability negotiation, request routing
//!
//!     Server Layer (`server`):
//!         - Implements the LanguageServer trait over two seams: `LspClient` for the requests
//!           sent back to the editor and `FeatureProvider` for the features
//!         - Gates each feature on the per-document settings (`settings`)
//!         - Maps parse failures to JSON-RPC internal errors for that request only
//!
//!     Document Layer (`document`, `position`, `task`, `tasks`):
//!         - Full-text documents with a line index; positions count characters, offsets
//!           count bytes
//!         - One reparse task per document coalesces bursts of edits so every request is
//!           answered from a tree of the latest text
//!         - A secondary task per document parses signature help snippets
//!
//!     Feature Layer (`features`):
//!         - Stateless functions of a document, its tree and the request parameters
//!         - All logic and dense unit tests live here
//!
//! Usage
//!
//!     Binary:
//!         $ wikitext-lsp
//!         Starts the language server on stdin/stdout. Logs go to stderr and are filtered
//!         by the `WIKITEXT_LSP_LOG` environment variable (default `info`).
//!

pub mod document;
pub mod features;
pub mod position;
pub mod server;
pub mod settings;
pub mod task;
pub mod tasks;

pub use document::{DocumentStore, TextDocument};
pub use server::{DefaultFeatureProvider, FeatureProvider, LspClient, WikitextLanguageServer};
pub use settings::{Settings, SettingsCache};
pub use task::{ReparseTask, TaskError, TaskPhase};
pub use tasks::{Parsed, TaskRegistry};
