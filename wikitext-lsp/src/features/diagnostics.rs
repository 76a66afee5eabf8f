use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Range};
use wikitext_parser::{Fix, LintError, LintSeverity, SyntaxTree};

use crate::document::TextDocument;
use crate::position::range_from_offsets;

pub const LINT_SOURCE: &str = "WikiLint";

/// One replacement offered for a diagnostic, carried in its `data` field so code actions
/// can be computed from the diagnostic alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickFixData {
    pub range: Range,
    pub new_text: String,
    pub title: String,
    /// Safe to apply without review.
    pub fix: bool,
}

impl QuickFixData {
    fn new(document: &TextDocument, fix: &Fix, automatic: bool) -> Self {
        let label = if automatic { "Fix" } else { "Suggestion" };
        Self {
            range: range_from_offsets(document, fix.range.0, fix.range.1),
            new_text: fix.text.clone(),
            title: format!("{label}: {}", fix.desc),
            fix: automatic,
        }
    }
}

/// Lint problems of `tree`. Warnings are dropped unless `warnings` is set.
pub fn collect_diagnostics(
    document: &TextDocument,
    tree: &SyntaxTree,
    warnings: bool,
) -> Vec<Diagnostic> {
    tree.lint()
        .into_iter()
        .filter(|error| warnings || error.severity == LintSeverity::Error)
        .map(|error| to_diagnostic(document, &error))
        .collect()
}

fn to_diagnostic(document: &TextDocument, error: &LintError) -> Diagnostic {
    let fixes: Vec<QuickFixData> = error
        .fix
        .iter()
        .map(|fix| QuickFixData::new(document, fix, true))
        .chain(
            error
                .suggestions
                .iter()
                .map(|fix| QuickFixData::new(document, fix, false)),
        )
        .collect();
    Diagnostic {
        range: range_from_offsets(document, error.start, error.end),
        severity: Some(match error.severity {
            LintSeverity::Error => DiagnosticSeverity::ERROR,
            LintSeverity::Warning => DiagnosticSeverity::WARNING,
        }),
        code: Some(NumberOrString::String(error.rule.to_string())),
        code_description: None,
        source: Some(LINT_SOURCE.to_string()),
        message: error.message.clone(),
        related_information: None,
        tags: None,
        data: serde_json::to_value(fixes).ok(),
    }
}

/// Replacements attached to a diagnostic by [`collect_diagnostics`].
pub fn quick_fixes(diagnostic: &Diagnostic) -> Vec<QuickFixData> {
    diagnostic
        .data
        .clone()
        .and_then(|data| serde_json::from_value(data).ok())
        .unwrap_or_default()
}
