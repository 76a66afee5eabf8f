//! Diagnostics for content embedded in extension tags.
//!
//!     JSON payloads (`templatedata`, `mapframe`, `maplink`, `graph`) are checked in process.
//!     TeX (`math`, `chem`) and LilyPond (`score`) are handed to the executables named in the
//!     linter settings: the fragment is written to the validator's stdin, the tag name is its
//!     only argument, and problems are read back from stderr as
//!
//!         <file>:<line>:<column>: <error|warning>: <message>
//!
//!     with 1-based line and column relative to the fragment. A validator that is missing,
//!     crashes or times out contributes nothing.

use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity};
use tracing::{debug, warn};
use wikitext_config::LinterSettings;
use wikitext_parser::{NodeKind, SyntaxTree};

use crate::document::TextDocument;
use crate::position::range_from_offsets;

const JSON_TAGS: &[&str] = &["templatedata", "mapframe", "maplink", "graph"];
const TEX_TAGS: &[&str] = &["math", "chem"];
const SCORE_TAGS: &[&str] = &["score"];

const VALIDATOR_TIMEOUT: Duration = Duration::from_secs(10);

static REPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[^:\n]*:(\d+):(\d+): (error|warning): (.+?)\r?$").unwrap()
});

/// Inner text of an extension tag, located in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub tag: String,
    pub start: usize,
    pub text: String,
}

impl Fragment {
    /// Document offset of a 1-based line and column inside the fragment.
    fn offset(&self, line: usize, column: usize) -> usize {
        let line_start = if line <= 1 {
            0
        } else {
            self.text
                .match_indices('\n')
                .nth(line - 2)
                .map_or(self.text.len(), |(idx, _)| idx + 1)
        };
        let line_end = self.text[line_start..]
            .find('\n')
            .map_or(self.text.len(), |idx| line_start + idx);
        self.start + (line_start + column.saturating_sub(1)).min(line_end)
    }

    fn diagnostic(
        &self,
        document: &TextDocument,
        offset: usize,
        severity: DiagnosticSeverity,
        source: &str,
        message: String,
    ) -> Diagnostic {
        let end = (offset + 1).min(self.start + self.text.len()).max(offset);
        Diagnostic {
            range: range_from_offsets(document, offset, end),
            severity: Some(severity),
            code: None,
            code_description: None,
            source: Some(source.to_string()),
            message,
            related_information: None,
            tags: None,
            data: None,
        }
    }
}

/// Non-empty inner texts of the extension tags named in `tags`, in document order.
pub fn fragments(tree: &SyntaxTree, tags: &[&str]) -> Vec<Fragment> {
    tree.query(NodeKind::ExtInner)
        .filter_map(|inner| {
            let tag = inner.parent()?.name()?;
            if !tags.contains(&tag) || inner.text().trim().is_empty() {
                return None;
            }
            Some(Fragment {
                tag: tag.to_string(),
                start: inner.start(),
                text: inner.text().to_string(),
            })
        })
        .collect()
}

/// Syntax errors in JSON payloads.
pub fn json_diagnostics(document: &TextDocument, tree: &SyntaxTree) -> Vec<Diagnostic> {
    fragments(tree, JSON_TAGS)
        .into_iter()
        .filter_map(|fragment| {
            let err = serde_json::from_str::<serde_json::Value>(&fragment.text).err()?;
            let offset = fragment.offset(err.line(), err.column());
            let message = err.to_string();
            let message = message
                .rsplit_once(" at line ")
                .map_or(message.as_str(), |(head, _)| head)
                .to_string();
            Some(fragment.diagnostic(document, offset, DiagnosticSeverity::ERROR, "json", message))
        })
        .collect()
}

/// Diagnostics from the external TeX and LilyPond validators configured in `linter`.
pub async fn external_diagnostics(
    document: &TextDocument,
    tree: &SyntaxTree,
    linter: &LinterSettings,
    warnings: bool,
) -> Vec<Diagnostic> {
    let mut jobs = Vec::new();
    if !linter.mathjax.is_empty() {
        jobs.extend(
            fragments(tree, TEX_TAGS)
                .into_iter()
                .map(|fragment| (linter.mathjax.as_str(), "MathJax", fragment)),
        );
    }
    if !linter.lilypond.is_empty() {
        jobs.extend(
            fragments(tree, SCORE_TAGS)
                .into_iter()
                .map(|fragment| (linter.lilypond.as_str(), "LilyPond", fragment)),
        );
    }
    let mut diagnostics = Vec::new();
    for (program, source, fragment) in jobs {
        if let Some(stderr) = run_validator(program, &fragment).await {
            diagnostics.extend(parse_report(document, &fragment, &stderr, source, warnings));
        }
    }
    diagnostics
}

async fn run_validator(program: &str, fragment: &Fragment) -> Option<String> {
    let mut child = Command::new(program)
        .arg(&fragment.tag)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| warn!(program, error = %err, "failed to start validator"))
        .ok()?;
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(err) = stdin.write_all(fragment.text.as_bytes()).await {
            debug!(program, error = %err, "validator closed its input early");
        }
    }
    match tokio::time::timeout(VALIDATOR_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        Ok(Err(err)) => {
            warn!(program, error = %err, "validator failed");
            None
        }
        Err(_) => {
            warn!(program, "validator timed out");
            None
        }
    }
}

/// Diagnostics from a validator's stderr. Lines in any other shape are ignored.
pub fn parse_report(
    document: &TextDocument,
    fragment: &Fragment,
    stderr: &str,
    source: &str,
    warnings: bool,
) -> Vec<Diagnostic> {
    REPORT_LINE
        .captures_iter(stderr)
        .filter_map(|caps| {
            let line: usize = caps[1].parse().ok()?;
            let column: usize = caps[2].parse().ok()?;
            let severity = match &caps[3] {
                "error" => DiagnosticSeverity::ERROR,
                _ if warnings => DiagnosticSeverity::WARNING,
                _ => return None,
            };
            let offset = fragment.offset(line, column);
            Some(fragment.diagnostic(document, offset, severity, source, caps[4].to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{parsed, range};

    #[test]
    fn json_syntax_errors() {
        let (document, tree) = parsed("<templatedata>{\"d\":}</templatedata>\n<graph>{}</graph><maplink> </maplink>");
        let diagnostics = json_diagnostics(&document, &tree);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range, range(0, 19, 0, 20));
        assert_eq!(diagnostics[0].source.as_deref(), Some("json"));
        assert_eq!(diagnostics[0].message, "expected value");
    }

    #[test]
    fn fragments_follow_the_tag_list() {
        let (_, tree) = parsed("<math>a</math><chem>b</chem><score>c</score><math/>");
        let tags: Vec<_> = fragments(&tree, TEX_TAGS)
            .into_iter()
            .map(|fragment| (fragment.tag, fragment.start))
            .collect();
        assert_eq!(tags, vec![("math".to_string(), 6), ("chem".to_string(), 20)]);
    }

    #[test]
    fn validator_reports_map_into_the_fragment() {
        let (document, tree) = parsed("x\n<score>\\relative {\n  c4 d</score>");
        let fragment = fragments(&tree, SCORE_TAGS).remove(0);
        let stderr = "\
Processing `-'
-:2:3: error: unknown note
-:1:1: warning: no version statement
GNU LilyPond 2.24
";
        let diagnostics = parse_report(&document, &fragment, stderr, "LilyPond", false);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range, range(2, 2, 2, 3));
        assert_eq!(diagnostics[0].message, "unknown note");
        assert_eq!(diagnostics[0].source.as_deref(), Some("LilyPond"));

        let diagnostics = parse_report(&document, &fragment, stderr, "LilyPond", true);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[1].range, range(1, 7, 1, 8));
        assert_eq!(diagnostics[1].severity, Some(DiagnosticSeverity::WARNING));
    }

    #[tokio::test]
    async fn missing_validators_contribute_nothing() {
        let (document, tree) = parsed("<math>\\frac</math>");
        let linter = LinterSettings {
            enable: true,
            severity: wikitext_config::Severity::ErrorsOnly,
            lilypond: String::new(),
            mathjax: "/nonexistent/wikitext-tex-validator".to_string(),
        };
        assert!(external_diagnostics(&document, &tree, &linter, true)
            .await
            .is_empty());
    }
}
