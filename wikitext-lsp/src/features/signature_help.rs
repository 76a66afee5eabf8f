//! Signature help for parser functions.
//!
//! The current line is cut at the cursor, extended up to the next brace or tag and closed
//! with `}}`. That snippet is parsed on the document's secondary task so the magic word
//! being typed is always complete, however broken the rest of the document is.

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{
    Documentation, ParameterInformation, ParameterLabel, Position, SignatureHelp,
    SignatureInformation,
};
use wikitext_parser::{NodeKind, SyntaxTree};

use crate::document::TextDocument;
use crate::features::magic_words::{self, SignatureParameter};
use crate::position::offset_at;

static REST_OF_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^{}<]*").unwrap());

/// Snippet to parse for a signature request, and the cursor's byte offset within it.
pub fn signature_snippet(document: &TextDocument, position: Position) -> (String, usize) {
    let line = document.line(position.line as usize);
    let line_start = offset_at(document, Position::new(position.line, 0));
    let cursor = (offset_at(document, position) - line_start).min(line.len());
    let (before, after) = line.split_at(cursor);
    let rest = REST_OF_CALL.find(after).map_or("", |m| m.as_str());
    (format!("{before}{rest}}}}}"), cursor)
}

/// Signatures of the magic word closing `snippet`.
///
/// The overall active parameter counts every argument typed so far; each signature clamps
/// it to its own parameter list when it takes fewer parameters than were typed.
pub fn compute_signature_help(snippet: &SyntaxTree, cursor: usize) -> Option<SignatureHelp> {
    let call = snippet.root().last_child()?;
    if !call.is(NodeKind::MagicWord) {
        return None;
    }
    let signatures = magic_words::magic_word(call.name()?)?.signatures.as_ref()?;
    let written = call.first_child()?.text().trim();
    let typed = call.child_count() - 1;
    let active = call
        .children()
        .rposition(|child| child.start() <= cursor)
        .and_then(|idx| idx.checked_sub(1));

    let signatures = signatures
        .iter()
        .filter(|params| {
            params.len() >= typed || params.last().is_some_and(|param| param.rest)
        })
        .filter(|params| {
            params.iter().enumerate().all(|(idx, param)| {
                if !param.constant || idx >= typed {
                    return true;
                }
                let value = call.child(idx + 1).map_or("", |child| child.text().trim());
                value.is_empty()
                    || param.label.starts_with(value)
                    || param.label.starts_with(&value.to_lowercase())
            })
        })
        .map(|params| signature(written, params, typed, active))
        .collect();

    Some(SignatureHelp {
        signatures,
        active_signature: None,
        active_parameter: active.map(|idx| idx as u32),
    })
}

fn signature(
    written: &str,
    params: &[SignatureParameter],
    typed: usize,
    active: Option<usize>,
) -> SignatureInformation {
    let labels: Vec<&str> = params.iter().map(|param| param.label.as_str()).collect();
    let colon = if params.is_empty() { "" } else { ":" };
    let active_parameter = if params.len() < typed {
        active.map(|idx| idx.min(params.len().saturating_sub(1)) as u32)
    } else {
        None
    };
    SignatureInformation {
        label: format!("{{{{{written}{colon}{}}}}}", labels.join("|")),
        documentation: None,
        parameters: Some(
            params
                .iter()
                .map(|param| ParameterInformation {
                    label: ParameterLabel::Simple(param.label.clone()),
                    documentation: param
                        .constant
                        .then(|| Documentation::String("Predefined parameter".to_string())),
                })
                .collect(),
        ),
        active_parameter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::parsed;
    use wikitext_parser::{Parser, WikitextParser};

    const TEXT: &str = "
{{ #invoke: a | b | c | d }}
{{ PAGENAME: }}
{{ PAGESIZE: a | R }}
";

    fn help_at(line: u32, character: u32) -> Option<SignatureHelp> {
        let (document, _) = parsed(TEXT);
        let (snippet, cursor) = signature_snippet(&document, Position::new(line, character));
        let tree = WikitextParser::default().parse(&snippet).unwrap();
        compute_signature_help(&tree, cursor)
    }

    fn labels(help: &SignatureHelp) -> Vec<(String, Option<u32>)> {
        help.signatures
            .iter()
            .map(|sig| (sig.label.clone(), sig.active_parameter))
            .collect()
    }

    #[test]
    fn snippet_closes_the_call() {
        let (document, _) = parsed(TEXT);
        assert_eq!(
            signature_snippet(&document, Position::new(3, 13)),
            ("{{ PAGESIZE: a | R }}".to_string(), 13)
        );
        assert_eq!(
            signature_snippet(&document, Position::new(2, 2)),
            ("{{ PAGENAME: }}".to_string(), 2)
        );
    }

    #[test]
    fn invoke_clamps_to_the_rest_parameter() {
        for (character, overall, own) in [(12, 0, 0), (16, 1, 1), (25, 3, 2)] {
            let help = help_at(1, character).unwrap();
            assert_eq!(help.active_parameter, Some(overall));
            assert_eq!(
                labels(&help),
                vec![(
                    "{{#invoke:module name|function name|args}}".to_string(),
                    Some(own)
                )]
            );
        }
    }

    #[test]
    fn cursor_on_the_name_has_no_active_parameter() {
        let help = help_at(2, 2).unwrap();
        assert_eq!(help.active_parameter, None);
        assert_eq!(
            labels(&help),
            vec![("{{PAGENAME:page name}}".to_string(), None)]
        );
    }

    #[test]
    fn constant_parameters_filter_signatures() {
        for (character, active) in [(13, 0), (17, 1)] {
            let help = help_at(3, character).unwrap();
            assert_eq!(help.active_parameter, Some(active));
            assert_eq!(
                labels(&help),
                vec![("{{PAGESIZE:page name|R}}".to_string(), None)]
            );
            let params = help.signatures[0].parameters.as_ref().unwrap();
            assert_eq!(params[0].documentation, None);
            assert_eq!(
                params[1].documentation,
                Some(Documentation::String("Predefined parameter".to_string()))
            );
        }
    }

    #[test]
    fn templates_have_no_signature() {
        let tree = WikitextParser::default().parse("{{ a | b }}").unwrap();
        assert!(compute_signature_help(&tree, 5).is_none());
    }
}
