use tower_lsp::lsp_types::{InlayHint, InlayHintKind, InlayHintLabel};
use wikitext_parser::{Node, NodeKind, SyntaxTree};

use crate::document::TextDocument;
use crate::position::position_at;

/// Implicit `N=` keys in front of anonymous template parameters and `#invoke` arguments.
pub fn collect_inlay_hints(document: &TextDocument, tree: &SyntaxTree) -> Vec<InlayHint> {
    tree.query(NodeKind::Parameter)
        .filter(|param| param.is_anonymous() && takes_implicit_key(*param))
        .filter_map(|param| {
            Some(InlayHint {
                position: position_at(document, param.start()),
                label: InlayHintLabel::String(format!("{}=", param.name()?)),
                kind: Some(InlayHintKind::PARAMETER),
                text_edits: None,
                tooltip: None,
                padding_left: None,
                padding_right: None,
                data: None,
            })
        })
        .collect()
}

fn takes_implicit_key(param: Node<'_>) -> bool {
    let Some(parent) = param.parent() else {
        return false;
    };
    match parent.kind() {
        NodeKind::Template => true,
        // module and function name come first
        NodeKind::MagicWord => parent.name() == Some("#invoke") && param.index() > 2,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::parsed;
    use tower_lsp::lsp_types::Position;

    fn hints(text: &str) -> Vec<(Position, String)> {
        let (document, tree) = parsed(text);
        collect_inlay_hints(&document, &tree)
            .into_iter()
            .map(|hint| {
                assert_eq!(hint.kind, Some(InlayHintKind::PARAMETER));
                let InlayHintLabel::String(label) = hint.label else {
                    panic!("expected a plain label");
                };
                (hint.position, label)
            })
            .collect()
    }

    #[test]
    fn template() {
        assert_eq!(
            hints("{{a|b=|c}}"),
            vec![(Position::new(0, 7), "1=".to_string())]
        );
    }

    #[test]
    fn module() {
        assert_eq!(
            hints("{{#invoke:a|b|c}}"),
            vec![(Position::new(0, 14), "1=".to_string())]
        );
    }

    #[test]
    fn other_parser_functions_have_no_hints() {
        assert!(hints("{{#if:a|b|c}}\n{{PAGENAME}}").is_empty());
    }
}
