use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};
use wikitext_parser::{NodeKind, SyntaxTree};

use crate::document::TextDocument;
use crate::features::magic_words;
use crate::position::{element_from_position, node_range};

pub fn compute_hover(
    document: &TextDocument,
    tree: &SyntaxTree,
    position: Position,
) -> Option<Hover> {
    let node = element_from_position(document, tree, position);
    let value = match node.kind() {
        NodeKind::DoubleUnderscore => magic_words::behavior_switch(node.name()?)?
            .description
            .clone(),
        NodeKind::MagicWordName => {
            let info = magic_words::magic_word(node.parent()?.name()?)?;
            magic_words::render(info, node.text().trim())
        }
        _ => return None,
    };
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(node_range(document, node)),
    })
}
