//! Conversion between LSP positions and parser offsets
//!
//!     LSP positions are (line, UTF-16 code unit) pairs. The parser works in byte offsets into
//!     the UTF-8 source. Everything that crosses that boundary goes through this module.
//!
//!     Lines are split on `\n` only. A `\r` before it is ordinary content, so it occupies one
//!     column at the end of the line. Out-of-range positions are clamped: a line past the end
//!     maps to the end of the document, a column past the end of its line to the line end.

use tower_lsp::lsp_types::{Position, Range};
use wikitext_parser::{Node, NodeKind, SyntaxTree};

use crate::document::TextDocument;

/// Word characters in the sense of a Unicode `\w`.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte offset of `position`, clamped into the document.
pub fn offset_at(doc: &TextDocument, position: Position) -> usize {
    let line = position.line as usize;
    let Some(&start) = doc.line_starts().get(line) else {
        return doc.text().len();
    };
    let text = doc.line(line);
    let wanted = position.character as usize;
    let mut units = 0;
    for (idx, c) in text.char_indices() {
        if units >= wanted {
            return start + idx;
        }
        units += c.len_utf16();
    }
    start + text.len()
}

/// LSP position of the byte `offset`, clamped into the document. Offsets inside a
/// multi-byte character resolve to that character's start.
pub fn position_at(doc: &TextDocument, offset: usize) -> Position {
    let text = doc.text();
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let starts = doc.line_starts();
    let line = starts.partition_point(|start| *start <= offset) - 1;
    let character: usize = text[starts[line]..offset].encode_utf16().count();
    Position::new(line as u32, character as u32)
}

pub fn range_from_offsets(doc: &TextDocument, start: usize, end: usize) -> Range {
    Range::new(position_at(doc, start), position_at(doc, end))
}

pub fn node_range(doc: &TextDocument, node: Node<'_>) -> Range {
    range_from_offsets(doc, node.start(), node.end())
}

/// Range covering the whole document.
pub fn document_range(doc: &TextDocument) -> Range {
    range_from_offsets(doc, 0, doc.text().len())
}

/// Deepest node under the cursor.
///
/// The cursor is first moved past the character after it when that character belongs to a
/// word, then the tree is descended through the child whose span satisfies
/// `start < offset <= end`. Between two siblings the earlier one therefore wins unless the
/// cursor touches a word of the later one. Text leaves are never returned: the node that
/// owns the text under the cursor is.
pub fn element_from_position<'a>(
    doc: &TextDocument,
    tree: &'a SyntaxTree,
    position: Position,
) -> Node<'a> {
    let mut offset = offset_at(doc, position);
    if let Some(next) = doc.text()[offset..].chars().next() {
        if is_word_char(next) {
            offset += next.len_utf8();
        }
    }
    element_at(tree, offset)
}

pub(crate) fn element_at(tree: &SyntaxTree, offset: usize) -> Node<'_> {
    let mut node = tree.root();
    while let Some(child) = node
        .children()
        .find(|child| child.start() < offset && offset <= child.end())
    {
        if child.is(NodeKind::Text) {
            break;
        }
        node = child;
    }
    node
}

/// Word characters immediately before the cursor on its line.
pub fn word_prefix(doc: &TextDocument, position: Position) -> &str {
    let offset = offset_at(doc, position);
    let line_start = offset_at(doc, Position::new(position.line, 0));
    let before = &doc.text()[line_start..offset];
    let start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map_or(before.len(), |(idx, _)| idx);
    &before[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tower_lsp::lsp_types::Url;
    use wikitext_parser::{Parser, WikitextParser};

    fn doc(text: &str) -> TextDocument {
        TextDocument::new(Url::parse("file:///a.wiki").unwrap(), 1, text)
    }

    #[test]
    fn counts_utf16_columns() {
        let doc = doc("a𝄞b\r\nc");
        assert_eq!(position_at(&doc, 5), Position::new(0, 3));
        assert_eq!(offset_at(&doc, Position::new(0, 3)), 5);
        // inside the surrogate pair
        assert_eq!(position_at(&doc, 3), Position::new(0, 1));
        assert_eq!(position_at(&doc, 6), Position::new(0, 4));
        assert_eq!(position_at(&doc, 9), Position::new(1, 1));
    }

    #[test]
    fn clamps_out_of_range_positions() {
        let doc = doc("ab\ncd");
        assert_eq!(offset_at(&doc, Position::new(0, 9)), 2);
        assert_eq!(offset_at(&doc, Position::new(5, 0)), 5);
        assert_eq!(position_at(&doc, 99), Position::new(1, 2));
        assert_eq!(document_range(&doc).end, Position::new(1, 2));
    }

    #[test]
    fn element_lookup_prefers_the_following_word() {
        let text = "{{a}}{{b}}";
        let doc = doc(text);
        let tree = WikitextParser::default().parse(text).unwrap();
        // between the two templates, followed by `{`
        let node = element_from_position(&doc, &tree, Position::new(0, 5));
        assert_eq!(node.name(), Some("Template:A"));
        // right before `b`
        let node = element_from_position(&doc, &tree, Position::new(0, 7));
        assert_eq!(node.kind(), NodeKind::TemplateName);
        assert_eq!(node.text(), "b");
    }

    #[test]
    fn word_prefix_stops_at_punctuation() {
        let doc = doc("x {{#inv\n__no");
        assert_eq!(word_prefix(&doc, Position::new(0, 8)), "inv");
        assert_eq!(word_prefix(&doc, Position::new(1, 4)), "__no");
        assert_eq!(word_prefix(&doc, Position::new(0, 2)), "");
    }

    proptest! {
        #[test]
        fn offsets_round_trip(text in "[a-z\n\ré𝄞 ]{0,40}", pick in 0usize..64) {
            let doc = doc(&text);
            let boundaries: Vec<usize> = (0..=text.len())
                .filter(|i| text.is_char_boundary(*i))
                .collect();
            let offset = boundaries[pick % boundaries.len()];
            prop_assert_eq!(offset_at(&doc, position_at(&doc, offset)), offset);
        }
    }
}
