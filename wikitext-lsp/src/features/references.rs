//! References, highlights, definitions and renames
//!
//!     The token under the cursor is identified by its kind and a normalized key:
//!
//!         arg-name, template-name, magic-word-name   name of the enclosing construct
//!         link-target                                 page title of the link
//!         parameter-key                               template name plus key
//!         ext, html, image-parameter                  tag or option name
//!         attr-key                                    attribute name
//!         heading, heading-title                      heading level
//!
//!     `<ref>` attribute values are special: a `name`, `extends` or `follow` value refers to
//!     a footnote within its group, and a `group` value of `<ref>` or `<references>` refers
//!     to the group itself. The definition of a footnote name is the body of the `<ref>` that
//!     carries it as `name` and has content.
//!
//!     Only names that can be changed in place are renameable: argument names, template and
//!     magic word names, link targets, non-numeric parameter keys and footnote names and
//!     groups.

use tower_lsp::lsp_types::{DocumentHighlight, DocumentHighlightKind, Position, Range, TextEdit};
use wikitext_parser::{Node, NodeKind, SyntaxTree};

use crate::document::TextDocument;
use crate::position::{element_from_position, node_range};

const REF_NAME_ATTRS: &[&str] = &["name", "extends", "follow"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Key<'a> {
    Named(NodeKind, &'a str),
    Parameter(&'a str, &'a str),
    Heading(u8),
    RefName { group: &'a str, name: &'a str },
    RefGroup(&'a str),
}

/// The identified token: the node under the cursor and what it refers to.
struct Token<'a> {
    node: Node<'a>,
    key: Key<'a>,
}

fn ext_group<'a>(ext: Node<'a>) -> &'a str {
    ext.attribute("group").map_or("", |value| value.text().trim())
}

fn ref_key(value: Node<'_>) -> Option<Key<'_>> {
    if !value.is(NodeKind::AttrValue) {
        return None;
    }
    let attr = value.parent()?;
    let ext = attr.parent().filter(|tag| tag.is(NodeKind::Ext))?;
    let attr_name = attr.name()?;
    let text = value.text().trim();
    match ext.name()? {
        "ref" if REF_NAME_ATTRS.contains(&attr_name) => Some(Key::RefName {
            group: ext_group(ext),
            name: text,
        }),
        "ref" | "references" if attr_name == "group" => Some(Key::RefGroup(text)),
        _ => None,
    }
}

fn key_of(node: Node<'_>) -> Option<Key<'_>> {
    match node.kind() {
        NodeKind::ArgName
        | NodeKind::TemplateName
        | NodeKind::MagicWordName
        | NodeKind::LinkTarget
        | NodeKind::AttrKey => Some(Key::Named(node.kind(), node.parent()?.name()?)),
        NodeKind::Ext | NodeKind::Html | NodeKind::ImageParameter => {
            Some(Key::Named(node.kind(), node.name()?))
        }
        NodeKind::ParameterKey => {
            let param = node.parent()?;
            Some(Key::Parameter(param.parent()?.name()?, param.name()?))
        }
        NodeKind::Heading => Some(Key::Heading(node.level())),
        NodeKind::HeadingTitle => Some(Key::Heading(node.parent()?.level())),
        NodeKind::AttrValue => ref_key(node),
        _ => None,
    }
}

fn token_at<'a>(
    document: &TextDocument,
    tree: &'a SyntaxTree,
    position: Position,
) -> Option<Token<'a>> {
    let node = element_from_position(document, tree, position);
    let key = key_of(node)?;
    Some(Token { node, key })
}

/// Every node sharing the token's key, in document order.
fn matches<'a>(tree: &'a SyntaxTree, token: &Token<'a>) -> impl Iterator<Item = Node<'a>> + 'a {
    let key = token.key.clone();
    let kind = match key {
        Key::Heading(_) => NodeKind::Heading,
        _ => token.node.kind(),
    };
    tree.query(kind)
        .filter(move |node| key_of(*node).is_some_and(|other| same_target(&key, &other)))
}

fn same_target(wanted: &Key<'_>, other: &Key<'_>) -> bool {
    match (wanted, other) {
        // a group value only matches group values, whatever the tag
        (Key::RefGroup(a), Key::RefGroup(b)) => a == b,
        _ => wanted == other,
    }
}

pub fn find_references(
    document: &TextDocument,
    tree: &SyntaxTree,
    position: Position,
) -> Option<Vec<Range>> {
    let token = token_at(document, tree, position)?;
    let ranges: Vec<Range> = matches(tree, &token)
        .map(|node| {
            // a parameter reference covers the whole `key=value`
            let node = if node.is(NodeKind::ParameterKey) {
                node.parent().unwrap_or(node)
            } else {
                node
            };
            node_range(document, node)
        })
        .collect();
    (!ranges.is_empty()).then_some(ranges)
}

pub fn document_highlights(
    document: &TextDocument,
    tree: &SyntaxTree,
    position: Position,
) -> Option<Vec<DocumentHighlight>> {
    let ranges = find_references(document, tree, position)?;
    Some(
        ranges
            .into_iter()
            .map(|range| DocumentHighlight {
                range,
                kind: Some(DocumentHighlightKind::TEXT),
            })
            .collect(),
    )
}

/// Body of the `<ref>` defining the footnote name under the cursor.
pub fn find_definition(
    document: &TextDocument,
    tree: &SyntaxTree,
    position: Position,
) -> Option<Vec<Range>> {
    let token = token_at(document, tree, position)?;
    let Key::RefName { group, name } = token.key else {
        return None;
    };
    let ranges: Vec<Range> = tree
        .query(NodeKind::Ext)
        .filter(|ext| ext.name() == Some("ref") && ext_group(*ext) == group)
        .filter(|ext| ext.attribute("name").is_some_and(|value| value.text().trim() == name))
        .filter_map(|ext| ext.inner().filter(|inner| !inner.is_empty()))
        .map(|inner| node_range(document, inner))
        .collect();
    (!ranges.is_empty()).then_some(ranges)
}

fn renameable(token: &Token<'_>) -> bool {
    match token.node.kind() {
        NodeKind::ArgName | NodeKind::MagicWordName | NodeKind::LinkTarget => true,
        NodeKind::TemplateName => token.node.parent().and_then(|t| t.name()).is_some(),
        NodeKind::ParameterKey => match token.key {
            Key::Parameter(_, key) => !is_numeric_key(key),
            _ => false,
        },
        NodeKind::AttrValue => matches!(token.key, Key::RefName { .. } | Key::RefGroup(_)),
        _ => false,
    }
}

fn is_numeric_key(key: &str) -> bool {
    !key.is_empty() && !key.starts_with('0') && key.bytes().all(|b| b.is_ascii_digit())
}

pub fn prepare_rename(
    document: &TextDocument,
    tree: &SyntaxTree,
    position: Position,
) -> Option<Range> {
    let token = token_at(document, tree, position)?;
    renameable(&token).then(|| node_range(document, token.node))
}

/// Edits replacing every occurrence of the token with `new_name`.
///
/// Link targets are only renamed among links of the same kind, so renaming the target of a
/// file link leaves plain links to the file description page alone.
pub fn rename_edits(
    document: &TextDocument,
    tree: &SyntaxTree,
    position: Position,
    new_name: &str,
) -> Option<Vec<TextEdit>> {
    let token = token_at(document, tree, position)?;
    if !renameable(&token) {
        return None;
    }
    let parent_kind = token.node.parent().map(|parent| parent.kind());
    let edits: Vec<TextEdit> = matches(tree, &token)
        .filter(|node| {
            !node.is(NodeKind::LinkTarget)
                || node.parent().map(|parent| parent.kind()) == parent_kind
        })
        .map(|node| TextEdit {
            range: node_range(document, node),
            new_text: new_name.to_string(),
        })
        .collect();
    (!edits.is_empty()).then_some(edits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{parsed, range};

    fn references(text: &str, character: u32) -> Option<Vec<Range>> {
        let (document, tree) = parsed(text);
        find_references(&document, &tree, Position::new(0, character))
    }

    fn rename(text: &str, character: u32) -> (Option<Range>, Option<Vec<Range>>) {
        let (document, tree) = parsed(text);
        let position = Position::new(0, character);
        let prepared = prepare_rename(&document, &tree, position);
        let edits = rename_edits(&document, &tree, position, "x").map(|edits| {
            assert!(edits.iter().all(|edit| edit.new_text == "x"));
            edits.into_iter().map(|edit| edit.range).collect()
        });
        (prepared, edits)
    }

    const REFS: &str = "<ref group = f name = f > </ref>\n<ref group = \" f \" extends = ' f ' />";
    const GROUPS: &str = "<ref group = f name = f > </ref>\n<ref group = \" f \" extends = ' f ' />\n<references group = f />";

    #[test]
    fn names_of_constructs() {
        assert_eq!(
            references("{{{ a }}}\n{{{a|}}}", 4),
            Some(vec![range(0, 3, 0, 6), range(1, 3, 1, 4)])
        );
        assert_eq!(
            references("{{ b }}\n{{ : template : b |b=}}", 4),
            Some(vec![range(0, 2, 0, 5), range(1, 2, 1, 18)])
        );
        assert_eq!(
            references("{{ PAGENAME }}\n{{PAGENAME:c}}", 4),
            Some(vec![range(0, 2, 0, 12), range(1, 2, 1, 10)])
        );
        assert_eq!(
            references("[[ file : d | thumb ]]\n[[ :file:d ]]", 4),
            Some(vec![range(0, 2, 0, 12), range(1, 2, 1, 11)])
        );
    }

    #[test]
    fn parameter_keys_cover_the_whole_parameter() {
        assert_eq!(
            references("{{ e | e = }}\n{{Template:E|e=}}", 8),
            Some(vec![range(0, 6, 0, 11), range(1, 13, 1, 15)])
        );
    }

    #[test]
    fn tags_attributes_and_options() {
        assert_eq!(
            references(REFS, 4),
            Some(vec![range(0, 0, 0, 32), range(1, 0, 1, 37)])
        );
        assert_eq!(
            references("<b ></b>", 2),
            Some(vec![range(0, 0, 0, 4), range(0, 4, 0, 8)])
        );
        assert_eq!(
            references(GROUPS, 6),
            Some(vec![range(0, 5, 0, 10), range(1, 5, 1, 10), range(2, 12, 2, 17)])
        );
        assert_eq!(
            references("[[ file : d | thumb ]]\n[[file:g|thumbnail]]", 14),
            Some(vec![range(0, 13, 0, 20), range(1, 9, 1, 18)])
        );
    }

    #[test]
    fn headings_match_by_level() {
        for character in [1, 4] {
            assert_eq!(
                references("== h ==\n== i ==\n=== j ===", character),
                Some(vec![range(0, 0, 0, 7), range(1, 0, 1, 7)])
            );
        }
    }

    #[test]
    fn footnote_names_and_groups() {
        assert_eq!(
            references(REFS, 23),
            Some(vec![range(0, 22, 0, 23), range(1, 30, 1, 33)])
        );
        assert_eq!(
            references(GROUPS, 14),
            Some(vec![range(0, 13, 0, 14), range(1, 14, 1, 17), range(2, 20, 2, 21)])
        );
    }

    #[test]
    fn plain_text_has_no_references() {
        assert_eq!(references("abc {{a}}", 1), None);
    }

    #[test]
    fn highlights_mirror_references() {
        let (document, tree) = parsed("<b ></b>");
        let highlights = document_highlights(&document, &tree, Position::new(0, 2)).unwrap();
        assert_eq!(highlights.len(), 2);
        assert!(highlights
            .iter()
            .all(|h| h.kind == Some(DocumentHighlightKind::TEXT)));
    }

    #[test]
    fn definition_is_the_named_body() {
        let text = "<ref group = f name = f > </ref>\n<ref name = f > </ref>\n<ref name = ' f ' />";
        let (document, tree) = parsed(text);
        assert_eq!(
            find_definition(&document, &tree, Position::new(2, 14)),
            Some(vec![range(1, 15, 1, 16)])
        );
        assert_eq!(find_definition(&document, &tree, Position::new(0, 2)), None);
    }

    #[test]
    fn renames() {
        assert_eq!(
            rename("{{{ a }}}\n{{{a|}}}", 4),
            (
                Some(range(0, 3, 0, 6)),
                Some(vec![range(0, 3, 0, 6), range(1, 3, 1, 4)])
            )
        );
        assert_eq!(
            rename("{{ b }}\n{{ : template : b |b=}}", 4),
            (
                Some(range(0, 2, 0, 5)),
                Some(vec![range(0, 2, 0, 5), range(1, 2, 1, 18)])
            )
        );
        assert_eq!(
            rename("[[ :file:d ]]\n[[ file : d | thumb ]]", 4),
            (Some(range(0, 2, 0, 11)), Some(vec![range(0, 2, 0, 11)]))
        );
        assert_eq!(
            rename("{{ e | e = }}\n{{Template:E|e=}}", 8),
            (
                Some(range(0, 6, 0, 9)),
                Some(vec![range(0, 6, 0, 9), range(1, 13, 1, 14)])
            )
        );
    }

    #[test]
    fn footnote_renames_stay_in_their_group() {
        let text = "<ref group = f name = f > </ref>\n<ref group = \" f \" extends = ' f ' /><ref name=f/>";
        assert_eq!(
            rename(text, 23),
            (
                Some(range(0, 22, 0, 23)),
                Some(vec![range(0, 22, 0, 23), range(1, 30, 1, 33)])
            )
        );
        let text = "<ref group = f name = f > </ref>\n<ref group = \" f \" extends = ' f ' /><ref name=f/>\n<references group = f />";
        assert_eq!(
            rename(text, 14),
            (
                Some(range(0, 13, 0, 14)),
                Some(vec![range(0, 13, 0, 14), range(1, 14, 1, 17), range(2, 20, 2, 21)])
            )
        );
    }

    #[test]
    fn some_tokens_cannot_be_renamed() {
        assert_eq!(rename("{{ a | 1 = x }}", 7), (None, None));
        assert_eq!(rename("<b ></b>", 2), (None, None));
        assert_eq!(rename("== h ==", 1), (None, None));
    }
}
