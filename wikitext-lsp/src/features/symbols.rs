//! Section outline built from headings.

use std::collections::HashSet;

use tower_lsp::lsp_types::{DocumentSymbol, Position, Range, SymbolKind};
use wikitext_parser::{Node, NodeKind, SyntaxTree};

use crate::document::TextDocument;
use crate::position::{node_range, position_at};

struct Section {
    name: String,
    range: Range,
    selection_range: Range,
    parent: Option<usize>,
}

/// Nested sections. Repeated titles get a `_2`, `_3`, ... suffix so every name is unique.
pub fn collect_document_symbols(document: &TextDocument, tree: &SyntaxTree) -> Vec<DocumentSymbol> {
    let headings: Vec<Node<'_>> = tree.query(NodeKind::Heading).collect();
    let last_line = document.line_count().saturating_sub(1) as u32;
    let mut names = HashSet::new();
    let mut open: [Option<usize>; 6] = [None; 6];
    let mut sections = Vec::with_capacity(headings.len());

    for (idx, heading) in headings.iter().enumerate() {
        let level = heading.level().clamp(1, 6);
        let slot = usize::from(level) - 1;
        let name = unique_name(&mut names, heading.name().unwrap_or_default());
        let start = position_at(document, heading.start());
        let end_line = headings[idx + 1..]
            .iter()
            .find(|next| next.level() <= level)
            .map_or(last_line, |next| {
                position_at(document, next.start()).line.saturating_sub(1)
            });
        let parent = open[..slot].iter().rev().find_map(|entry| *entry);
        open[slot] = Some(idx);
        for deeper in open.iter_mut().skip(slot + 1) {
            *deeper = None;
        }
        sections.push(Section {
            name,
            range: Range::new(start, Position::new(end_line, 0)),
            selection_range: node_range(document, *heading),
            parent,
        });
    }
    assemble(sections)
}

fn unique_name(names: &mut HashSet<String>, title: &str) -> String {
    let title = if title.is_empty() { " " } else { title };
    let name = if names.contains(title) {
        (2..)
            .map(|n| format!("{}_{n}", title.trim()))
            .find(|candidate| !names.contains(candidate))
            .unwrap_or_default()
    } else {
        title.to_string()
    };
    names.insert(name.clone());
    name
}

// Parents always precede their children, so folding from the back attaches every
// section before its parent is converted.
#[allow(deprecated)]
fn assemble(sections: Vec<Section>) -> Vec<DocumentSymbol> {
    let mut children: Vec<Vec<DocumentSymbol>> = sections.iter().map(|_| Vec::new()).collect();
    let mut roots = Vec::new();
    for (idx, section) in sections.into_iter().enumerate().rev() {
        let kids = std::mem::take(&mut children[idx]);
        let symbol = DocumentSymbol {
            name: section.name,
            detail: None,
            kind: SymbolKind::STRING,
            tags: None,
            deprecated: None,
            range: section.range,
            selection_range: section.selection_range,
            children: if kids.is_empty() { None } else { Some(kids) },
        };
        match section.parent {
            Some(parent) => children[parent].insert(0, symbol),
            None => roots.insert(0, symbol),
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::folding_ranges::tests::SECTIONS;
    use crate::features::test_support::{parsed, range};

    fn outline(symbols: &[DocumentSymbol]) -> Vec<(String, Range, Range, usize)> {
        let mut out = Vec::new();
        for symbol in symbols {
            let children = symbol.children.as_deref().unwrap_or_default();
            out.push((
                symbol.name.clone(),
                symbol.range,
                symbol.selection_range,
                children.len(),
            ));
            out.extend(outline(children));
        }
        out
    }

    #[test]
    fn nests_sections_by_level() {
        let (document, tree) = parsed(SECTIONS);
        let symbols = collect_document_symbols(&document, &tree);
        assert_eq!(symbols.len(), 2);
        assert_eq!(
            outline(&symbols),
            vec![
                ("1".to_string(), range(3, 3, 22, 0), range(3, 3, 3, 8), 2),
                ("2".to_string(), range(7, 8, 19, 0), range(7, 8, 7, 15), 1),
                ("3".to_string(), range(11, 0, 19, 0), range(11, 0, 11, 13), 1),
                ("4_2".to_string(), range(16, 0, 19, 0), range(16, 0, 17, 11), 0),
                ("4".to_string(), range(20, 0, 22, 0), range(20, 0, 20, 7), 0),
                ("4_3".to_string(), range(23, 0, 30, 0), range(23, 0, 23, 5), 1),
                ("4_4".to_string(), range(27, 0, 30, 0), range(27, 0, 27, 9), 0),
            ]
        );
        assert!(symbols[0].children.as_ref().unwrap()[1].children.is_none());
        assert_eq!(symbols[0].kind, SymbolKind::STRING);
    }

    #[test]
    fn blank_titles_get_a_placeholder() {
        let (document, tree) = parsed("== ==\n==  ==");
        let names: Vec<_> = collect_document_symbols(&document, &tree)
            .into_iter()
            .map(|symbol| symbol.name)
            .collect();
        assert_eq!(names, vec![" ", "_2"]);
    }
}
