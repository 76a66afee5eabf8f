//! Folding ranges for sections and multi-line blocks.
//!
//! A section folds from the last line of its heading to the line before the next heading
//! of the same or a higher level. Tables, templates and magic words fold from their first
//! line to their second to last line when they span at least three lines.

use tower_lsp::lsp_types::{FoldingRange, FoldingRangeKind};
use wikitext_parser::{NodeKind, SyntaxTree};

use crate::document::TextDocument;
use crate::position::position_at;

pub fn collect_folding_ranges(document: &TextDocument, tree: &SyntaxTree) -> Vec<FoldingRange> {
    let mut ranges = Vec::new();
    let mut levels: [Option<u32>; 6] = [None; 6];
    let foldable = tree.nodes().filter(|node| {
        matches!(
            node.kind(),
            NodeKind::Heading | NodeKind::Table | NodeKind::Template | NodeKind::MagicWord
        )
    });
    for node in foldable {
        let top = position_at(document, node.start()).line;
        if node.is(NodeKind::Heading) {
            let level = usize::from(node.level().clamp(1, 6));
            for slot in levels.iter_mut().skip(level - 1) {
                if let Some(start) = *slot {
                    if start + 1 < top {
                        ranges.push(region(start, top - 1));
                        *slot = None;
                    }
                }
            }
            let title_lines = node
                .first_child()
                .map_or(1, |title| title.text().split('\n').count()) as u32;
            levels[level - 1] = Some(top + title_lines - 1);
        } else {
            let lines = node.text().split('\n').count() as u32;
            if lines > 2 {
                ranges.push(region(top, top + lines - 2));
            }
        }
    }
    let last_line = document.line_count() as u32 - 1;
    for start in levels.into_iter().flatten() {
        if start < last_line {
            ranges.push(region(start, last_line));
        }
    }
    ranges
}

fn region(start_line: u32, end_line: u32) -> FoldingRange {
    FoldingRange {
        start_line,
        start_character: None,
        end_line,
        end_character: None,
        kind: Some(FoldingRangeKind::Region),
        collapsed_text: None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::test_support::parsed;

    pub(crate) const SECTIONS: &str = "
<!--

-->= 1 =

<!-- -->

<!-- -->== 2 ==



===== 3 ===== <!--

-->

x {{a|
====== 4_<!--
-->2 ======
y }} z

== 4 ==


= 4 =

 : {|
|
=== 4 ===
 |} x

";

    fn lines(ranges: &[FoldingRange]) -> Vec<(u32, u32)> {
        ranges
            .iter()
            .map(|range| (range.start_line, range.end_line))
            .collect()
    }

    #[test]
    fn folds_sections_and_blocks() {
        let (document, tree) = parsed(SECTIONS);
        let ranges = collect_folding_ranges(&document, &tree);
        assert_eq!(
            lines(&ranges),
            vec![
                (15, 17),
                (7, 19),
                (11, 19),
                (17, 19),
                (3, 22),
                (20, 22),
                (25, 27),
                (23, 30),
                (27, 30),
            ]
        );
        assert!(ranges
            .iter()
            .all(|range| range.kind == Some(FoldingRangeKind::Region)));
    }

    #[test]
    fn short_blocks_do_not_fold() {
        let (document, tree) = parsed("{{a|\nb}}\n== x ==");
        assert!(collect_folding_ranges(&document, &tree).is_empty());
    }
}
