use tower_lsp::lsp_types::{Position, Range, Url};
use wikitext_parser::{Parser, SyntaxTree, WikitextParser};

use crate::document::TextDocument;

pub(crate) const SAMPLE: &str = "== Intro ==
{{Infobox|name=Sample|1=x}}
<ref name=a>cite</ref>
=== Detail ===
[[Help:Links|links]] {{{1|}}}
";

pub(crate) fn sample_uri() -> Url {
    Url::parse("file:///sample.wiki").expect("valid sample uri")
}

pub(crate) fn parsed(text: &str) -> (TextDocument, SyntaxTree) {
    let document = TextDocument::new(sample_uri(), 1, text);
    let tree = WikitextParser::default()
        .parse(text)
        .expect("failed to parse sample wikitext");
    (document, tree)
}

pub(crate) fn range(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Range {
    Range::new(
        Position::new(start_line, start_col),
        Position::new(end_line, end_col),
    )
}
