//! Clickable targets: wiki links, transclusions, modules, files and external URLs.
//!
//! Every candidate is resolved to an absolute URL. Candidates that do not resolve (invalid
//! titles, malformed URLs) are dropped instead of being reported with a broken target.

use tower_lsp::lsp_types::{DocumentLink, Url};
use wikitext_parser::config::{NS_FILE, NS_MAIN, NS_MODULE, NS_SPECIAL, NS_TEMPLATE};
use wikitext_parser::{Node, NodeKind, ParserConfig, SyntaxTree, Title};

use crate::document::TextDocument;
use crate::position::range_from_offsets;

/// Html tags whose `cite` attribute holds a URL.
const CITE_TAGS: &[&str] = &["blockquote", "del", "ins", "q"];

pub fn collect_document_links(
    document: &TextDocument,
    tree: &SyntaxTree,
    config: &ParserConfig,
    article_path: &str,
) -> Vec<DocumentLink> {
    let resolver = Resolver {
        config,
        article_path,
    };
    let mut links = Vec::new();
    for node in tree.nodes() {
        let found = match node.kind() {
            NodeKind::LinkTarget => resolver
                .wiki(&node.plain_text(), NS_MAIN)
                .map(|target| (node.start(), node.end(), target)),
            NodeKind::TemplateName if node.name().is_some() => resolver
                .wiki(&node.plain_text(), NS_TEMPLATE)
                .map(|target| (node.start(), node.end(), target)),
            NodeKind::MagicWord => resolver.magic_word(node),
            NodeKind::MagicLink => resolver
                .magic_link(node)
                .map(|target| (node.start(), node.end(), target)),
            NodeKind::ExtLinkUrl => {
                external(node.text()).map(|target| (node.start(), node.end(), target))
            }
            // attribute values are never autolinked
            NodeKind::FreeExtLink if !node.ancestors().any(|a| a.is(NodeKind::AttrValue)) => {
                external(node.text()).map(|target| (node.start(), node.end(), target))
            }
            NodeKind::AttrValue => resolver.attribute(node),
            NodeKind::ImageParameter if node.name() == Some("link") => resolver.image_link(node),
            _ => None,
        };
        if let Some((start, end, target)) = found {
            links.push(DocumentLink {
                range: range_from_offsets(document, start, end),
                target: Some(target),
                tooltip: None,
                data: None,
            });
        }
    }
    links
}

/// Absolute URL for an external link, upgrading protocol-relative ones to `https:`.
fn external(text: &str) -> Option<Url> {
    let text = text.trim();
    if text.starts_with("//") {
        Url::parse(&format!("https:{text}")).ok()
    } else {
        Url::parse(text).ok()
    }
}

struct Resolver<'a> {
    config: &'a ParserConfig,
    article_path: &'a str,
}

impl Resolver<'_> {
    fn wiki(&self, text: &str, default_ns: i32) -> Option<Url> {
        let title = Title::parse(text, default_ns, self.config)?;
        Url::parse(&title.url(self.article_path)).ok()
    }

    /// Module of `#invoke` and file of `filepath`, both taken from the first argument.
    fn magic_word(&self, node: Node<'_>) -> Option<(usize, usize, Url)> {
        let ns = match node.name()? {
            "#invoke" => NS_MODULE,
            "filepath" => NS_FILE,
            _ => return None,
        };
        let first = node.child(1).filter(|child| child.is(NodeKind::Parameter))?;
        let target = self.wiki(&first.plain_text(), ns)?;
        Some((first.start(), first.end(), target))
    }

    fn magic_link(&self, node: Node<'_>) -> Option<Url> {
        let kind = node.name()?;
        let number: String = node.text()[kind.len()..]
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match kind {
            "RFC" => Url::parse(&format!("https://tools.ietf.org/html/rfc{number}")).ok(),
            "PMID" => Url::parse(&format!("https://pubmed.ncbi.nlm.nih.gov/{number}")).ok(),
            "ISBN" => {
                let special = self.config.namespace_name(NS_SPECIAL).unwrap_or("Special");
                self.wiki(&format!("{special}:BookSources/{number}"), NS_MAIN)
            }
            _ => None,
        }
    }

    fn attribute(&self, value: Node<'_>) -> Option<(usize, usize, Url)> {
        let attr = value.parent()?;
        let tag = attr.parent()?;
        let target = match (tag.kind(), tag.name()?, attr.name()?) {
            (NodeKind::Ext, "templatestyles", "src") => self.wiki(&value.plain_text(), NS_TEMPLATE),
            (NodeKind::Html, name, "cite") if CITE_TAGS.contains(&name) => {
                let text = value.text().trim();
                self.config.protocol_len(text, true)?;
                external(text)
            }
            _ => None,
        }?;
        Some((value.start(), value.end(), target))
    }

    /// `link=` option of a file link: an external URL or a page title.
    fn image_link(&self, param: Node<'_>) -> Option<(usize, usize, Url)> {
        let text = param.text();
        let eq = text.find('=')?;
        let raw = &text[eq + 1..];
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        let start = param.start() + eq + 1 + (raw.len() - raw.trim_start().len());
        let end = start + value.len();
        let target = if self.config.protocol_len(value, true).is_some() {
            external(value)
        } else {
            self.wiki(value, NS_MAIN)
        }?;
        Some((start, end, target))
    }
}
