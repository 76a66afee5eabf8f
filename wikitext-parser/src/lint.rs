//! Lint rules over a parsed document
//!
//!     Every rule looks at the finished tree only; nothing here reparses. Problems carry byte
//!     ranges into the source, an optional automatic fix and any number of suggestions. A fix
//!     is safe to apply without review, a suggestion is not.

use serde::Serialize;

use crate::parser::PARSED_EXT;
use crate::tree::{Node, NodeKind, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Error,
    Warning,
}

/// A text replacement over a byte range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fix {
    pub range: (usize, usize),
    pub text: String,
    pub desc: String,
}

impl Fix {
    fn new(start: usize, end: usize, text: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            range: (start, end),
            text: text.into(),
            desc: desc.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintError {
    pub rule: &'static str,
    pub severity: LintSeverity,
    pub message: String,
    pub start: usize,
    pub end: usize,
    pub fix: Option<Fix>,
    pub suggestions: Vec<Fix>,
}

impl LintError {
    fn new(
        rule: &'static str,
        severity: LintSeverity,
        message: impl Into<String>,
        node: Node<'_>,
    ) -> Self {
        Self::at(rule, severity, message, node.start(), node.end())
    }

    fn at(
        rule: &'static str,
        severity: LintSeverity,
        message: impl Into<String>,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            rule,
            severity,
            message: message.into(),
            start,
            end,
            fix: None,
            suggestions: Vec::new(),
        }
    }

    fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }

    fn suggest(mut self, fix: Fix) -> Self {
        self.suggestions.push(fix);
        self
    }
}

const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr", "meta", "link"];
const OPTIONAL_END: &[&str] = &[
    "p", "li", "dt", "dd", "tr", "td", "th", "tbody", "thead", "tfoot", "rt", "rp",
];
const OBSOLETE_TAGS: &[&str] = &["big", "center", "font", "strike", "tt"];

impl SyntaxTree {
    /// Run every lint rule and return the problems sorted by position.
    pub fn lint(&self) -> Vec<LintError> {
        let mut errors = Vec::new();
        lonely_brackets(self, &mut errors);
        unmatched_tags(self, &mut errors);
        unclosed_comments(self, &mut errors);
        h1(self, &mut errors);
        duplicated_parameters(self, &mut errors);
        obsolete_tags(self, &mut errors);
        invalid_isbn(self, &mut errors);
        errors.sort_by_key(|error| (error.start, error.end));
        errors
    }
}

fn is_opaque(node: Node<'_>) -> bool {
    node.ancestors().any(|ancestor| {
        ancestor.is(NodeKind::AttrValue)
            || (ancestor.is(NodeKind::ExtInner)
                && !ancestor.name().is_some_and(|name| PARSED_EXT.contains(&name)))
    })
}

fn lonely_brackets(tree: &SyntaxTree, errors: &mut Vec<LintError>) {
    for text in tree.query(NodeKind::Text) {
        if is_opaque(text) {
            continue;
        }
        let after_free_link = text
            .index()
            .checked_sub(1)
            .and_then(|prev| text.parent()?.child(prev))
            .filter(|prev| prev.is(NodeKind::FreeExtLink));
        for (pos, byte) in text.text().bytes().enumerate() {
            let bracket = match byte {
                b'[' => "[",
                b']' => "]",
                _ => continue,
            };
            let start = text.start() + pos;
            let message = format!("lonely \"{bracket}\"");
            match after_free_link {
                Some(link) if pos == 0 && bracket == "]" => errors.push(
                    LintError::at("lonely-bracket", LintSeverity::Error, message, start, start + 1)
                        .suggest(Fix::new(link.start(), link.start(), "[", "left bracket")),
                ),
                _ => errors.push(LintError::at(
                    "lonely-bracket",
                    LintSeverity::Warning,
                    message,
                    start,
                    start + 1,
                )),
            }
        }
    }
}

fn unmatched_tags(tree: &SyntaxTree, errors: &mut Vec<LintError>) {
    for ext in tree.query(NodeKind::Ext).filter(|ext| !ext.is_closed()) {
        let name = ext.name().unwrap_or_default();
        errors.push(
            LintError::new("unmatched-tag", LintSeverity::Error, format!("unclosed <{name}>"), ext)
                .suggest(Fix::new(ext.end() - 1, ext.end(), "/>", "self-close")),
        );
    }

    let mut open: Vec<Node<'_>> = Vec::new();
    for tag in tree.query(NodeKind::Html) {
        let name = tag.name().unwrap_or_default();
        let void = VOID_TAGS.contains(&name);
        if tag.is_closing() && (void || tag.is_selfclosing()) {
            errors.push(
                LintError::new(
                    "unmatched-tag",
                    LintSeverity::Warning,
                    "tag that is both closing and self-closing",
                    tag,
                )
                .with_fix(Fix::new(tag.start() + 1, tag.start() + 2, "", "open")),
            );
            continue;
        }
        if void || tag.is_selfclosing() {
            continue;
        }
        if !tag.is_closing() {
            open.push(tag);
            continue;
        }
        match open.iter().rposition(|candidate| candidate.name() == Some(name)) {
            Some(idx) => {
                open.remove(idx);
            }
            None => errors.push(
                LintError::new("unmatched-tag", LintSeverity::Error, "unmatched closing tag", tag)
                    .suggest(Fix::new(tag.start(), tag.end(), "", "remove")),
            ),
        }
    }
    for tag in open {
        if OPTIONAL_END.contains(&tag.name().unwrap_or_default()) {
            continue;
        }
        errors.push(LintError::new(
            "unmatched-tag",
            LintSeverity::Warning,
            "unclosed tag",
            tag,
        ));
    }
}

fn unclosed_comments(tree: &SyntaxTree, errors: &mut Vec<LintError>) {
    for comment in tree.query(NodeKind::Comment).filter(|c| !c.is_closed()) {
        errors.push(
            LintError::new(
                "unclosed-comment",
                LintSeverity::Error,
                "unclosed HTML comment",
                comment,
            )
            .with_fix(Fix::new(comment.end(), comment.end(), "-->", "close")),
        );
    }
}

fn h1(tree: &SyntaxTree, errors: &mut Vec<LintError>) {
    for heading in tree.query(NodeKind::Heading).filter(|h| h.level() == 1) {
        errors.push(
            LintError::new("h1", LintSeverity::Warning, "<h1>", heading).suggest(Fix::new(
                heading.start(),
                heading.end(),
                format!("={}=", heading.text()),
                "h2",
            )),
        );
    }
}

fn duplicated_parameters(tree: &SyntaxTree, errors: &mut Vec<LintError>) {
    for template in tree.query(NodeKind::Template) {
        let mut seen: Vec<&str> = Vec::new();
        for param in template.children().filter(|c| c.is(NodeKind::Parameter)) {
            let Some(key) = param.name() else { continue };
            if !seen.contains(&key) {
                seen.push(key);
                continue;
            }
            errors.push(
                LintError::new(
                    "duplicated-parameter",
                    LintSeverity::Error,
                    "duplicated parameter",
                    param,
                )
                .suggest(Fix::new(param.start() - 1, param.end(), "", "remove")),
            );
        }
    }
}

fn obsolete_tags(tree: &SyntaxTree, errors: &mut Vec<LintError>) {
    for tag in tree.query(NodeKind::Html) {
        if OBSOLETE_TAGS.contains(&tag.name().unwrap_or_default()) {
            errors.push(LintError::new(
                "obsolete-tag",
                LintSeverity::Warning,
                "obsolete HTML tag",
                tag,
            ));
        }
    }
}

fn isbn_checksum(digits: &[u32]) -> bool {
    match digits.len() {
        10 => {
            let sum: u32 = digits
                .iter()
                .enumerate()
                .map(|(i, d)| (10 - i as u32) * d)
                .sum();
            sum % 11 == 0
        }
        13 => {
            let sum: u32 = digits
                .iter()
                .enumerate()
                .map(|(i, d)| if i % 2 == 0 { *d } else { 3 * d })
                .sum();
            sum % 10 == 0
        }
        _ => false,
    }
}

fn invalid_isbn(tree: &SyntaxTree, errors: &mut Vec<LintError>) {
    for link in tree.query(NodeKind::MagicLink) {
        if link.name() != Some("ISBN") {
            continue;
        }
        let digits: Vec<u32> = link.text()[4..]
            .chars()
            .filter_map(|c| match c {
                'X' | 'x' => Some(10),
                c => c.to_digit(10),
            })
            .collect();
        if !isbn_checksum(&digits) {
            errors.push(LintError::new(
                "invalid-isbn",
                LintSeverity::Error,
                "invalid ISBN",
                link,
            ));
        }
    }
}
