//! Recursive descent over wikitext
//!
//!     The scanner walks the source byte by byte. Every construct starts with an ASCII byte
//!     (`<`, `{`, `[`, `_`, `=`, or a letter for free links), so slicing only ever happens on
//!     char boundaries even though the loop advances one byte at a time.
//!
//!     Constructs that need a terminator (`}}`, `]]`, `-->`) are attempted speculatively. When
//!     the terminator is missing the opening bytes fall back to plain text and scanning resumes
//!     one byte later. Failed attempts are remembered per (offset, construct, limit) so that runs
//!     of unbalanced braces stay polynomial.
//!
//!     Line-oriented constructs (headings, tables) are recognized at the start of a line,
//!     where "start" tolerates preceding comments, and for tables also spaces, tabs and colons.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{ParserConfig, NS_FILE, NS_MAIN, NS_TEMPLATE};
use crate::error::{ParseError, ParseResult};
use crate::title::Title;
use crate::tree::{Draft, NodeKind, SyntaxTree};

/// Deepest construct nesting the scanner follows.
pub const MAX_DEPTH: usize = 256;
/// Largest document accepted, in bytes.
pub const MAX_LEN: usize = 16 * 1024 * 1024;

static MAGIC_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(RFC|PMID)[ \x{a0}]+[0-9]+|(ISBN)[ \x{a0}]+(?:97[89][- ]?)?(?:[0-9][- ]?){9}[0-9Xx])\b",
    )
    .unwrap()
});

/// Extension tags whose body is wikitext rather than opaque data.
pub(crate) const PARSED_EXT: &[&str] = &["ref", "references", "poem", "indicator"];

pub(crate) fn parse(text: &str, config: &ParserConfig) -> ParseResult<SyntaxTree> {
    if text.len() > MAX_LEN {
        return Err(ParseError::TooLarge {
            len: text.len(),
            limit: MAX_LEN,
        });
    }
    let mut scanner = Scanner {
        text,
        bytes: text.as_bytes(),
        config,
        depth: 0,
        failed: HashSet::new(),
    };
    let scan = scanner.scan(0, text.len(), &[])?;
    let root = Draft::new(NodeKind::Root, 0..text.len()).with_children(scan.nodes);
    Ok(SyntaxTree::from_draft(Arc::from(text), root))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Attempt {
    Arg,
    Template,
    Link,
    ExtLink,
}

/// What has been seen since the last line break.
#[derive(Debug, Clone, Copy)]
struct LineState {
    /// Only comments.
    start: bool,
    /// Only comments, spaces, tabs and colons.
    indent: bool,
}

impl LineState {
    fn fresh() -> Self {
        Self {
            start: true,
            indent: true,
        }
    }

    fn inline() -> Self {
        Self {
            start: false,
            indent: false,
        }
    }

    fn advance(&mut self, byte: u8) {
        self.start = false;
        self.indent = self.indent && matches!(byte, b' ' | b'\t' | b':');
    }
}

struct Scan {
    nodes: Vec<Draft>,
    stop: Option<(usize, &'static str)>,
}

struct Segment {
    span: Range<usize>,
    nodes: Vec<Draft>,
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    config: &'a ParserConfig,
    depth: usize,
    failed: HashSet<(usize, Attempt, usize)>,
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

fn push_text(nodes: &mut Vec<Draft>, from: usize, to: usize) {
    if to > from {
        nodes.push(Draft::new(NodeKind::Text, from..to));
    }
}

/// Split `nodes` around the byte `at`, dropping `skip` bytes. The byte must sit inside a
/// text node.
fn split_nodes(nodes: Vec<Draft>, at: usize, skip: usize) -> (Vec<Draft>, Vec<Draft>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    for node in nodes {
        if node.span.end <= at {
            before.push(node);
        } else if node.span.start >= at + skip {
            after.push(node);
        } else {
            push_text(&mut before, node.span.start, at);
            push_text(&mut after, at + skip, node.span.end);
        }
    }
    (before, after)
}

impl<'a> Scanner<'a> {
    fn starts_with(&self, at: usize, limit: usize, pattern: &str) -> bool {
        self.bytes[at..limit].starts_with(pattern.as_bytes())
    }

    fn find(&self, from: usize, limit: usize, pattern: &str) -> Option<usize> {
        let needle = pattern.as_bytes();
        if from >= limit || needle.len() > limit - from {
            return None;
        }
        self.bytes[from..limit]
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|pos| from + pos)
    }

    fn line_end(&self, from: usize, limit: usize) -> usize {
        self.bytes[from..limit]
            .iter()
            .position(|byte| *byte == b'\n')
            .map_or(limit, |pos| from + pos)
    }

    fn word_boundary(&self, at: usize) -> bool {
        at == 0 || {
            let prev = self.bytes[at - 1];
            prev.is_ascii() && !(prev.is_ascii_alphanumeric() || prev == b'_')
        }
    }

    /// Text of `span` with the comment nodes among `nodes` cut out.
    fn plain(&self, span: Range<usize>, nodes: &[Draft]) -> String {
        let mut out = String::with_capacity(span.len());
        let mut cursor = span.start;
        for comment in nodes.iter().filter(|node| node.kind == NodeKind::Comment) {
            if comment.span.start >= cursor && comment.span.end <= span.end {
                out.push_str(&self.text[cursor..comment.span.start]);
                cursor = comment.span.end;
            }
        }
        out.push_str(&self.text[cursor..span.end]);
        out
    }

    /// First occurrence of `byte` inside one of the text nodes.
    fn find_in_text(&self, nodes: &[Draft], byte: u8) -> Option<usize> {
        nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Text)
            .find_map(|node| {
                self.bytes[node.span.clone()]
                    .iter()
                    .position(|b| *b == byte)
                    .map(|pos| node.span.start + pos)
            })
    }

    fn only_text(nodes: &[Draft]) -> bool {
        nodes
            .iter()
            .all(|node| matches!(node.kind, NodeKind::Text | NodeKind::Comment))
    }

    fn nested<T>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                offset,
                limit: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Run a speculative construct, remembering failures.
    fn attempt(
        &mut self,
        at: usize,
        kind: Attempt,
        limit: usize,
        f: impl FnOnce(&mut Self) -> ParseResult<Option<Draft>>,
    ) -> ParseResult<Option<Draft>> {
        if self.failed.contains(&(at, kind, limit)) {
            return Ok(None);
        }
        let result = self.nested(at, f)?;
        if result.is_none() {
            self.failed.insert((at, kind, limit));
        }
        Ok(result)
    }

    /// Parse `[start, limit)` until one of `stops` appears outside any nested construct.
    fn scan(&mut self, start: usize, limit: usize, stops: &[&'static str]) -> ParseResult<Scan> {
        let mut nodes = Vec::new();
        let mut text_start = start;
        let mut line = if start == 0 || self.bytes[start - 1] == b'\n' {
            LineState::fresh()
        } else {
            LineState::inline()
        };
        let mut i = start;
        while i < limit {
            if let Some(stop) = stops
                .iter()
                .copied()
                .find(|stop| self.starts_with(i, limit, stop))
            {
                push_text(&mut nodes, text_start, i);
                return Ok(Scan {
                    nodes,
                    stop: Some((i, stop)),
                });
            }
            let byte = self.bytes[i];
            if byte == b'\n' {
                line = LineState::fresh();
                i += 1;
                continue;
            }
            match self.construct(i, limit, line)? {
                Some(node) => {
                    push_text(&mut nodes, text_start, i);
                    if node.kind != NodeKind::Comment {
                        line = LineState::inline();
                    }
                    i = node.span.end;
                    text_start = i;
                    nodes.push(node);
                }
                None => {
                    line.advance(byte);
                    i += 1;
                }
            }
        }
        push_text(&mut nodes, text_start, limit);
        Ok(Scan { nodes, stop: None })
    }

    fn construct(&mut self, i: usize, limit: usize, line: LineState) -> ParseResult<Option<Draft>> {
        match self.bytes[i] {
            b'<' if self.starts_with(i, limit, "<!--") => Ok(Some(self.comment(i, limit))),
            b'<' => self.nested(i, |p| p.tag(i, limit)),
            b'{' => {
                if self.starts_with(i, limit, "{{{") {
                    if let Some(arg) = self.attempt(i, Attempt::Arg, limit, |p| p.arg(i, limit))? {
                        return Ok(Some(arg));
                    }
                }
                if self.starts_with(i, limit, "{{") {
                    return self.attempt(i, Attempt::Template, limit, |p| p.template(i, limit));
                }
                if line.indent && self.starts_with(i, limit, "{|") {
                    return self.nested(i, |p| p.table(i, limit)).map(Some);
                }
                Ok(None)
            }
            b'[' => {
                if self.starts_with(i, limit, "[[") {
                    let link = self.attempt(i, Attempt::Link, limit, |p| p.link(i, limit))?;
                    if let Some(link) = link {
                        return Ok(Some(link));
                    }
                }
                self.attempt(i, Attempt::ExtLink, limit, |p| p.ext_link(i, limit))
            }
            b'_' if self.starts_with(i, limit, "__") => Ok(self.behavior_switch(i, limit)),
            b'=' if line.start => self.nested(i, |p| p.heading(i, limit)),
            byte if byte.is_ascii_alphabetic() && self.word_boundary(i) => {
                if let Some(link) = self.magic_link(i, limit) {
                    return Ok(Some(link));
                }
                Ok(self.free_ext_link(i, limit))
            }
            _ => Ok(None),
        }
    }

    fn comment(&self, i: usize, limit: usize) -> Draft {
        match self.find(i + 4, limit, "-->") {
            Some(close) => Draft::new(NodeKind::Comment, i..close + 3),
            None => {
                let mut draft = Draft::new(NodeKind::Comment, i..limit);
                draft.flags.closed = false;
                draft
            }
        }
    }

    /// Pipe-separated segments up to `close`, or `None` when `close` never appears.
    fn segments(
        &mut self,
        start: usize,
        limit: usize,
        close: &'static str,
    ) -> ParseResult<Option<(Vec<Segment>, usize)>> {
        let mut segments = Vec::new();
        let mut pos = start;
        loop {
            let scan = self.scan(pos, limit, &[close, "|"])?;
            let Some((at, stop)) = scan.stop else {
                return Ok(None);
            };
            segments.push(Segment {
                span: pos..at,
                nodes: scan.nodes,
            });
            if stop == close {
                return Ok(Some((segments, at + close.len())));
            }
            pos = at + 1;
        }
    }

    fn arg(&mut self, i: usize, limit: usize) -> ParseResult<Option<Draft>> {
        let Some((segments, end)) = self.segments(i + 3, limit, "}}}")? else {
            return Ok(None);
        };
        let mut segments = segments.into_iter();
        let Some(head) = segments.next() else {
            return Ok(None);
        };
        let name = self.plain(head.span.clone(), &head.nodes).trim().to_string();
        let mut children = vec![Draft::new(NodeKind::ArgName, head.span)
            .named(name.clone())
            .with_children(head.nodes)];
        children.extend(
            segments.map(|seg| Draft::new(NodeKind::ArgDefault, seg.span).with_children(seg.nodes)),
        );
        Ok(Some(
            Draft::new(NodeKind::Arg, i..end)
                .named(name)
                .with_children(children),
        ))
    }

    fn template(&mut self, i: usize, limit: usize) -> ParseResult<Option<Draft>> {
        let Some((segments, end)) = self.segments(i + 2, limit, "}}")? else {
            return Ok(None);
        };
        let mut segments = segments.into_iter();
        let Some(head) = segments.next() else {
            return Ok(None);
        };
        let rest: Vec<Segment> = segments.collect();
        let only_text = Self::only_text(&head.nodes);

        if only_text {
            if let Some(colon) = self.find_in_text(&head.nodes, b':') {
                let prefix = self.plain(head.span.start..colon, &head.nodes);
                if let Some(function) = self.config.parser_function(&prefix) {
                    let (name_nodes, first_nodes) = split_nodes(head.nodes, colon, 1);
                    let name = Draft::new(NodeKind::MagicWordName, head.span.start..colon)
                        .named(function.clone())
                        .with_children(name_nodes);
                    let mut params = vec![Segment {
                        span: colon + 1..head.span.end,
                        nodes: first_nodes,
                    }];
                    params.extend(rest);
                    return Ok(Some(self.magic_word(i..end, function, name, params)));
                }
            }
            let raw = self.plain(head.span.clone(), &head.nodes);
            if let Some(variable) = self.config.variable(&raw) {
                let name = Draft::new(NodeKind::MagicWordName, head.span)
                    .named(variable.clone())
                    .with_children(head.nodes);
                return Ok(Some(self.magic_word(i..end, variable, name, rest)));
            }
        }

        let title = if only_text {
            let raw = self.plain(head.span.clone(), &head.nodes);
            match Title::parse(&raw, NS_TEMPLATE, self.config) {
                Some(title) => Some(title.full_name()),
                None => return Ok(None),
            }
        } else {
            None
        };

        let mut name = Draft::new(NodeKind::TemplateName, head.span).with_children(head.nodes);
        name.name = title.clone();
        let mut children = vec![name];
        children.extend(self.keyed_parameters(rest, 0));
        let mut template = Draft::new(NodeKind::Template, i..end).with_children(children);
        template.name = title;
        Ok(Some(template))
    }

    fn magic_word(
        &self,
        span: Range<usize>,
        function: String,
        name: Draft,
        params: Vec<Segment>,
    ) -> Draft {
        let mut children = vec![name];
        if function == "#invoke" {
            let mut params = params.into_iter();
            children.extend(
                params
                    .by_ref()
                    .take(2)
                    .enumerate()
                    .map(|(idx, seg)| Self::positional(seg, idx + 1)),
            );
            children.extend(self.keyed_parameters(params.collect(), 0));
        } else {
            children.extend(
                params
                    .into_iter()
                    .enumerate()
                    .map(|(idx, seg)| Self::positional(seg, idx + 1)),
            );
        }
        Draft::new(NodeKind::MagicWord, span)
            .named(function)
            .with_children(children)
    }

    fn positional(seg: Segment, index: usize) -> Draft {
        let mut param = Draft::new(NodeKind::Parameter, seg.span.clone())
            .named(index.to_string())
            .with_children(vec![
                Draft::new(NodeKind::ParameterValue, seg.span).with_children(seg.nodes)
            ]);
        param.flags.anonymous = true;
        param
    }

    /// Template-style parameters: `key=value` or anonymous, numbered from `offset + 1`.
    fn keyed_parameters(&self, segments: Vec<Segment>, offset: usize) -> Vec<Draft> {
        let mut index = offset;
        segments
            .into_iter()
            .map(|seg| match self.find_in_text(&seg.nodes, b'=') {
                Some(eq) => {
                    let (key_nodes, value_nodes) = split_nodes(seg.nodes, eq, 1);
                    let key = self
                        .plain(seg.span.start..eq, &key_nodes)
                        .trim()
                        .to_string();
                    Draft::new(NodeKind::Parameter, seg.span.clone())
                        .named(key.clone())
                        .with_children(vec![
                            Draft::new(NodeKind::ParameterKey, seg.span.start..eq)
                                .named(key)
                                .with_children(key_nodes),
                            Draft::new(NodeKind::ParameterValue, eq + 1..seg.span.end)
                                .with_children(value_nodes),
                        ])
                }
                None => {
                    index += 1;
                    Self::positional(seg, index)
                }
            })
            .collect()
    }

    fn link(&mut self, i: usize, limit: usize) -> ParseResult<Option<Draft>> {
        let scan = self.scan(i + 2, limit, &["]]", "|"])?;
        let Some((at, stop)) = scan.stop else {
            return Ok(None);
        };
        if !Self::only_text(&scan.nodes) {
            return Ok(None);
        }
        let raw = self.plain(i + 2..at, &scan.nodes);
        let Some(title) = Title::parse(&raw, NS_MAIN, self.config) else {
            return Ok(None);
        };
        let name = title.full_name();
        let target = Draft::new(NodeKind::LinkTarget, i + 2..at)
            .named(name.clone())
            .with_children(scan.nodes);
        let is_file = title.ns == NS_FILE && !raw.trim_start().starts_with(':');

        if stop == "]]" {
            let kind = if is_file {
                NodeKind::FileLink
            } else {
                NodeKind::Link
            };
            return Ok(Some(
                Draft::new(kind, i..at + 2)
                    .named(name)
                    .with_children(vec![target]),
            ));
        }

        if is_file {
            let Some((segments, end)) = self.segments(at + 1, limit, "]]")? else {
                return Ok(None);
            };
            let mut children = vec![target];
            for seg in segments {
                let option = self.plain(seg.span.clone(), &seg.nodes);
                let canonical = self
                    .config
                    .image_parameter(&option)
                    .unwrap_or("caption")
                    .to_string();
                children.push(
                    Draft::new(NodeKind::ImageParameter, seg.span)
                        .named(canonical)
                        .with_children(seg.nodes),
                );
            }
            return Ok(Some(
                Draft::new(NodeKind::FileLink, i..end)
                    .named(name)
                    .with_children(children),
            ));
        }

        let text = self.scan(at + 1, limit, &["]]"])?;
        let Some((close, _)) = text.stop else {
            return Ok(None);
        };
        Ok(Some(
            Draft::new(NodeKind::Link, i..close + 2)
                .named(name)
                .with_children(vec![
                    target,
                    Draft::new(NodeKind::LinkText, at + 1..close).with_children(text.nodes),
                ]),
        ))
    }

    fn ext_link(&mut self, i: usize, limit: usize) -> ParseResult<Option<Draft>> {
        let line_end = self.line_end(i, limit);
        let url_start = i + 1;
        if url_start >= line_end {
            return Ok(None);
        }
        let Some(protocol) = self
            .config
            .protocol_len(&self.text[url_start..line_end], true)
        else {
            return Ok(None);
        };
        let mut j = url_start + protocol;
        while j < line_end && !is_space(self.bytes[j]) && !b"[]<>\"".contains(&self.bytes[j]) {
            j += 1;
        }
        if j == url_start + protocol || j >= line_end {
            return Ok(None);
        }
        let url = Draft::new(NodeKind::ExtLinkUrl, url_start..j);
        let name = self.text[url_start..j].to_string();
        if self.bytes[j] == b']' {
            return Ok(Some(
                Draft::new(NodeKind::ExtLink, i..j + 1)
                    .named(name)
                    .with_children(vec![url]),
            ));
        }
        let mut text_start = j;
        while text_start < line_end && matches!(self.bytes[text_start], b' ' | b'\t') {
            text_start += 1;
        }
        let text = self.scan(text_start, line_end, &["]"])?;
        let Some((close, _)) = text.stop else {
            return Ok(None);
        };
        Ok(Some(
            Draft::new(NodeKind::ExtLink, i..close + 1)
                .named(name)
                .with_children(vec![
                    url,
                    Draft::new(NodeKind::ExtLinkText, text_start..close).with_children(text.nodes),
                ]),
        ))
    }

    fn free_ext_link(&self, i: usize, limit: usize) -> Option<Draft> {
        let protocol = self.config.protocol_len(&self.text[i..limit], false)?;
        let mut j = i + protocol;
        while j < limit && !is_space(self.bytes[j]) && !b"[]<>\"{}|".contains(&self.bytes[j]) {
            j += 1;
        }
        let url = &self.text[i..j];
        let mut end = j;
        while end > i + protocol {
            let last = self.bytes[end - 1];
            let strip = matches!(last, b',' | b';' | b'.' | b':' | b'!' | b'?')
                || (last == b')' && !url.contains('('));
            if !strip {
                break;
            }
            end -= 1;
        }
        if end == i + protocol {
            return None;
        }
        Some(Draft::new(NodeKind::FreeExtLink, i..end).named(&self.text[i..end]))
    }

    fn magic_link(&self, i: usize, limit: usize) -> Option<Draft> {
        if !matches!(self.bytes[i], b'R' | b'P' | b'I') {
            return None;
        }
        let caps = MAGIC_LINK.captures(&self.text[i..limit])?;
        let whole = caps.get(0)?;
        let kind = caps.get(1).or_else(|| caps.get(2))?.as_str();
        Some(Draft::new(NodeKind::MagicLink, i..i + whole.end()).named(kind))
    }

    fn behavior_switch(&self, i: usize, limit: usize) -> Option<Draft> {
        let mut j = i + 2;
        while j < limit && self.bytes[j].is_ascii_alphabetic() {
            j += 1;
        }
        if j == i + 2 || !self.starts_with(j, limit, "__") {
            return None;
        }
        let canonical = self.config.behavior_switch(&self.text[i + 2..j])?;
        Some(Draft::new(NodeKind::DoubleUnderscore, i..j + 2).named(canonical))
    }

    /// End of the physical line starting at `from`, treating comments as part of it.
    fn heading_line_end(&self, from: usize, limit: usize) -> usize {
        let mut j = from;
        while j < limit {
            if self.bytes[j] == b'\n' {
                break;
            }
            if self.starts_with(j, limit, "<!--") {
                j = self.find(j + 4, limit, "-->").map_or(limit, |close| close + 3);
                continue;
            }
            j += 1;
        }
        j
    }

    fn heading(&mut self, i: usize, limit: usize) -> ParseResult<Option<Draft>> {
        let mut end = self.heading_line_end(i, limit);
        loop {
            while end > i && matches!(self.bytes[end - 1], b' ' | b'\t' | b'\r') {
                end -= 1;
            }
            let line = &self.text[i..end];
            if !line.ends_with("-->") {
                break;
            }
            let Some(open) = line.rfind("<!--") else {
                break;
            };
            if self.find(i + open + 4, end, "-->") != Some(end - 3) {
                break;
            }
            end = i + open;
        }
        let line = &self.bytes[i..end];
        let leading = line.iter().take_while(|b| **b == b'=').count();
        let level = if leading == line.len() {
            if leading < 3 {
                return Ok(None);
            }
            ((leading - 1) / 2).min(6)
        } else {
            let trailing = line.iter().rev().take_while(|b| **b == b'=').count();
            leading.min(trailing).min(6)
        };
        if level == 0 {
            return Ok(None);
        }
        let title_span = i + level..end - level;
        let title = self.scan(title_span.start, title_span.end, &[])?;
        let name = self.plain(title_span.clone(), &title.nodes).trim().to_string();
        let mut heading = Draft::new(NodeKind::Heading, i..end)
            .named(name.clone())
            .with_children(vec![Draft::new(NodeKind::HeadingTitle, title_span)
                .named(name)
                .with_children(title.nodes)]);
        heading.level = level as u8;
        Ok(Some(heading))
    }

    fn table(&mut self, i: usize, limit: usize) -> ParseResult<Draft> {
        let header_end = self.line_end(i, limit);
        let attributes = self.attributes(i + 2, header_end)?;
        let mut depth = 1usize;
        let mut close = None;
        let mut pos = header_end;
        while pos < limit {
            let line_start = pos + 1;
            let line_end = self.line_end(line_start.min(limit), limit);
            let mut t = line_start;
            while t < line_end && matches!(self.bytes[t], b' ' | b'\t' | b':') {
                t += 1;
            }
            if self.starts_with(t.min(limit), limit, "{|") {
                depth += 1;
            } else if self.starts_with(t.min(limit), limit, "|}") {
                depth -= 1;
                if depth == 0 {
                    close = Some(t);
                    break;
                }
            }
            pos = line_end;
        }
        let (inner_end, end, closed) = match close {
            Some(t) => (t, t + 2, true),
            None => (limit, limit, false),
        };
        let inner = self.scan(header_end, inner_end, &[])?;
        let mut children = attributes;
        children.extend(inner.nodes);
        let mut table = Draft::new(NodeKind::Table, i..end).with_children(children);
        table.flags.closed = closed;
        Ok(table)
    }

    fn tag(&mut self, i: usize, limit: usize) -> ParseResult<Option<Draft>> {
        let closing = self.bytes.get(i + 1) == Some(&b'/');
        let name_start = i + 1 + usize::from(closing);
        if name_start >= limit || !self.bytes[name_start].is_ascii_alphabetic() {
            return Ok(None);
        }
        let mut name_end = name_start;
        while name_end < limit && self.bytes[name_end].is_ascii_alphanumeric() {
            name_end += 1;
        }
        if name_end < limit
            && !is_space(self.bytes[name_end])
            && !matches!(self.bytes[name_end], b'>' | b'/')
        {
            return Ok(None);
        }
        let Some(gt) = self.tag_end(name_end, limit) else {
            return Ok(None);
        };
        let selfclosing = gt > name_end && self.bytes[gt - 1] == b'/';
        let attrs_end = if selfclosing { gt - 1 } else { gt };
        let name = self.text[name_start..name_end].to_ascii_lowercase();
        let tag_end = gt + 1;

        if self.config.is_ext(&name) && !closing {
            let mut children = self.attributes(name_end, attrs_end)?;
            if selfclosing {
                let mut ext = Draft::new(NodeKind::Ext, i..tag_end)
                    .named(name)
                    .with_children(children);
                ext.flags.selfclosing = true;
                return Ok(Some(ext));
            }
            let Some((close_start, close_end)) = self.closing_tag(&name, tag_end, limit) else {
                let mut ext = Draft::new(NodeKind::Ext, i..tag_end)
                    .named(name)
                    .with_children(children);
                ext.flags.closed = false;
                return Ok(Some(ext));
            };
            let inner_nodes = if PARSED_EXT.contains(&name.as_str()) {
                self.scan(tag_end, close_start, &[])?.nodes
            } else {
                let mut nodes = Vec::new();
                push_text(&mut nodes, tag_end, close_start);
                nodes
            };
            children.push(
                Draft::new(NodeKind::ExtInner, tag_end..close_start)
                    .named(name.clone())
                    .with_children(inner_nodes),
            );
            return Ok(Some(
                Draft::new(NodeKind::Ext, i..close_end)
                    .named(name)
                    .with_children(children),
            ));
        }

        if self.config.is_html(&name) {
            let children = self.attributes(name_end, attrs_end)?;
            let mut html = Draft::new(NodeKind::Html, i..tag_end)
                .named(name)
                .with_children(children);
            html.flags.closing = closing;
            html.flags.selfclosing = selfclosing;
            return Ok(Some(html));
        }
        Ok(None)
    }

    /// Position of the `>` closing a tag opened before `from`. Comments inside the tag are
    /// skipped; any other `<` means this is not a tag.
    fn tag_end(&self, from: usize, limit: usize) -> Option<usize> {
        let mut gt = from;
        while gt < limit {
            match self.bytes[gt] {
                b'>' => return Some(gt),
                b'<' if self.starts_with(gt, limit, "<!--") => {
                    gt = self.find(gt + 4, limit, "-->")? + 3;
                }
                b'<' => return None,
                _ => gt += 1,
            }
        }
        None
    }

    /// Case-insensitive `</name>` search, allowing whitespace before `>`.
    fn closing_tag(&self, name: &str, from: usize, limit: usize) -> Option<(usize, usize)> {
        let mut pos = from;
        while let Some(open) = self.find(pos, limit, "</") {
            let name_end = open + 2 + name.len();
            if name_end <= limit
                && self.bytes[open + 2..name_end].eq_ignore_ascii_case(name.as_bytes())
            {
                let mut j = name_end;
                while j < limit && is_space(self.bytes[j]) {
                    j += 1;
                }
                if j < limit && self.bytes[j] == b'>' {
                    return Some((open, j + 1));
                }
            }
            pos = open + 2;
        }
        None
    }

    fn attributes(&mut self, start: usize, end: usize) -> ParseResult<Vec<Draft>> {
        let mut out = Vec::new();
        let mut j = start;
        while j < end {
            if is_space(self.bytes[j]) {
                j += 1;
                continue;
            }
            if self.starts_with(j, end, "<!--") {
                j = self.find(j + 4, end, "-->").map_or(end, |close| close + 3);
                continue;
            }
            let key_start = j;
            while j < end && !is_space(self.bytes[j]) && self.bytes[j] != b'=' {
                j += 1;
            }
            if j == key_start {
                j += 1;
                continue;
            }
            let key_end = j;
            let key = self.text[key_start..key_end].to_ascii_lowercase();
            let mut k = key_end;
            while k < end && is_space(self.bytes[k]) {
                k += 1;
            }
            let key_node = Draft::new(NodeKind::AttrKey, key_start..key_end).named(key.clone());
            if k >= end || self.bytes[k] != b'=' {
                out.push(
                    Draft::new(NodeKind::Attribute, key_start..key_end)
                        .named(key)
                        .with_children(vec![key_node]),
                );
                j = key_end;
                continue;
            }
            k += 1;
            while k < end && is_space(self.bytes[k]) {
                k += 1;
            }
            let (value_span, attr_end) = if k < end && matches!(self.bytes[k], b'"' | b'\'') {
                let quote = self.bytes[k];
                let value_start = k + 1;
                let value_end = self.bytes[value_start..end]
                    .iter()
                    .position(|b| *b == quote)
                    .map_or(end, |pos| value_start + pos);
                (value_start..value_end, (value_end + 1).min(end))
            } else {
                let mut value_end = k;
                while value_end < end && !is_space(self.bytes[value_end]) {
                    value_end += 1;
                }
                (k..value_end, value_end)
            };
            let value = self.nested(value_span.start, |p| {
                p.scan(value_span.start, value_span.end, &[])
            })?;
            let value_name = self.text[value_span.clone()].trim().to_string();
            out.push(
                Draft::new(NodeKind::Attribute, key_start..attr_end)
                    .named(key)
                    .with_children(vec![
                        key_node,
                        Draft::new(NodeKind::AttrValue, value_span)
                            .named(value_name)
                            .with_children(value.nodes),
                    ]),
            );
            j = attr_end;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    fn tree(text: &str) -> SyntaxTree {
        parse(text, &ParserConfig::default()).unwrap()
    }

    fn first<'a>(tree: &'a SyntaxTree, kind: NodeKind) -> Node<'a> {
        tree.query(kind)
            .next()
            .unwrap_or_else(|| panic!("no {kind} node"))
    }

    #[test]
    fn splits_template_parameters() {
        let tree = tree("{{a|b=|c}}");
        let template = first(&tree, NodeKind::Template);
        assert_eq!(template.name(), Some("Template:A"));
        let params: Vec<_> = template
            .children()
            .filter(|child| child.is(NodeKind::Parameter))
            .collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name(), Some("b"));
        assert!(!params[0].is_anonymous());
        assert_eq!(params[1].name(), Some("1"));
        assert!(params[1].is_anonymous());
        assert_eq!(params[1].start(), 7);
    }

    #[test]
    fn recognizes_parser_functions_and_variables() {
        let tree = tree("{{ #invoke: c | c |x}}{{ PAGENAME }}");
        let words: Vec<_> = tree.query(NodeKind::MagicWord).collect();
        assert_eq!(words[0].name(), Some("#invoke"));
        assert_eq!(words[0].child(1).unwrap().text(), " c ");
        assert_eq!(words[0].child(3).unwrap().name(), Some("1"));
        assert_eq!(words[1].name(), Some("PAGENAME"));
        assert_eq!(words[1].first_child().unwrap().text(), " PAGENAME ");
    }

    #[test]
    fn invalid_template_names_stay_text() {
        let tree = tree("{{a<b}}");
        assert_eq!(tree.query(NodeKind::Template).count(), 0);
        assert_eq!(tree.root().child_count(), 1);
    }

    #[test]
    fn args_keep_whitespace_in_names() {
        let tree = tree("{{{ a }}}{{{a|x}}}");
        let names: Vec<_> = tree
            .query(NodeKind::ArgName)
            .map(|node| (node.text(), node.name()))
            .collect();
        assert_eq!(names, vec![(" a ", Some("a")), ("a", Some("a"))]);
        assert_eq!(first(&tree, NodeKind::ArgDefault).text(), "x");
    }

    #[test]
    fn links_distinguish_files() {
        let tree = tree("[[ file : d | thumb ]][[ :file:d ]][[a|b]]");
        let file = first(&tree, NodeKind::FileLink);
        assert_eq!(file.name(), Some("File:D"));
        assert_eq!(first(&tree, NodeKind::ImageParameter).name(), Some("thumbnail"));
        let links: Vec<_> = tree.query(NodeKind::Link).collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].name(), Some("File:D"));
        assert_eq!(first(&tree, NodeKind::LinkText).text(), "b");
    }

    #[test]
    fn external_and_free_links() {
        let tree = tree("[//d d]\nNews:e\nhttp://a.]");
        assert_eq!(first(&tree, NodeKind::ExtLinkUrl).text(), "//d");
        let free: Vec<_> = tree.query(NodeKind::FreeExtLink).map(|n| n.text()).collect();
        assert_eq!(free, vec!["News:e", "http://a"]);
    }

    #[test]
    fn magic_links() {
        let tree = tree("RFC 1\nISBN 1-2-3-4-5-6-7-8-9-0\nxRFC 1");
        let links: Vec<_> = tree
            .query(NodeKind::MagicLink)
            .map(|n| (n.name(), n.text()))
            .collect();
        assert_eq!(
            links,
            vec![
                (Some("RFC"), "RFC 1"),
                (Some("ISBN"), "ISBN 1-2-3-4-5-6-7-8-9-0")
            ]
        );
    }

    #[test]
    fn headings_tolerate_comments() {
        let tree = tree("<!--\n-->= 1 =\n===== 3 ===== <!--\n\n--> \nx");
        let headings: Vec<_> = tree.query(NodeKind::Heading).collect();
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].level(), 1);
        assert_eq!(headings[0].text(), "= 1 =");
        assert_eq!(headings[1].level(), 5);
        assert_eq!(headings[1].text(), "===== 3 =====");
        assert_eq!(headings[1].first_child().unwrap().name(), Some("3"));
    }

    #[test]
    fn heading_titles_drop_inner_comments() {
        let tree = tree("x {{a|\n====== 4_<!--\n-->2 ====== \ny }} z");
        let heading = first(&tree, NodeKind::Heading);
        assert_eq!(heading.level(), 6);
        assert_eq!(heading.name(), Some("4_2"));
        assert!(heading.ancestors().any(|node| node.is(NodeKind::Template)));
    }

    #[test]
    fn tables_nest_and_allow_indent() {
        let tree = tree(" : {|\n|\n{|\n|}\n |} x");
        let tables: Vec<_> = tree.query(NodeKind::Table).collect();
        assert_eq!(tables.len(), 2);
        assert!(tables[0].text().starts_with("{|"));
        assert!(tables[0].text().ends_with("|}"));
        assert_eq!(tables[0].text().lines().count(), 5);
    }

    #[test]
    fn comments_inside_tags() {
        let t = tree("<p style=\"color:<!---->blue\" <!-- x --> id=a>");
        let html = first(&t, NodeKind::Html);
        assert_eq!(html.name(), Some("p"));
        let value = html.attribute("style").unwrap();
        let kinds: Vec<_> = value.children().map(|child| child.kind()).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Text, NodeKind::Comment, NodeKind::Text]
        );
        assert_eq!(value.last_child().unwrap().text(), "blue");
        assert_eq!(html.attribute("id").unwrap().text(), "a");
        assert!(tree("<p style=\"<!--\">").query(NodeKind::Html).next().is_none());
    }

    #[test]
    fn extension_tags_and_attributes() {
        let tree = tree("<ref group = f name = ' f ' >x</REF><templatestyles src = f /><ref>");
        let exts: Vec<_> = tree.query(NodeKind::Ext).collect();
        assert_eq!(exts.len(), 3);
        assert!(exts[0].is_closed());
        assert_eq!(exts[0].inner().unwrap().text(), "x");
        let value = exts[0].attribute("name").unwrap();
        assert_eq!(value.text(), " f ");
        assert_eq!(value.name(), Some("f"));
        assert!(exts[1].is_selfclosing());
        assert_eq!(exts[1].attribute("src").unwrap().text(), "f");
        assert!(!exts[2].is_closed());
    }

    #[test]
    fn html_tags_are_individual_nodes() {
        let tree = tree("<b ></b></br><xyz>");
        let tags: Vec<_> = tree
            .query(NodeKind::Html)
            .map(|n| (n.text(), n.is_closing()))
            .collect();
        assert_eq!(tags, vec![("<b >", false), ("</b>", true), ("</br>", true)]);
    }

    #[test]
    fn unclosed_comment_runs_to_end() {
        let tree = tree("a<!-- b");
        let comment = first(&tree, NodeKind::Comment);
        assert!(!comment.is_closed());
        assert_eq!(comment.end(), 7);
    }

    #[test]
    fn unbalanced_braces_do_not_explode() {
        let text = "{{".repeat(60);
        let tree = tree(&text);
        assert_eq!(tree.root().child_count(), 1);
    }

    #[test]
    fn rejects_oversized_documents() {
        let text = "a".repeat(MAX_LEN + 1);
        assert!(matches!(
            parse(&text, &ParserConfig::default()),
            Err(ParseError::TooLarge { .. })
        ));
    }
}
