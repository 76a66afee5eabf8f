//! Completion
//!
//!     Contexts that depend on the tree are tried first:
//!
//!         file link option            `[[File:a|thu`        option aliases and widths used elsewhere
//!         template parameter key      `{{a|ke`              keys used by other calls of the same template
//!
//!     Everything else is recognized from the text of the line before the cursor:
//!
//!         `<ta` / `</ta`              extension and html tag names
//!         `{{{ar`                     argument names used in the document
//!         `{{na` / `{{#fu`            parser functions, variables and templates used in the document
//!         `[[ta`                      link targets used in the document
//!         `__sw`                      behavior switches
//!         `[pro`                      URL protocols
//!         `<tag at` / `{| at`         attribute names, then attribute values
//!
//!     Candidates are filtered by a case-insensitive prefix match. The edit always replaces
//!     the typed prefix, so clients never have to guess word boundaries.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation, MarkupContent,
    MarkupKind, Position, Range, TextEdit,
};
use wikitext_parser::{Node, NodeKind, ParserConfig, SyntaxTree};

use crate::document::TextDocument;
use crate::features::magic_words;
use crate::position::{element_from_position, offset_at, position_at, word_prefix};

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)$").unwrap());
static ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\{\s*([^{}|]*)$").unwrap());
static MAGIC_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(#?[^{}|\[\]<>]*)$").unwrap());
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[\s*(?::\s*)?([^\[\]{}|<>]*)$").unwrap());
static BEHAVIOR_SWITCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"__([A-Za-z]*)$").unwrap());
static PROTOCOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\[])\[([A-Za-z]*)$").unwrap());
static TAG_ATTRIBUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9]*)(\s[^<>]*)$").unwrap());
static TABLE_ATTRIBUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s:]*\{\|(.*)$").unwrap());
static ATTR_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s([A-Za-z][\w:-]*)?$").unwrap());
static ATTR_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s([A-Za-z][\w:-]*)\s*=\s*["']?([^"'\s]*)$"#).unwrap());

/// Where a candidate comes from. Decides the item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Tag,
    Argument,
    MagicWord,
    Template,
    LinkTarget,
    BehaviorSwitch,
    Protocol,
    ImageOption,
    ImageWidth,
    TagAttribute,
    Attribute,
    DataAttribute,
    AttributeValue,
    ParameterKey,
}

impl Source {
    fn kind(self) -> CompletionItemKind {
        match self {
            Source::Tag => CompletionItemKind::CLASS,
            Source::Argument | Source::ParameterKey | Source::DataAttribute => {
                CompletionItemKind::VARIABLE
            }
            Source::MagicWord => CompletionItemKind::FUNCTION,
            Source::Template | Source::LinkTarget => CompletionItemKind::FOLDER,
            Source::BehaviorSwitch => CompletionItemKind::CONSTANT,
            Source::Protocol => CompletionItemKind::REFERENCE,
            Source::ImageOption | Source::Attribute => CompletionItemKind::PROPERTY,
            Source::ImageWidth => CompletionItemKind::UNIT,
            Source::TagAttribute => CompletionItemKind::FIELD,
            Source::AttributeValue => CompletionItemKind::VALUE,
        }
    }
}

/// Attributes understood by extension tags.
const EXT_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("ref", &["name", "group", "extends", "follow", "dir", "details"]),
    ("references", &["group", "responsive"]),
    ("poem", &["compact", "align"]),
    (
        "gallery",
        &["mode", "caption", "widths", "heights", "perrow", "showfilename", "showthumbnails"],
    ),
    ("pre", &["format"]),
    ("indicator", &["name"]),
    ("templatestyles", &["src", "wrapper"]),
    ("math", &["display", "chem", "id"]),
    ("chem", &["display", "id"]),
    ("score", &["lang", "raw", "vorbis", "note-language"]),
    (
        "mapframe",
        &[
            "width", "height", "zoom", "latitude", "longitude", "align", "frameless", "text",
            "lang", "group", "show",
        ],
    ),
    (
        "maplink",
        &["zoom", "latitude", "longitude", "text", "lang", "group", "show", "class"],
    ),
    ("syntaxhighlight", &["lang", "line", "start", "highlight", "inline", "copy"]),
    ("source", &["lang", "line", "start", "highlight", "inline", "copy"]),
    ("section", &["begin", "end"]),
    (
        "categorytree",
        &["mode", "depth", "hideroot", "hideprefix", "showcount", "namespaces", "notranslations"],
    ),
    ("langconvert", &["from", "to"]),
];

/// Extension tags rendered as html elements, which therefore accept the common attributes.
const EXT_WITH_COMMON: &[&str] = &["gallery", "poem", "pre", "syntaxhighlight", "source"];

const HTML_ATTRIBUTES: &[(&str, &[&str])] = &[
    (
        "table",
        &[
            "border", "cellpadding", "cellspacing", "frame", "rules", "summary", "width", "align",
            "bgcolor",
        ],
    ),
    (
        "td",
        &[
            "abbr", "align", "axis", "bgcolor", "colspan", "headers", "height", "nowrap", "rowspan",
            "scope", "valign", "width",
        ],
    ),
    (
        "th",
        &[
            "abbr", "align", "axis", "bgcolor", "colspan", "headers", "height", "nowrap", "rowspan",
            "scope", "valign", "width",
        ],
    ),
    ("tr", &["align", "bgcolor", "valign"]),
    ("caption", &["align"]),
    ("blockquote", &["cite"]),
    ("q", &["cite"]),
    ("del", &["cite", "datetime"]),
    ("ins", &["cite", "datetime"]),
    ("time", &["datetime"]),
    ("data", &["value"]),
    ("li", &["type", "value"]),
    ("ol", &["type", "start", "reversed"]),
    ("ul", &["type"]),
    ("font", &["size", "color", "face"]),
    ("img", &["alt", "src", "width", "height", "srcset", "loading"]),
    ("br", &["clear"]),
    ("hr", &["width", "size", "noshade"]),
    ("div", &["align"]),
    ("p", &["align"]),
];

const COMMON_ATTRIBUTES: &[&str] = &[
    "id", "class", "style", "lang", "dir", "title", "tabindex", "aria-describedby",
    "aria-flowto", "aria-hidden", "aria-label", "aria-labelledby", "aria-level", "aria-owns",
    "role", "about", "property", "resource", "datatype", "typeof", "itemid", "itemprop",
    "itemref", "itemscope", "itemtype",
];

const ATTRIBUTE_VALUES: &[(&str, &[&str])] = &[
    ("dir", &["ltr", "rtl", "auto"]),
    ("align", &["left", "center", "right", "justify"]),
    ("valign", &["top", "middle", "bottom", "baseline"]),
    ("scope", &["row", "col", "rowgroup", "colgroup"]),
    ("clear", &["left", "right", "all", "none"]),
    ("loading", &["lazy", "eager"]),
];

/// Candidates sharing one replacement range.
struct Completions {
    range: Range,
    prefix: String,
    seen: HashSet<String>,
    items: Vec<CompletionItem>,
}

impl Completions {
    fn new(range: Range, prefix: &str) -> Self {
        Self {
            range,
            prefix: prefix.to_lowercase(),
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, label: &str, source: Source) {
        self.push_with(label, label.to_string(), source, None);
    }

    fn push_with(&mut self, label: &str, new_text: String, source: Source, docs: Option<&str>) {
        if !label.to_lowercase().starts_with(&self.prefix) || !self.seen.insert(label.to_string()) {
            return;
        }
        self.items.push(CompletionItem {
            label: label.to_string(),
            kind: Some(source.kind()),
            documentation: docs.map(|value| {
                Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: value.to_string(),
                })
            }),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range: self.range,
                new_text,
            })),
            ..CompletionItem::default()
        });
    }
}

/// Cursor context shared by every completion source.
struct Request<'a> {
    document: &'a TextDocument,
    tree: &'a SyntaxTree,
    config: &'a ParserConfig,
    position: Position,
    offset: usize,
    line_start: usize,
    before: &'a str,
}

impl Request<'_> {
    /// Range from byte `start` of the line prefix to the cursor.
    fn range_from(&self, start: usize) -> Range {
        Range::new(
            position_at(self.document, self.line_start + start),
            self.position,
        )
    }

    fn capture_range(&self, caps: &Captures<'_>, group: usize) -> (Range, String) {
        let m = caps.get(group);
        let start = m.map_or(self.before.len(), |m| m.start());
        let text = m.map_or("", |m| m.as_str());
        (self.range_from(start), text.to_string())
    }

    /// Whether `node` spans the cursor, so its own text is not offered back.
    fn covers(&self, node: Node<'_>) -> bool {
        node.start() <= self.offset && self.offset <= node.end()
    }
}

pub fn compute_completions(
    document: &TextDocument,
    tree: &SyntaxTree,
    config: &ParserConfig,
    position: Position,
) -> Vec<CompletionItem> {
    let offset = offset_at(document, position);
    let line_start = offset_at(document, Position::new(position.line, 0));
    let request = Request {
        document,
        tree,
        config,
        position,
        offset,
        line_start,
        before: &document.text()[line_start..offset],
    };
    let found = image_options(&request)
        .or_else(|| parameter_keys(&request))
        .or_else(|| tag_names(&request))
        .or_else(|| arguments(&request))
        .or_else(|| magic_words_and_templates(&request))
        .or_else(|| link_targets(&request))
        .or_else(|| behavior_switches(&request))
        .or_else(|| protocols(&request))
        .or_else(|| attributes(&request));
    found.map(|completions| completions.items).unwrap_or_default()
}

fn image_options(request: &Request<'_>) -> Option<Completions> {
    let node = element_from_position(request.document, request.tree, request.position);
    let param = std::iter::once(node)
        .chain(node.ancestors())
        .find(|n| n.is(NodeKind::ImageParameter))?;
    if !param.parent().is_some_and(|link| link.is(NodeKind::FileLink)) {
        return None;
    }
    let text = param.text();
    let value_start = (param.start() + text.len() - text.trim_start().len()).min(request.offset);
    let prefix = &request.document.text()[value_start..request.offset];
    let mut completions = Completions::new(
        Range::new(position_at(request.document, value_start), request.position),
        prefix,
    );
    for option in &request.config.image_parameters {
        for alias in &option.aliases {
            completions.push(alias, Source::ImageOption);
        }
    }
    for width in request.tree.query(NodeKind::ImageParameter) {
        if width != param && width.name() == Some("width") {
            completions.push(width.text().trim(), Source::ImageWidth);
        }
    }
    Some(completions)
}

fn parameter_keys(request: &Request<'_>) -> Option<Completions> {
    let node = element_from_position(request.document, request.tree, request.position);
    let param = match node.kind() {
        NodeKind::ParameterKey => node.parent()?,
        NodeKind::ParameterValue => {
            let param = node.parent()?;
            let typed = &request.document.text()[node.start()..request.offset.max(node.start())];
            if !param.is_anonymous()
                || typed.trim() != word_prefix(request.document, request.position)
            {
                return None;
            }
            param
        }
        _ => return None,
    };
    let template = param.parent().filter(|t| t.is(NodeKind::Template))?;
    let name = template.name()?;
    let prefix = word_prefix(request.document, request.position);
    let start = request.offset - prefix.len();
    let mut completions = Completions::new(
        Range::new(position_at(request.document, start), request.position),
        prefix,
    );
    for other in request.tree.query(NodeKind::Template) {
        if other.name() != Some(name) {
            continue;
        }
        for key in other.children().filter(|child| child.is(NodeKind::Parameter)) {
            if key != param && !key.is_anonymous() {
                if let Some(key) = key.name() {
                    completions.push(key, Source::ParameterKey);
                }
            }
        }
    }
    Some(completions)
}

fn tag_names(request: &Request<'_>) -> Option<Completions> {
    let caps = TAG.captures(request.before)?;
    let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
    let (range, prefix) = request.capture_range(&caps, 2);
    let mut completions = Completions::new(range, &prefix);
    for name in request.config.ext.iter().chain(&request.config.html) {
        let new_text = if closing {
            format!("{name}>")
        } else {
            name.clone()
        };
        completions.push_with(name, new_text, Source::Tag, None);
    }
    Some(completions)
}

fn arguments(request: &Request<'_>) -> Option<Completions> {
    let caps = ARG.captures(request.before)?;
    let (range, _) = request.capture_range(&caps, 1);
    // Every other argument of the page is offered, whatever has been typed so far.
    let mut completions = Completions::new(range, "");
    for arg in request.tree.query(NodeKind::Arg) {
        if request.covers(arg) {
            continue;
        }
        if let Some(name) = arg.name() {
            completions.push(name, Source::Argument);
        }
    }
    Some(completions)
}

fn magic_words_and_templates(request: &Request<'_>) -> Option<Completions> {
    let caps = MAGIC_WORD.captures(request.before)?;
    let (range, prefix) = request.capture_range(&caps, 1);
    let mut completions = Completions::new(range, &prefix);
    let functions = &request.config.parser_functions;
    for name in functions
        .insensitive
        .iter()
        .chain(&functions.sensitive)
        .chain(&functions.variables)
    {
        let docs = magic_words::magic_word(name).map(|info| info.description.as_str());
        completions.push_with(name, name.clone(), Source::MagicWord, docs);
    }
    if !prefix.starts_with('#') {
        let template_ns = request
            .config
            .namespace_name(wikitext_parser::config::NS_TEMPLATE)
            .unwrap_or("Template");
        for template in request.tree.query(NodeKind::Template) {
            if request.covers(template) {
                continue;
            }
            let Some(name) = template.name() else { continue };
            let label = name
                .strip_prefix(template_ns)
                .and_then(|rest| rest.strip_prefix(':'))
                .map_or_else(|| format!(":{name}"), str::to_string);
            completions.push(&label, Source::Template);
        }
    }
    Some(completions)
}

fn link_targets(request: &Request<'_>) -> Option<Completions> {
    let caps = LINK.captures(request.before)?;
    let (range, prefix) = request.capture_range(&caps, 1);
    // `file : b` is typed, `File:B` is offered
    let prefix: Vec<&str> = prefix.split(':').map(str::trim).collect();
    let prefix = prefix.join(":").replace('_', " ");
    let mut completions = Completions::new(range, prefix.trim_start());
    for target in request.tree.query(NodeKind::LinkTarget) {
        let Some(link) = target.parent() else { continue };
        if request.covers(link) {
            continue;
        }
        if let Some(name) = link.name() {
            completions.push(name, Source::LinkTarget);
        }
    }
    Some(completions)
}

fn behavior_switches(request: &Request<'_>) -> Option<Completions> {
    let caps = BEHAVIOR_SWITCH.captures(request.before)?;
    let (range, _) = request.capture_range(&caps, 0);
    let typed = caps.get(1).map_or("", |m| m.as_str());
    let mut completions = Completions::new(range, &format!("__{typed}"));
    for name in &request.config.double_underscore {
        let label = format!("__{name}__");
        let docs = magic_words::behavior_switch(name).map(|info| info.description.as_str());
        completions.push_with(&label, label.clone(), Source::BehaviorSwitch, docs);
    }
    Some(completions)
}

fn protocols(request: &Request<'_>) -> Option<Completions> {
    let caps = PROTOCOL.captures(request.before)?;
    let (range, prefix) = request.capture_range(&caps, 1);
    let mut completions = Completions::new(range, &prefix);
    for protocol in &request.config.protocols {
        completions.push(protocol, Source::Protocol);
    }
    Some(completions)
}

fn balanced_quotes(text: &str) -> bool {
    text.matches('"').count() % 2 == 0 && text.matches('\'').count() % 2 == 0
}

fn lookup<'t>(table: &'t [(&str, &'t [&'t str])], key: &str) -> &'t [&'t str] {
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, values)| *values)
        .unwrap_or_default()
}

fn attributes(request: &Request<'_>) -> Option<Completions> {
    let (tag, part_start) = if let Some(caps) = TAG_ATTRIBUTES.captures(request.before) {
        let tag = caps.get(1)?.as_str().to_lowercase();
        (tag, caps.get(2)?.start())
    } else {
        let caps = TABLE_ATTRIBUTES.captures(request.before)?;
        ("table".to_string(), caps.get(1)?.start())
    };
    let is_ext = request.config.is_ext(&tag);
    if !is_ext && !request.config.is_html(&tag) {
        return None;
    }
    let part = &request.before[part_start..];

    if let Some(caps) = ATTR_VALUE.captures(part) {
        let whole = caps.get(0)?;
        let value = caps.get(2)?;
        let quoted = whole.as_str().contains(['"', '\'']);
        if balanced_quotes(&part[..whole.start()]) {
            let key = caps[1].to_lowercase();
            let mut completions =
                Completions::new(request.range_from(part_start + value.start()), value.as_str());
            for candidate in lookup(ATTRIBUTE_VALUES, &key) {
                completions.push(candidate, Source::AttributeValue);
            }
            return Some(completions);
        }
        if quoted {
            return None;
        }
    }

    let caps = ATTR_NAME.captures(part)?;
    let whole = caps.get(0)?;
    if !balanced_quotes(&part[..whole.start()]) {
        return None;
    }
    let (range, prefix) = match caps.get(1) {
        Some(name) => (request.range_from(part_start + name.start()), name.as_str()),
        None => (request.range_from(request.before.len()), ""),
    };
    let mut completions = Completions::new(range, prefix);
    let specific = if is_ext {
        lookup(EXT_ATTRIBUTES, &tag)
    } else {
        lookup(HTML_ATTRIBUTES, &tag)
    };
    for name in specific {
        completions.push(name, Source::TagAttribute);
    }
    if !is_ext || EXT_WITH_COMMON.contains(&tag.as_str()) {
        for name in COMMON_ATTRIBUTES {
            completions.push(name, Source::Attribute);
        }
        completions.push("data-", Source::DataAttribute);
    }
    Some(completions)
}
