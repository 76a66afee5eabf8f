//! Page title normalization.

use crate::config::{ParserConfig, NS_MAIN};

/// A normalized page title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub ns: i32,
    /// Canonical namespace prefix, empty for the main namespace.
    pub prefix: String,
    /// Page name with spaces and an uppercase first letter.
    pub main: String,
    pub fragment: Option<String>,
}

const INVALID: &[char] = &['<', '>', '[', ']', '{', '}', '|', '\n'];

fn collapse(text: &str) -> String {
    text.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn ucfirst(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Title {
    /// Normalize `text` the way MediaWiki resolves link and transclusion targets.
    ///
    /// A leading colon resets the default namespace to the main one, a known namespace
    /// prefix before the first colon selects that namespace, and everything after `#` is
    /// kept as the fragment. Returns `None` for titles containing forbidden characters or
    /// naming no page at all.
    pub fn parse(text: &str, default_ns: i32, config: &ParserConfig) -> Option<Title> {
        if text.contains(INVALID) {
            return None;
        }
        let mut rest = collapse(text);
        let mut ns = default_ns;
        if let Some(stripped) = rest.strip_prefix(':') {
            ns = NS_MAIN;
            rest = stripped.trim().to_string();
        }
        let (page, fragment) = match rest.split_once('#') {
            Some((page, fragment)) => (page.trim().to_string(), Some(fragment.trim().to_string())),
            None => (rest, None),
        };
        let mut page = page;
        if let Some((prefix, name)) = page.split_once(':') {
            if let Some(id) = config.namespace_id(prefix) {
                ns = id;
                page = name.trim().to_string();
            }
        }
        if page.is_empty() {
            return None;
        }
        let prefix = config.namespace_name(ns).unwrap_or_default().to_string();
        Some(Title {
            ns,
            prefix,
            main: ucfirst(&page),
            fragment,
        })
    }

    /// `Namespace:Page` without the fragment.
    pub fn full_name(&self) -> String {
        if self.prefix.is_empty() {
            self.main.clone()
        } else {
            format!("{}:{}", self.prefix, self.main)
        }
    }

    /// Article URL built from a path template.
    ///
    /// `$1` in `article_path` is replaced by the encoded title; a path without it is
    /// treated as a prefix. Protocol-relative paths get `https:`.
    pub fn url(&self, article_path: &str) -> String {
        let encoded = encode_component(&self.full_name().replace(' ', "_"));
        let mut path = if article_path.starts_with("//") {
            format!("https:{article_path}")
        } else {
            article_path.to_string()
        };
        if path.contains("$1") {
            path = path.replace("$1", &encoded);
        } else {
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(&encoded);
        }
        if let Some(fragment) = &self.fragment {
            path.push('#');
            path.push_str(&fragment.replace(' ', "_"));
        }
        path
    }
}

// Characters left alone by JavaScript's encodeURIComponent.
fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')'
        )
}

pub(crate) fn encode_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if is_unreserved(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
