//! Site configuration consumed by the parser.
//!
//! The defaults mirror a stock MediaWiki installation with the common extensions
//! (Cite, ParserFunctions, Scribunto, TemplateData, Score, Math, Kartographer).
//! A site-specific JSON file can replace any field; fields it omits keep their
//! defaults through `#[serde(default)]`.

use serde::{Deserialize, Serialize};

pub const NS_MAIN: i32 = 0;
pub const NS_SPECIAL: i32 = -1;
pub const NS_FILE: i32 = 6;
pub const NS_TEMPLATE: i32 = 10;
pub const NS_CATEGORY: i32 = 14;
pub const NS_MODULE: i32 = 828;

pub const DEFAULT_ARTICLE_PATH: &str = "https://mediawiki.org/wiki/$1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Magic word tables.
///
/// `insensitive` and `sensitive` hold parser functions that take arguments after a
/// colon; `variables` hold the case-sensitive names that may also stand alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserFunctions {
    pub insensitive: Vec<String>,
    pub sensitive: Vec<String>,
    pub variables: Vec<String>,
}

/// A file link option: `aliases` are either exact keywords (`thumb`) or prefixes
/// ending in `=` (`link=`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageParameter {
    pub name: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub ext: Vec<String>,
    pub html: Vec<String>,
    pub namespaces: Vec<Namespace>,
    pub parser_functions: ParserFunctions,
    pub double_underscore: Vec<String>,
    pub protocols: Vec<String>,
    pub image_parameters: Vec<ImageParameter>,
    pub article_path: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn namespace(id: i32, name: &str, aliases: &[&str]) -> Namespace {
    Namespace {
        id,
        name: name.to_string(),
        aliases: strings(aliases),
    }
}

fn image_parameter(name: &str, aliases: &[&str]) -> ImageParameter {
    ImageParameter {
        name: name.to_string(),
        aliases: strings(aliases),
    }
}

impl Default for ParserFunctions {
    fn default() -> Self {
        Self {
            insensitive: strings(&[
                "#if", "#ifeq", "#iferror", "#ifexist", "#ifexpr", "#switch", "#expr", "#time",
                "#timel", "#titleparts", "#rel2abs", "#len", "#pos", "#sub", "#replace",
                "#explode", "#urldecode", "#invoke", "#tag", "#language", "#special",
                "#speciale", "#formatdate", "#dateformat", "#property", "#statements",
                "#categorytree", "subst", "safesubst", "msg", "msgnw", "raw", "int", "ns",
                "nse", "lc", "lcfirst", "uc", "ucfirst", "urlencode", "anchorencode",
                "fullurl", "fullurle", "localurl", "localurle", "canonicalurl",
                "canonicalurle", "filepath", "formatnum", "grammar", "gender", "plural",
                "padleft", "padright", "bidi", "nowiki",
            ]),
            sensitive: strings(&[
                "PAGENAME", "PAGENAMEE", "FULLPAGENAME", "FULLPAGENAMEE", "BASEPAGENAME",
                "ROOTPAGENAME", "SUBPAGENAME", "TALKPAGENAME", "NAMESPACE", "NAMESPACEE",
                "NAMESPACENUMBER", "PAGESIZE", "PAGESINCATEGORY", "PAGESINCAT",
                "NUMBEROFPAGES", "NUMBEROFARTICLES", "NUMBEROFFILES", "NUMBEROFEDITS",
                "NUMBEROFUSERS", "NUMBEROFADMINS", "NUMBEROFACTIVEUSERS", "DEFAULTSORT",
                "DEFAULTSORTKEY", "DISPLAYTITLE", "PROTECTIONLEVEL", "PAGEID",
            ]),
            variables: strings(&[
                "!", "!!", "=", "PAGENAME", "PAGENAMEE", "FULLPAGENAME", "FULLPAGENAMEE",
                "BASEPAGENAME", "ROOTPAGENAME", "SUBPAGENAME", "TALKPAGENAME", "NAMESPACE",
                "NAMESPACEE", "NAMESPACENUMBER", "PAGESIZE", "NUMBEROFPAGES",
                "NUMBEROFARTICLES", "NUMBEROFFILES", "NUMBEROFEDITS", "NUMBEROFUSERS",
                "NUMBEROFADMINS", "NUMBEROFACTIVEUSERS", "SITENAME", "SERVER", "SERVERNAME",
                "SCRIPTPATH", "CURRENTYEAR", "CURRENTMONTH", "CURRENTDAY", "CURRENTTIME",
                "CURRENTTIMESTAMP", "LOCALYEAR", "LOCALMONTH", "LOCALDAY", "LOCALTIME",
                "REVISIONID", "REVISIONUSER", "PAGEID", "CONTENTLANGUAGE",
            ]),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            ext: strings(&[
                "ref", "references", "nowiki", "pre", "gallery", "poem", "indicator",
                "templatedata", "templatestyles", "math", "chem", "ce", "score", "mapframe",
                "maplink", "graph", "syntaxhighlight", "source", "timeline", "inputbox",
                "categorytree", "imagemap", "section", "hiero", "charinsert", "langconvert",
            ]),
            html: strings(&[
                "b", "big", "blockquote", "br", "caption", "center", "cite", "code", "data",
                "dd", "del", "dfn", "div", "dl", "dt", "em", "font", "h1", "h2", "h3", "h4",
                "h5", "h6", "hr", "i", "img", "ins", "kbd", "li", "link", "mark", "meta", "ol",
                "p", "q", "rb", "rp", "rt", "rtc", "ruby", "s", "samp", "small", "span",
                "strike", "strong", "sub", "sup", "table", "td", "th", "time", "tr", "tt",
                "u", "ul", "var", "wbr",
            ]),
            namespaces: vec![
                namespace(-2, "Media", &[]),
                namespace(NS_SPECIAL, "Special", &[]),
                namespace(NS_MAIN, "", &[]),
                namespace(1, "Talk", &[]),
                namespace(2, "User", &[]),
                namespace(3, "User talk", &[]),
                namespace(4, "Project", &[]),
                namespace(5, "Project talk", &[]),
                namespace(NS_FILE, "File", &["Image"]),
                namespace(7, "File talk", &["Image talk"]),
                namespace(8, "MediaWiki", &[]),
                namespace(9, "MediaWiki talk", &[]),
                namespace(NS_TEMPLATE, "Template", &[]),
                namespace(11, "Template talk", &[]),
                namespace(12, "Help", &[]),
                namespace(13, "Help talk", &[]),
                namespace(NS_CATEGORY, "Category", &[]),
                namespace(15, "Category talk", &[]),
                namespace(NS_MODULE, "Module", &[]),
                namespace(829, "Module talk", &[]),
            ],
            parser_functions: ParserFunctions::default(),
            double_underscore: strings(&[
                "notoc", "forcetoc", "toc", "noeditsection", "newsectionlink",
                "nonewsectionlink", "nogallery", "hiddencat", "expectunusedcategory",
                "expectunusedtemplate", "nocontentconvert", "nocc", "notitleconvert", "notc",
                "index", "noindex", "staticredirect", "disambig", "archivedtalk", "notalk",
            ]),
            protocols: strings(&[
                "bitcoin:", "ftp://", "ftps://", "geo:", "git://", "gopher://", "http://",
                "https://", "irc://", "ircs://", "magnet:", "mailto:", "matrix:", "mms://",
                "news:", "nntp://", "redis://", "sftp://", "sip:", "sips:", "sms:", "ssh://",
                "svn://", "tel:", "telnet://", "urn:", "worldwind://", "xmpp:",
            ]),
            image_parameters: vec![
                image_parameter("thumbnail", &["thumb", "thumbnail"]),
                image_parameter("manualthumb", &["thumb=", "thumbnail="]),
                image_parameter("framed", &["frame", "framed", "enframed"]),
                image_parameter("frameless", &["frameless"]),
                image_parameter("border", &["border"]),
                image_parameter("left", &["left"]),
                image_parameter("right", &["right"]),
                image_parameter("center", &["center", "centre"]),
                image_parameter("none", &["none"]),
                image_parameter("baseline", &["baseline"]),
                image_parameter("middle", &["middle"]),
                image_parameter("top", &["top"]),
                image_parameter("bottom", &["bottom"]),
                image_parameter("upright", &["upright", "upright="]),
                image_parameter("link", &["link="]),
                image_parameter("alt", &["alt="]),
                image_parameter("page", &["page="]),
                image_parameter("class", &["class="]),
                image_parameter("lang", &["lang="]),
            ],
            article_path: DEFAULT_ARTICLE_PATH.to_string(),
        }
    }
}

fn normalize_namespace(name: &str) -> String {
    name.trim()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl ParserConfig {
    /// Resolve a namespace prefix (canonical name or alias, any case) to its id.
    pub fn namespace_id(&self, prefix: &str) -> Option<i32> {
        let wanted = normalize_namespace(prefix);
        if wanted.is_empty() {
            return None;
        }
        self.namespaces
            .iter()
            .find(|ns| {
                normalize_namespace(&ns.name) == wanted
                    || ns.aliases.iter().any(|alias| normalize_namespace(alias) == wanted)
            })
            .map(|ns| ns.id)
    }

    pub fn namespace_name(&self, id: i32) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|ns| ns.id == id)
            .map(|ns| ns.name.as_str())
    }

    pub fn is_ext(&self, tag: &str) -> bool {
        self.ext.iter().any(|name| name.eq_ignore_ascii_case(tag))
    }

    pub fn is_html(&self, tag: &str) -> bool {
        self.html.iter().any(|name| name.eq_ignore_ascii_case(tag))
    }

    /// Canonical name of a behavior switch (`__NOTOC__` → `notoc`).
    pub fn behavior_switch(&self, word: &str) -> Option<String> {
        let lower = word.to_lowercase();
        self.double_underscore
            .iter()
            .find(|name| **name == lower)
            .cloned()
    }

    /// Canonical name of a parser function written before a colon.
    pub fn parser_function(&self, name: &str) -> Option<String> {
        let name = name.trim();
        let lower = name.to_lowercase();
        if let Some(found) = self.parser_functions.insensitive.iter().find(|f| **f == lower) {
            return Some(found.clone());
        }
        self.parser_functions
            .sensitive
            .iter()
            .chain(self.parser_functions.variables.iter())
            .find(|f| f.as_str() == name)
            .cloned()
    }

    /// Canonical name of a magic variable written without a colon.
    pub fn variable(&self, name: &str) -> Option<String> {
        let name = name.trim();
        self.parser_functions
            .variables
            .iter()
            .find(|f| f.as_str() == name)
            .cloned()
    }

    /// Canonical name of a file link option, `width` for `100px`-style sizes.
    pub fn image_parameter(&self, option: &str) -> Option<&str> {
        let option = option.trim();
        let lower = option.to_lowercase();
        if is_image_width(&lower) {
            return Some("width");
        }
        self.image_parameters
            .iter()
            .find(|param| {
                param.aliases.iter().any(|alias| {
                    if alias.ends_with('=') {
                        lower.starts_with(alias.as_str())
                    } else {
                        *alias == lower
                    }
                })
            })
            .map(|param| param.name.as_str())
    }

    /// Length of the URL protocol at the start of `text`, if any.
    ///
    /// Protocol-relative `//` is only accepted when `relative` is set, matching
    /// MediaWiki which allows it inside brackets but never as a free link.
    pub fn protocol_len(&self, text: &str, relative: bool) -> Option<usize> {
        if relative && text.starts_with("//") {
            return Some(2);
        }
        self.protocols
            .iter()
            .find(|protocol| {
                text.len() >= protocol.len()
                    && text.is_char_boundary(protocol.len())
                    && text[..protocol.len()].eq_ignore_ascii_case(protocol)
            })
            .map(|protocol| protocol.len())
    }
}

fn is_image_width(option: &str) -> bool {
    let Some(size) = option.strip_suffix("px") else {
        return false;
    };
    let size = size.trim_end();
    let (width, height) = match size.split_once('x') {
        Some((width, height)) => (width, Some(height)),
        None => (size, None),
    };
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    digits(width) && height.map_or(!width.is_empty(), |h| !h.is_empty() && digits(h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_namespace_aliases_in_any_case() {
        let config = ParserConfig::default();
        assert_eq!(config.namespace_id(" image "), Some(NS_FILE));
        assert_eq!(config.namespace_id("TEMPLATE"), Some(NS_TEMPLATE));
        assert_eq!(config.namespace_id("user_talk"), Some(3));
        assert_eq!(config.namespace_id("nope"), None);
        assert_eq!(config.namespace_id(""), None);
    }

    #[test]
    fn parser_functions_respect_case_rules() {
        let config = ParserConfig::default();
        assert_eq!(config.parser_function("#LEN").as_deref(), Some("#len"));
        assert_eq!(config.parser_function(" PAGENAME ").as_deref(), Some("PAGENAME"));
        assert_eq!(config.parser_function("pagename"), None);
        assert_eq!(config.variable("NUMBEROFPAGES").as_deref(), Some("NUMBEROFPAGES"));
        assert_eq!(config.variable("#len"), None);
    }

    #[test]
    fn image_parameters_map_to_canonical_names() {
        let config = ParserConfig::default();
        assert_eq!(config.image_parameter(" Thumb "), Some("thumbnail"));
        assert_eq!(config.image_parameter("link=Foo"), Some("link"));
        assert_eq!(config.image_parameter("100x100px"), Some("width"));
        assert_eq!(config.image_parameter("x20px"), Some("width"));
        assert_eq!(config.image_parameter("a caption"), None);
    }

    #[test]
    fn protocol_detection_is_case_insensitive() {
        let config = ParserConfig::default();
        assert_eq!(config.protocol_len("News:e", false), Some(5));
        assert_eq!(config.protocol_len("HTTPS://g", false), Some(8));
        assert_eq!(config.protocol_len("//d", false), None);
        assert_eq!(config.protocol_len("//d", true), Some(2));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ParserConfig =
            serde_json::from_str(r#"{"article_path": "https://en.wikipedia.org/wiki/$1"}"#)
                .unwrap();
        assert_eq!(config.article_path, "https://en.wikipedia.org/wiki/$1");
        assert!(config.is_ext("ref"));
    }
}
