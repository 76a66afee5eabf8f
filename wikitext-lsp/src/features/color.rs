//! Colors written in styles, template parameters and argument defaults.
//!
//!     Hex (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`) and functional (`rgb()`, `rgba()`,
//!     `hsl()`, `hsla()`, comma or space separated) notations are recognized in all of them.
//!     Named colors are only recognized inside `style` attribute values, where a bare word is
//!     unambiguous.

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{Color, ColorInformation, ColorPresentation, Range, TextEdit};
use wikitext_parser::{Node, NodeKind, SyntaxTree};

use crate::document::TextDocument;
use crate::position::range_from_offsets;

static HEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^\w&])(#(?:[0-9a-f]{8}|[0-9a-f]{6}|[0-9a-f]{3,4}))\b").unwrap()
});
static FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(rgba?|hsla?)\(\s*([^()]*?)\s*\)").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+").unwrap());

const NAMED: &[(&str, u32)] = &[
    ("aliceblue", 0xf0f8ff), ("antiquewhite", 0xfaebd7), ("aqua", 0x00ffff),
    ("aquamarine", 0x7fffd4), ("azure", 0xf0ffff), ("beige", 0xf5f5dc),
    ("bisque", 0xffe4c4), ("black", 0x000000), ("blanchedalmond", 0xffebcd),
    ("blue", 0x0000ff), ("blueviolet", 0x8a2be2), ("brown", 0xa52a2a),
    ("burlywood", 0xdeb887), ("cadetblue", 0x5f9ea0), ("chartreuse", 0x7fff00),
    ("chocolate", 0xd2691e), ("coral", 0xff7f50), ("cornflowerblue", 0x6495ed),
    ("cornsilk", 0xfff8dc), ("crimson", 0xdc143c), ("cyan", 0x00ffff),
    ("darkblue", 0x00008b), ("darkcyan", 0x008b8b), ("darkgoldenrod", 0xb8860b),
    ("darkgray", 0xa9a9a9), ("darkgreen", 0x006400), ("darkgrey", 0xa9a9a9),
    ("darkkhaki", 0xbdb76b), ("darkmagenta", 0x8b008b), ("darkolivegreen", 0x556b2f),
    ("darkorange", 0xff8c00), ("darkorchid", 0x9932cc), ("darkred", 0x8b0000),
    ("darksalmon", 0xe9967a), ("darkseagreen", 0x8fbc8f), ("darkslateblue", 0x483d8b),
    ("darkslategray", 0x2f4f4f), ("darkslategrey", 0x2f4f4f), ("darkturquoise", 0x00ced1),
    ("darkviolet", 0x9400d3), ("deeppink", 0xff1493), ("deepskyblue", 0x00bfff),
    ("dimgray", 0x696969), ("dimgrey", 0x696969), ("dodgerblue", 0x1e90ff),
    ("firebrick", 0xb22222), ("floralwhite", 0xfffaf0), ("forestgreen", 0x228b22),
    ("fuchsia", 0xff00ff), ("gainsboro", 0xdcdcdc), ("ghostwhite", 0xf8f8ff),
    ("gold", 0xffd700), ("goldenrod", 0xdaa520), ("gray", 0x808080),
    ("green", 0x008000), ("greenyellow", 0xadff2f), ("grey", 0x808080),
    ("honeydew", 0xf0fff0), ("hotpink", 0xff69b4), ("indianred", 0xcd5c5c),
    ("indigo", 0x4b0082), ("ivory", 0xfffff0), ("khaki", 0xf0e68c),
    ("lavender", 0xe6e6fa), ("lavenderblush", 0xfff0f5), ("lawngreen", 0x7cfc00),
    ("lemonchiffon", 0xfffacd), ("lightblue", 0xadd8e6), ("lightcoral", 0xf08080),
    ("lightcyan", 0xe0ffff), ("lightgoldenrodyellow", 0xfafad2), ("lightgray", 0xd3d3d3),
    ("lightgreen", 0x90ee90), ("lightgrey", 0xd3d3d3), ("lightpink", 0xffb6c1),
    ("lightsalmon", 0xffa07a), ("lightseagreen", 0x20b2aa), ("lightskyblue", 0x87cefa),
    ("lightslategray", 0x778899), ("lightslategrey", 0x778899), ("lightsteelblue", 0xb0c4de),
    ("lightyellow", 0xffffe0), ("lime", 0x00ff00), ("limegreen", 0x32cd32),
    ("linen", 0xfaf0e6), ("magenta", 0xff00ff), ("maroon", 0x800000),
    ("mediumaquamarine", 0x66cdaa), ("mediumblue", 0x0000cd), ("mediumorchid", 0xba55d3),
    ("mediumpurple", 0x9370db), ("mediumseagreen", 0x3cb371), ("mediumslateblue", 0x7b68ee),
    ("mediumspringgreen", 0x00fa9a), ("mediumturquoise", 0x48d1cc), ("mediumvioletred", 0xc71585),
    ("midnightblue", 0x191970), ("mintcream", 0xf5fffa), ("mistyrose", 0xffe4e1),
    ("moccasin", 0xffe4b5), ("navajowhite", 0xffdead), ("navy", 0x000080),
    ("oldlace", 0xfdf5e6), ("olive", 0x808000), ("olivedrab", 0x6b8e23),
    ("orange", 0xffa500), ("orangered", 0xff4500), ("orchid", 0xda70d6),
    ("palegoldenrod", 0xeee8aa), ("palegreen", 0x98fb98), ("paleturquoise", 0xafeeee),
    ("palevioletred", 0xdb7093), ("papayawhip", 0xffefd5), ("peachpuff", 0xffdab9),
    ("peru", 0xcd853f), ("pink", 0xffc0cb), ("plum", 0xdda0dd),
    ("powderblue", 0xb0e0e6), ("purple", 0x800080), ("rebeccapurple", 0x663399),
    ("red", 0xff0000), ("rosybrown", 0xbc8f8f), ("royalblue", 0x4169e1),
    ("saddlebrown", 0x8b4513), ("salmon", 0xfa8072), ("sandybrown", 0xf4a460),
    ("seagreen", 0x2e8b57), ("seashell", 0xfff5ee), ("sienna", 0xa0522d),
    ("silver", 0xc0c0c0), ("skyblue", 0x87ceeb), ("slateblue", 0x6a5acd),
    ("slategray", 0x708090), ("slategrey", 0x708090), ("snow", 0xfffafa),
    ("springgreen", 0x00ff7f), ("steelblue", 0x4682b4), ("tan", 0xd2b48c),
    ("teal", 0x008080), ("thistle", 0xd8bfd8), ("tomato", 0xff6347),
    ("turquoise", 0x40e0d0), ("violet", 0xee82ee), ("wheat", 0xf5deb3),
    ("white", 0xffffff), ("whitesmoke", 0xf5f5f5), ("yellow", 0xffff00),
    ("yellowgreen", 0x9acd32),
];

pub fn collect_document_colors(
    document: &TextDocument,
    tree: &SyntaxTree,
) -> Vec<ColorInformation> {
    let mut found: Vec<(usize, usize, Color)> = Vec::new();
    for text in tree.query(NodeKind::Text) {
        let Some(owner) = text.parent() else { continue };
        let styled = is_style_value(owner);
        if !styled && !matches!(owner.kind(), NodeKind::ParameterValue | NodeKind::ArgDefault) {
            continue;
        }
        scan(text, styled, &mut found);
    }
    found.sort_by_key(|(start, end, _)| (*start, *end));
    found
        .into_iter()
        .map(|(start, end, color)| ColorInformation {
            range: range_from_offsets(document, start, end),
            color,
        })
        .collect()
}

fn is_style_value(node: Node<'_>) -> bool {
    node.is(NodeKind::AttrValue) && node.parent().and_then(|attr| attr.name()) == Some("style")
}

fn scan(text: Node<'_>, named: bool, found: &mut Vec<(usize, usize, Color)>) {
    let base = text.start();
    let source = text.text();
    let mut taken: Vec<(usize, usize)> = Vec::new();

    for caps in HEX.captures_iter(source) {
        let Some(m) = caps.get(1) else { continue };
        if let Some(color) = parse_hex(&m.as_str()[1..]) {
            taken.push((m.start(), m.end()));
            found.push((base + m.start(), base + m.end(), color));
        }
    }
    for caps in FUNCTION.captures_iter(source) {
        let (Some(whole), Some(name), Some(args)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if let Some(color) = parse_function(name.as_str(), args.as_str()) {
            taken.push((whole.start(), whole.end()));
            found.push((base + whole.start(), base + whole.end(), color));
        }
    }
    if !named {
        return;
    }
    for word in WORD.find_iter(source) {
        let boundary =
            |c: Option<char>| c.map_or(true, |c| !(c.is_alphanumeric() || c == '-' || c == '_'));
        if !boundary(source[..word.start()].chars().next_back())
            || !boundary(source[word.end()..].chars().next())
            || taken.iter().any(|(s, e)| word.start() < *e && *s < word.end())
        {
            continue;
        }
        let lower = word.as_str().to_lowercase();
        if let Some((_, rgb)) = NAMED.iter().find(|(name, _)| *name == lower) {
            found.push((base + word.start(), base + word.end(), from_rgb(*rgb, 1.0)));
        }
    }
}

fn from_rgb(rgb: u32, alpha: f64) -> Color {
    let channel = |shift: u32| f64::from((rgb >> shift) & 0xff) / 255.0;
    color(channel(16), channel(8), channel(0), alpha)
}

fn color(red: f64, green: f64, blue: f64, alpha: f64) -> Color {
    Color {
        red: red.clamp(0.0, 1.0) as f32,
        green: green.clamp(0.0, 1.0) as f32,
        blue: blue.clamp(0.0, 1.0) as f32,
        alpha: alpha.clamp(0.0, 1.0) as f32,
    }
}

fn parse_hex(digits: &str) -> Option<Color> {
    let expanded: String = match digits.len() {
        3 | 4 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => digits.to_string(),
        _ => return None,
    };
    let value = u32::from_str_radix(&expanded, 16).ok()?;
    if expanded.len() == 8 {
        Some(from_rgb(value >> 8, f64::from(value & 0xff) / 255.0))
    } else {
        Some(from_rgb(value, 1.0))
    }
}

/// A number, or a percentage scaled so that `100%` equals `full`.
fn number(token: &str, full: f64) -> Option<f64> {
    match token.strip_suffix('%') {
        Some(percent) => Some(percent.parse::<f64>().ok()? / 100.0 * full),
        None => token.parse().ok(),
    }
}

fn hue(token: &str) -> Option<f64> {
    let lower = token.to_ascii_lowercase();
    if let Some(turns) = lower.strip_suffix("turn") {
        return Some(turns.parse::<f64>().ok()? * 360.0);
    }
    if let Some(radians) = lower.strip_suffix("rad") {
        return Some(radians.parse::<f64>().ok()?.to_degrees());
    }
    lower.strip_suffix("deg").unwrap_or(&lower).parse().ok()
}

fn parse_function(name: &str, args: &str) -> Option<Color> {
    let tokens: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.len() != 3 && tokens.len() != 4 {
        return None;
    }
    let alpha = match tokens.get(3) {
        Some(token) => number(token, 1.0)?,
        None => 1.0,
    };
    if name.to_ascii_lowercase().starts_with("rgb") {
        let red = number(tokens[0], 255.0)? / 255.0;
        let green = number(tokens[1], 255.0)? / 255.0;
        let blue = number(tokens[2], 255.0)? / 255.0;
        return Some(color(red, green, blue, alpha));
    }
    let h = hue(tokens[0])?.rem_euclid(360.0);
    let s = (number(tokens[1], 100.0)? / 100.0).clamp(0.0, 1.0);
    let l = (number(tokens[2], 100.0)? / 100.0).clamp(0.0, 1.0);
    let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = chroma * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - chroma / 2.0;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    Some(color(r + m, g + m, b + m, alpha))
}

fn hex_channel(value: f32) -> u8 {
    (f64::from(value) * 255.0 + 1e-4).round().clamp(0.0, 255.0) as u8
}

/// `#rrggbb`, or `#rrggbbaa` when the color is not opaque.
pub fn color_presentations(color: Color, range: Range) -> Vec<ColorPresentation> {
    let mut label = format!(
        "#{:02x}{:02x}{:02x}",
        hex_channel(color.red),
        hex_channel(color.green),
        hex_channel(color.blue)
    );
    if color.alpha < 1.0 {
        label.push_str(&format!("{:02x}", hex_channel(color.alpha)));
    }
    vec![ColorPresentation {
        text_edit: Some(TextEdit {
            range,
            new_text: label.clone(),
        }),
        label,
        additional_text_edits: None,
    }]
}
