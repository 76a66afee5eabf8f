//! Documentation for behavior switches and magic words, shared by hover, completion and
//! signature help.

use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct SignatureParameter {
    pub label: String,
    /// The parameter only accepts its own label.
    #[serde(default, rename = "const")]
    pub constant: bool,
    /// The parameter may repeat.
    #[serde(default)]
    pub rest: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MagicWordInfo {
    pub aliases: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub signatures: Option<Vec<Vec<SignatureParameter>>>,
}

#[derive(Debug, Default, Deserialize)]
struct Table {
    behavior_switches: Vec<MagicWordInfo>,
    magic_words: Vec<MagicWordInfo>,
}

static TABLE: Lazy<Table> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../data/magic_words.json")).unwrap_or_else(|err| {
        warn!(error = %err, "embedded magic word table is invalid");
        Table::default()
    })
});

/// Documentation of a behavior switch by its canonical (lowercase) name.
pub fn behavior_switch(name: &str) -> Option<&'static MagicWordInfo> {
    let name = name.to_lowercase();
    TABLE
        .behavior_switches
        .iter()
        .find(|info| info.aliases.iter().any(|alias| *alias == name))
}

/// Documentation of a parser function or variable by its canonical name.
pub fn magic_word(name: &str) -> Option<&'static MagicWordInfo> {
    let bare = name.trim_start_matches('#');
    TABLE.magic_words.iter().find(|info| {
        info.aliases
            .iter()
            .any(|alias| alias == name || alias.trim_start_matches('#') == bare)
    })
}

/// Markdown for a magic word: one bullet per signature, then the description.
///
/// `written` is the name as it appears in the document and is echoed back verbatim.
pub fn render(info: &MagicWordInfo, written: &str) -> String {
    let Some(signatures) = &info.signatures else {
        return info.description.clone();
    };
    let bullets: Vec<String> = signatures
        .iter()
        .map(|params| {
            let opening = if params.is_empty() {
                format!("- **{{{{ {written}**")
            } else {
                format!("- **{{{{ {written}:** ")
            };
            let params: Vec<String> = params
                .iter()
                .map(|param| {
                    if param.constant {
                        param.label.clone()
                    } else {
                        format!("*{}*", param.label)
                    }
                })
                .collect();
            format!("{opening}{} **}}}}**", params.join(" **|** "))
        })
        .collect();
    format!("{}\n\n{}", bullets.join("\n"), info.description)
}
