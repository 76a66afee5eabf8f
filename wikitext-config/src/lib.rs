//! Settings loader for the wikitext language server.
//!
//! `defaults/wikitext.default.toml` is embedded into the binary and describes every setting
//! the server understands. The `wikiparser` section a client returns from
//! `workspace/configuration` is layered on top of those defaults via [`Loader`] before
//! deserializing into [`WikitextSettings`].
//!
//! Parser configuration files (namespaces, tag lists, magic words) are plain JSON and are
//! read with [`load_parser_config`]. A relative `config` path is resolved against the
//! workspace root the client reported at initialization, or the server's working directory
//! when there is none.

use std::fs;
use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use wikitext_parser::ParserConfig;

const DEFAULT_TOML: &str = include_str!("../defaults/wikitext.default.toml");

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("failed to read parser config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid parser config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode client settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-document settings of the language server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WikitextSettings {
    pub linter: LinterSettings,
    pub inlay: bool,
    pub completion: bool,
    pub color: bool,
    pub hover: bool,
    pub signature: bool,
    /// URL template for wiki links, `$1` standing for the title.
    pub article_path: String,
    /// Path of a JSON parser configuration, relative to the workspace root.
    pub config: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinterSettings {
    pub enable: bool,
    pub severity: Severity,
    pub lilypond: String,
    pub mathjax: String,
}

/// Which lint problems are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Severity {
    #[serde(rename = "errors only")]
    ErrorsOnly,
    #[serde(rename = "errors and warnings")]
    ErrorsAndWarnings,
}

impl Default for WikitextSettings {
    fn default() -> Self {
        Self {
            linter: LinterSettings {
                enable: true,
                severity: Severity::ErrorsOnly,
                lilypond: String::new(),
                mathjax: String::new(),
            },
            inlay: true,
            completion: true,
            color: true,
            hover: true,
            signature: true,
            article_path: String::new(),
            config: String::new(),
        }
    }
}

impl WikitextSettings {
    pub fn warnings(&self) -> bool {
        self.linter.severity == Severity::ErrorsAndWarnings
    }

    /// Location of the `config` file, if one is set. Relative paths are joined onto `root`.
    pub fn config_path(&self, root: Option<&Path>) -> Option<PathBuf> {
        if self.config.is_empty() {
            return None;
        }
        let path = Path::new(&self.config);
        Some(match root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        })
    }

    /// Parser configuration for documents governed by these settings.
    ///
    /// Reads the `config` file when one is set; otherwise starts from the built-in
    /// configuration. A non-empty `article_path` always wins over the file's.
    pub fn parser_config(&self, root: Option<&Path>) -> Result<ParserConfig, SettingsError> {
        let parser = match self.config_path(root) {
            Some(path) => load_parser_config(path)?,
            None => ParserConfig::default(),
        };
        Ok(self.with_article_path(parser))
    }

    /// Like [`parser_config`](Self::parser_config), but an unreadable `config` file falls
    /// back to the built-in configuration. The error is handed back for reporting.
    pub fn parser_config_or_default(
        &self,
        root: Option<&Path>,
    ) -> (ParserConfig, Option<SettingsError>) {
        match self.parser_config(root) {
            Ok(parser) => (parser, None),
            Err(err) => (self.with_article_path(ParserConfig::default()), Some(err)),
        }
    }

    fn with_article_path(&self, mut parser: ParserConfig) -> ParserConfig {
        if !self.article_path.is_empty() {
            parser.article_path = self.article_path.clone();
        }
        parser
    }
}

/// Helper for layering client settings over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer the settings object sent by the client.
    ///
    /// Keys are camelCase on the wire and converted to the snake_case names used by the
    /// defaults. `null` entries are dropped so they leave the default in place; anything
    /// other than an object is ignored.
    pub fn with_client_settings(mut self, value: &Value) -> Result<Self, SettingsError> {
        if let Value::Object(map) = value {
            let normalized = Value::Object(normalize_keys(map));
            let json = serde_json::to_string(&normalized)?;
            self.builder = self
                .builder
                .add_source(File::from_str(&json, FileFormat::Json));
        }
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting settings.
    pub fn build(self) -> Result<WikitextSettings, SettingsError> {
        Ok(self.builder.build()?.try_deserialize()?)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn normalize_keys(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::Object(inner) => Value::Object(normalize_keys(inner)),
                other => other.clone(),
            };
            (snake_case(key), value)
        })
        .collect()
}

/// Settings from a client `wikiparser` section layered over the defaults.
pub fn load_client_settings(value: &Value) -> Result<WikitextSettings, SettingsError> {
    Loader::new().with_client_settings(value)?.build()
}

/// Read a JSON parser configuration. Missing fields keep their built-in values.
pub fn load_parser_config(path: impl AsRef<Path>) -> Result<ParserConfig, SettingsError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_default_config() {
        let settings = Loader::new().build().expect("defaults to deserialize");
        assert_eq!(settings, WikitextSettings::default());
        assert!(!settings.warnings());
    }

    #[test]
    fn client_severity_enables_warnings() {
        let settings = load_client_settings(&json!({
            "linter": {"severity": "errors and warnings"}
        }))
        .expect("client settings to apply");
        assert!(settings.warnings());
        assert!(settings.linter.enable);
    }

    #[test]
    fn layers_camel_case_client_settings() {
        let settings = load_client_settings(&json!({
            "linter": {"enable": false, "mathjax": null},
            "articlePath": "https://en.wikipedia.org/wiki/",
            "hover": false,
            "unknown": 1
        }))
        .expect("client settings to apply");
        assert!(!settings.linter.enable);
        assert_eq!(settings.linter.severity, Severity::ErrorsOnly);
        assert_eq!(settings.article_path, "https://en.wikipedia.org/wiki/");
        assert!(!settings.hover);
        assert!(settings.inlay);
    }

    #[test]
    fn non_object_payloads_keep_defaults() {
        let settings = load_client_settings(&Value::Null).expect("defaults");
        assert_eq!(settings, WikitextSettings::default());
    }

    #[test]
    fn parser_config_prefers_article_path() {
        let settings = WikitextSettings {
            article_path: "//example.org/$1".to_string(),
            ..WikitextSettings::default()
        };
        let parser = settings.parser_config(None).expect("built-in parser config");
        assert_eq!(parser.article_path, "//example.org/$1");
    }

    #[test]
    fn relative_config_paths_join_the_root() {
        let settings = WikitextSettings {
            config: "site/config.json".to_string(),
            ..WikitextSettings::default()
        };
        let root = Path::new("/workspace");
        assert_eq!(
            settings.config_path(Some(root)),
            Some(PathBuf::from("/workspace/site/config.json"))
        );
        assert_eq!(
            settings.config_path(None),
            Some(PathBuf::from("site/config.json"))
        );
        let absolute = WikitextSettings {
            config: "/etc/wiki.json".to_string(),
            ..WikitextSettings::default()
        };
        assert_eq!(
            absolute.config_path(Some(root)),
            Some(PathBuf::from("/etc/wiki.json"))
        );
        assert_eq!(WikitextSettings::default().config_path(Some(root)), None);
    }

    #[test]
    fn reports_missing_parser_config() {
        let settings = WikitextSettings {
            config: "/nonexistent/wikitext-parser-config.json".to_string(),
            ..WikitextSettings::default()
        };
        assert!(matches!(
            settings.parser_config(None),
            Err(SettingsError::Read { .. })
        ));
    }

    #[test]
    fn unreadable_parser_config_keeps_article_path() {
        let settings = WikitextSettings {
            config: "/nonexistent/wikitext-parser-config.json".to_string(),
            article_path: "https://example.org/wiki/$1".to_string(),
            ..WikitextSettings::default()
        };
        let (parser, err) = settings.parser_config_or_default(None);
        assert!(matches!(err, Some(SettingsError::Read { .. })));
        assert_eq!(parser.article_path, "https://example.org/wiki/$1");
        assert_eq!(parser.namespaces, ParserConfig::default().namespaces);
    }
}
