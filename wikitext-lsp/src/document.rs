//! Open documents as sent by the client.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tower_lsp::lsp_types::Url;

/// One snapshot of an open document. Full sync replaces the whole snapshot on every change.
#[derive(Debug, Clone)]
pub struct TextDocument {
    uri: Url,
    version: i32,
    text: Arc<str>,
    /// Byte offset of the first byte of each line.
    line_starts: Vec<usize>,
}

impl TextDocument {
    pub fn new(uri: Url, version: i32, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self {
            uri,
            version,
            text,
            line_starts,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub(crate) fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }

    /// Text of line `line` without its line break, empty past the end.
    pub fn line(&self, line: usize) -> &str {
        let Some(&start) = self.line_starts.get(line) else {
            return "";
        };
        let end = self
            .line_starts
            .get(line + 1)
            .map_or(self.text.len(), |next| next - 1);
        &self.text[start..end]
    }
}

#[derive(Default)]
pub struct DocumentStore {
    entries: RwLock<HashMap<Url, Arc<TextDocument>>>,
}

impl DocumentStore {
    pub async fn upsert(&self, uri: Url, version: i32, text: String) -> Arc<TextDocument> {
        let document = Arc::new(TextDocument::new(uri.clone(), version, text));
        self.entries.write().await.insert(uri, Arc::clone(&document));
        document
    }

    pub async fn get(&self, uri: &Url) -> Option<Arc<TextDocument>> {
        self.entries.read().await.get(uri).cloned()
    }

    pub async fn remove(&self, uri: &Url) -> Option<Arc<TextDocument>> {
        self.entries.write().await.remove(uri)
    }

    pub async fn uris(&self) -> Vec<Url> {
        self.entries.read().await.keys().cloned().collect()
    }
}
