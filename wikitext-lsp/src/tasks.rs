//! Per-document reparse tasks.
//!
//! Every open document gets a primary task for its own text and, on demand, a secondary
//! task used by signature help to parse synthetic snippets without evicting the primary
//! tree.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tower_lsp::lsp_types::Url;
use tracing::debug;
use wikitext_parser::{Parser, SyntaxTree, WikitextParser};

use crate::document::{DocumentStore, TextDocument};
use crate::task::{ReparseTask, TaskError};

#[derive(Default)]
struct DocumentTasks {
    primary: Option<Arc<ReparseTask>>,
    signature: Option<Arc<ReparseTask>>,
    parser: Option<Arc<dyn Parser>>,
}

/// A document snapshot together with the tree parsed from exactly that text.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub document: Arc<TextDocument>,
    pub tree: Arc<SyntaxTree>,
}

pub struct TaskRegistry {
    documents: Arc<DocumentStore>,
    default_parser: Arc<dyn Parser>,
    tasks: Mutex<HashMap<Url, DocumentTasks>>,
}

impl TaskRegistry {
    pub fn new(documents: Arc<DocumentStore>) -> Self {
        Self::with_parser(documents, Arc::new(WikitextParser::default()))
    }

    pub fn with_parser(documents: Arc<DocumentStore>, default_parser: Arc<dyn Parser>) -> Self {
        Self {
            documents,
            default_parser,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Parser used for `uri`.
    pub async fn parser(&self, uri: &Url) -> Arc<dyn Parser> {
        self.tasks
            .lock()
            .await
            .get(uri)
            .and_then(|entry| entry.parser.clone())
            .unwrap_or_else(|| Arc::clone(&self.default_parser))
    }

    /// Switch the parser of `uri`. Existing tasks are closed so later requests reparse
    /// with the new configuration.
    pub async fn set_parser(&self, uri: &Url, parser: Arc<dyn Parser>) {
        let old = {
            let mut tasks = self.tasks.lock().await;
            let entry = tasks.entry(uri.clone()).or_default();
            entry.parser = Some(parser);
            [entry.primary.take(), entry.signature.take()]
        };
        for task in old.into_iter().flatten() {
            task.close().await;
        }
    }

    async fn task(&self, uri: &Url, signature: bool) -> Arc<ReparseTask> {
        let mut tasks = self.tasks.lock().await;
        let entry = tasks.entry(uri.clone()).or_default();
        let parser = entry
            .parser
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.default_parser));
        let slot = if signature {
            &mut entry.signature
        } else {
            &mut entry.primary
        };
        Arc::clone(slot.get_or_insert_with(|| {
            debug!(%uri, signature, "creating parse task");
            ReparseTask::new(parser)
        }))
    }

    /// Parse the current text of an open document. `None` when the document is not open.
    pub async fn parse(&self, uri: &Url) -> Option<Result<Parsed, TaskError>> {
        let document = self.documents.get(uri).await?;
        let task = self.task(uri, false).await;
        let tree = match task.queue(document.text()).await {
            Ok(tree) => tree,
            Err(err) => return Some(Err(err)),
        };
        // The tree may belong to a newer text than the snapshot we started with.
        let document = match self.documents.get(uri).await {
            Some(latest) if latest.text() == tree.text() => latest,
            _ if document.text() == tree.text() => document,
            _ => Arc::new(TextDocument::new(
                uri.clone(),
                document.version(),
                tree.source(),
            )),
        };
        Some(Ok(Parsed { document, tree }))
    }

    /// Parse a synthetic text on the secondary task of `uri`.
    pub async fn parse_signature(
        &self,
        uri: &Url,
        text: &str,
    ) -> Result<Arc<SyntaxTree>, TaskError> {
        self.task(uri, true).await.queue(text).await
    }

    /// Forget everything about `uri`.
    pub async fn remove(&self, uri: &Url) {
        let entry = self.tasks.lock().await.remove(uri);
        if let Some(entry) = entry {
            for task in [entry.primary, entry.signature].into_iter().flatten() {
                task.close().await;
            }
        }
    }

    pub async fn shutdown(&self) {
        let entries: Vec<_> = self.tasks.lock().await.drain().collect();
        for (_, entry) in entries {
            for task in [entry.primary, entry.signature].into_iter().flatten() {
                task.close().await;
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.tasks
            .lock()
            .await
            .values()
            .filter(|entry| entry.primary.is_some() || entry.signature.is_some())
            .count()
    }
}
