use std::sync::Arc;

use serde_json::{json, Value};
use tower_lsp::async_trait;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{
    ConfigurationItem, DidChangeTextDocumentParams, DidOpenTextDocumentParams,
    DocumentDiagnosticParams, DocumentDiagnosticReport, DocumentDiagnosticReportResult,
    DocumentLinkParams, InitializeParams, InitializedParams, InlayHintLabel, InlayHintParams,
    Position, Range, TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem,
    Url, VersionedTextDocumentIdentifier,
};
use tower_lsp::LanguageServer;
use wikitext_lsp::{DefaultFeatureProvider, LspClient, WikitextLanguageServer};

/// An editor that answers configuration requests with fixed settings.
#[derive(Clone)]
struct Editor {
    settings: Value,
}

#[async_trait]
impl LspClient for Editor {
    async fn configuration(&self, items: Vec<ConfigurationItem>) -> Result<Vec<Value>> {
        Ok(items.iter().map(|_| self.settings.clone()).collect())
    }
}

fn uri() -> Url {
    Url::parse("file:///workspace/Page.wiki").unwrap()
}

fn identifier() -> TextDocumentIdentifier {
    TextDocumentIdentifier { uri: uri() }
}

async fn start(settings: Value, text: &str) -> WikitextLanguageServer<Editor> {
    let server = WikitextLanguageServer::with_features(
        Editor { settings },
        Arc::new(DefaultFeatureProvider::new()),
    );
    server.initialize(InitializeParams::default()).await.unwrap();
    server.initialized(InitializedParams {}).await;
    server
        .did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri(),
                language_id: "wikitext".into(),
                version: 1,
                text: text.to_string(),
            },
        })
        .await;
    server
}

async fn change(server: &WikitextLanguageServer<Editor>, version: i32, text: &str) {
    server
        .did_change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: uri(),
                version,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: text.to_string(),
            }],
        })
        .await;
}

#[tokio::test]
async fn implicit_parameter_keys_are_hinted() {
    let server = start(json!({}), "{{a|b=|c}}").await;
    let hints = server
        .inlay_hint(InlayHintParams {
            work_done_progress_params: Default::default(),
            text_document: identifier(),
            range: Range::new(Position::new(0, 0), Position::new(0, 10)),
        })
        .await
        .unwrap()
        .unwrap();
    let hints: Vec<_> = hints
        .into_iter()
        .map(|hint| match hint.label {
            InlayHintLabel::String(label) => (hint.position, label),
            InlayHintLabel::LabelParts(_) => panic!("expected a plain label"),
        })
        .collect();
    assert_eq!(hints, vec![(Position::new(0, 7), "1=".to_string())]);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn protocol_relative_links_resolve_to_https() {
    let text = "\n[[ : help : a#a ]]\n{{ b }}\n{{ #invoke: c | c }}\nRFC 1\nPMID 1\nISBN 1-2-3-4-5-6-7-8-9-0\n[//d d]\n";
    let server = start(json!({"articlePath": "https://mediawiki.org/wiki/$1"}), text).await;
    let links = server
        .document_link(DocumentLinkParams {
            text_document: identifier(),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        })
        .await
        .unwrap()
        .unwrap();
    let external = links
        .iter()
        .find(|link| link.range.start.line == 7)
        .expect("link on line 7");
    assert_eq!(
        external.range,
        Range::new(Position::new(7, 1), Position::new(7, 4))
    );
    assert_eq!(external.target.as_ref().unwrap().as_str(), "https://d/");
    assert_eq!(
        links[0].target.as_ref().unwrap().as_str(),
        "https://mediawiki.org/wiki/Help%3AA#a"
    );
}

#[tokio::test]
async fn edits_are_reflected_in_later_requests() {
    let server = start(json!({"linter": {"severity": "errors and warnings"}}), "== a ==").await;
    let params = || DocumentDiagnosticParams {
        text_document: identifier(),
        identifier: None,
        previous_result_id: None,
        work_done_progress_params: Default::default(),
        partial_result_params: Default::default(),
    };
    let items = |result: DocumentDiagnosticReportResult| match result {
        DocumentDiagnosticReportResult::Report(DocumentDiagnosticReport::Full(report)) => {
            report.full_document_diagnostic_report.items
        }
        other => panic!("expected a full report, got {other:?}"),
    };

    assert!(items(server.diagnostic(params()).await.unwrap()).is_empty());
    change(&server, 2, "x").await;
    change(&server, 3, "</br>").await;
    let diagnostics = items(server.diagnostic(params()).await.unwrap());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].range,
        Range::new(Position::new(0, 0), Position::new(0, 5))
    );
}
