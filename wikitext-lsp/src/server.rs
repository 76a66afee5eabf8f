//! Main language server implementation

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tower_lsp::async_trait;
use tower_lsp::jsonrpc::{self, ErrorCode, Result};
use tower_lsp::lsp_types::{
    CodeActionKind, CodeActionOptions, CodeActionOrCommand, CodeActionParams,
    CodeActionProviderCapability, CodeActionResponse, Color, ColorInformation,
    ColorPresentation, ColorPresentationParams, ColorProviderCapability, CompletionItem,
    CompletionOptions, CompletionParams, CompletionResponse, ConfigurationItem, Diagnostic,
    DiagnosticOptions, DiagnosticServerCapabilities, DidChangeConfigurationParams,
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DocumentColorParams, DocumentDiagnosticParams, DocumentDiagnosticReport,
    DocumentDiagnosticReportResult, DocumentHighlight, DocumentHighlightParams, DocumentLink,
    DocumentLinkOptions, DocumentLinkParams, DocumentSymbol, DocumentSymbolOptions,
    DocumentSymbolParams, DocumentSymbolResponse, FoldingRange, FoldingRangeParams,
    FoldingRangeProviderCapability, FullDocumentDiagnosticReport, GotoDefinitionParams,
    GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability, InitializeParams,
    InitializeResult, InitializedParams, InlayHint, InlayHintParams, Location, OneOf, Position,
    PrepareRenameResponse, Range, ReferenceParams, Registration,
    RelatedFullDocumentDiagnosticReport, RenameOptions, RenameParams, ServerCapabilities,
    ServerInfo, SignatureHelp, SignatureHelpOptions, SignatureHelpParams,
    TextDocumentPositionParams, TextDocumentSyncCapability, TextDocumentSyncKind, TextEdit, Url,
    WorkDoneProgressOptions, WorkspaceEdit,
};
use tower_lsp::Client;
use tracing::{debug, info, warn};
use wikitext_parser::{ParserConfig, SyntaxTree, WikitextParser};

use crate::document::{DocumentStore, TextDocument};
use crate::features::code_actions::compute_code_actions;
use crate::features::color::{collect_document_colors, color_presentations};
use crate::features::completion::compute_completions;
use crate::features::diagnostics::collect_diagnostics;
use crate::features::embedded::{external_diagnostics, json_diagnostics};
use crate::features::folding_ranges::collect_folding_ranges;
use crate::features::hover::compute_hover;
use crate::features::inlay_hints::collect_inlay_hints;
use crate::features::links::collect_document_links;
use crate::features::references::{
    document_highlights, find_definition, find_references, prepare_rename, rename_edits,
};
use crate::features::signature_help::{compute_signature_help, signature_snippet};
use crate::features::symbols::collect_document_symbols;
use crate::settings::{Settings, SettingsCache};
use crate::task::TaskError;
use crate::tasks::{Parsed, TaskRegistry};

/// The requests the server sends to the client.
#[async_trait]
pub trait LspClient: Send + Sync + Clone + 'static {
    async fn configuration(&self, _items: Vec<ConfigurationItem>) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn register_capability(&self, _registrations: Vec<Registration>) -> Result<()> {
        Ok(())
    }

    async fn workspace_diagnostic_refresh(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl LspClient for Client {
    async fn configuration(&self, items: Vec<ConfigurationItem>) -> Result<Vec<Value>> {
        Client::configuration(self, items).await
    }

    async fn register_capability(&self, registrations: Vec<Registration>) -> Result<()> {
        Client::register_capability(self, registrations).await
    }

    async fn workspace_diagnostic_refresh(&self) -> Result<()> {
        Client::workspace_diagnostic_refresh(self).await
    }
}

pub trait FeatureProvider: Send + Sync + 'static {
    fn diagnostics(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        warnings: bool,
    ) -> Vec<Diagnostic>;
    fn code_actions(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        range: Range,
        diagnostics: &[Diagnostic],
        only: Option<&[CodeActionKind]>,
    ) -> Vec<CodeActionOrCommand>;
    fn completions(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        config: &ParserConfig,
        position: Position,
    ) -> Vec<CompletionItem>;
    fn document_colors(&self, document: &TextDocument, tree: &SyntaxTree) -> Vec<ColorInformation>;
    fn color_presentations(&self, color: Color, range: Range) -> Vec<ColorPresentation>;
    fn references(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Vec<Range>>;
    fn document_highlights(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Vec<DocumentHighlight>>;
    fn definition(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Vec<Range>>;
    fn prepare_rename(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Range>;
    fn rename(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
        new_name: &str,
    ) -> Option<Vec<TextEdit>>;
    fn document_links(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        config: &ParserConfig,
    ) -> Vec<DocumentLink>;
    fn folding_ranges(&self, document: &TextDocument, tree: &SyntaxTree) -> Vec<FoldingRange>;
    fn document_symbols(&self, document: &TextDocument, tree: &SyntaxTree) -> Vec<DocumentSymbol>;
    fn hover(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Hover>;
    fn signature_help(&self, snippet: &SyntaxTree, cursor: usize) -> Option<SignatureHelp>;
    fn inlay_hints(&self, document: &TextDocument, tree: &SyntaxTree) -> Vec<InlayHint>;
}

#[derive(Default)]
pub struct DefaultFeatureProvider;

impl DefaultFeatureProvider {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureProvider for DefaultFeatureProvider {
    fn diagnostics(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        warnings: bool,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = collect_diagnostics(document, tree, warnings);
        diagnostics.extend(json_diagnostics(document, tree));
        diagnostics
    }

    fn code_actions(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        range: Range,
        diagnostics: &[Diagnostic],
        only: Option<&[CodeActionKind]>,
    ) -> Vec<CodeActionOrCommand> {
        compute_code_actions(document, tree, range, diagnostics, only)
    }

    fn completions(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        config: &ParserConfig,
        position: Position,
    ) -> Vec<CompletionItem> {
        compute_completions(document, tree, config, position)
    }

    fn document_colors(&self, document: &TextDocument, tree: &SyntaxTree) -> Vec<ColorInformation> {
        collect_document_colors(document, tree)
    }

    fn color_presentations(&self, color: Color, range: Range) -> Vec<ColorPresentation> {
        color_presentations(color, range)
    }

    fn references(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Vec<Range>> {
        find_references(document, tree, position)
    }

    fn document_highlights(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Vec<DocumentHighlight>> {
        document_highlights(document, tree, position)
    }

    fn definition(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Vec<Range>> {
        find_definition(document, tree, position)
    }

    fn prepare_rename(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Range> {
        prepare_rename(document, tree, position)
    }

    fn rename(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
        new_name: &str,
    ) -> Option<Vec<TextEdit>> {
        rename_edits(document, tree, position, new_name)
    }

    fn document_links(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        config: &ParserConfig,
    ) -> Vec<DocumentLink> {
        collect_document_links(document, tree, config, &config.article_path)
    }

    fn folding_ranges(&self, document: &TextDocument, tree: &SyntaxTree) -> Vec<FoldingRange> {
        collect_folding_ranges(document, tree)
    }

    fn document_symbols(&self, document: &TextDocument, tree: &SyntaxTree) -> Vec<DocumentSymbol> {
        collect_document_symbols(document, tree)
    }

    fn hover(
        &self,
        document: &TextDocument,
        tree: &SyntaxTree,
        position: Position,
    ) -> Option<Hover> {
        compute_hover(document, tree, position)
    }

    fn signature_help(&self, snippet: &SyntaxTree, cursor: usize) -> Option<SignatureHelp> {
        compute_signature_help(snippet, cursor)
    }

    fn inlay_hints(&self, document: &TextDocument, tree: &SyntaxTree) -> Vec<InlayHint> {
        collect_inlay_hints(document, tree)
    }
}

pub const SERVER_NAME: &str = "wikitext-lsp";

const COMPLETION_TRIGGERS: &[&str] = &["#", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
const SIGNATURE_TRIGGERS: &[&str] = &[":", "：", "|"];

fn server_capabilities() -> ServerCapabilities {
    let strings = |values: &[&str]| values.iter().map(|value| value.to_string()).collect();
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
        diagnostic_provider: Some(DiagnosticServerCapabilities::Options(DiagnosticOptions {
            identifier: None,
            inter_file_dependencies: false,
            workspace_diagnostics: false,
            work_done_progress_options: WorkDoneProgressOptions::default(),
        })),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: Some(vec![
                CodeActionKind::QUICKFIX,
                CodeActionKind::REFACTOR_REWRITE,
                CodeActionKind::SOURCE_FIX_ALL,
            ]),
            work_done_progress_options: WorkDoneProgressOptions::default(),
            resolve_provider: None,
        })),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(strings(COMPLETION_TRIGGERS)),
            ..CompletionOptions::default()
        }),
        color_provider: Some(ColorProviderCapability::Simple(true)),
        references_provider: Some(OneOf::Left(true)),
        document_highlight_provider: Some(OneOf::Left(true)),
        definition_provider: Some(OneOf::Left(true)),
        rename_provider: Some(OneOf::Right(RenameOptions {
            prepare_provider: Some(true),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        })),
        document_link_provider: Some(DocumentLinkOptions {
            resolve_provider: None,
            work_done_progress_options: WorkDoneProgressOptions::default(),
        }),
        folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
        document_symbol_provider: Some(OneOf::Right(DocumentSymbolOptions {
            label: Some("Sections".to_string()),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        })),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        signature_help_provider: Some(SignatureHelpOptions {
            trigger_characters: Some(strings(SIGNATURE_TRIGGERS)),
            retrigger_characters: None,
            work_done_progress_options: WorkDoneProgressOptions::default(),
        }),
        inlay_hint_provider: Some(OneOf::Left(true)),
        ..ServerCapabilities::default()
    }
}

fn internal_error(err: TaskError) -> jsonrpc::Error {
    jsonrpc::Error {
        code: ErrorCode::InternalError,
        message: err.to_string().into(),
        data: None,
    }
}

/// Local path of the first workspace folder, or of the root URI for older clients.
fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    #[allow(deprecated)]
    let root_uri = params.root_uri.as_ref();
    params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(root_uri)
        .and_then(|uri| uri.to_file_path().ok())
}

fn single_file_edit(uri: &Url, edits: Vec<TextEdit>) -> WorkspaceEdit {
    WorkspaceEdit {
        changes: Some(HashMap::from([(uri.clone(), edits)])),
        document_changes: None,
        change_annotations: None,
    }
}

fn full_report(items: Vec<Diagnostic>) -> DocumentDiagnosticReportResult {
    DocumentDiagnosticReportResult::Report(DocumentDiagnosticReport::Full(
        RelatedFullDocumentDiagnosticReport {
            related_documents: None,
            full_document_diagnostic_report: FullDocumentDiagnosticReport {
                result_id: None,
                items,
            },
        },
    ))
}

pub struct WikitextLanguageServer<C = Client, P = DefaultFeatureProvider> {
    client: C,
    documents: Arc<DocumentStore>,
    tasks: TaskRegistry,
    settings: SettingsCache,
    features: Arc<P>,
    /// Base directory of relative parser config paths.
    root: OnceCell<PathBuf>,
}

impl WikitextLanguageServer<Client, DefaultFeatureProvider> {
    pub fn new(client: Client) -> Self {
        Self::with_features(client, Arc::new(DefaultFeatureProvider::new()))
    }
}

impl<C, P> WikitextLanguageServer<C, P>
where
    C: LspClient,
    P: FeatureProvider,
{
    pub fn with_features(client: C, features: Arc<P>) -> Self {
        let documents = Arc::new(DocumentStore::default());
        Self {
            client,
            tasks: TaskRegistry::new(Arc::clone(&documents)),
            documents,
            settings: SettingsCache::default(),
            features,
            root: OnceCell::new(),
        }
    }

    /// Point the document's parser at the configuration its settings ask for.
    async fn configure(&self, uri: &Url) {
        let settings = self.settings.get(&self.client, uri).await;
        let root = self.root.get().map(PathBuf::as_path);
        let (config, err) = settings.parser_config_or_default(root);
        if let Some(err) = err {
            warn!(%uri, error = %err, "using the built-in parser configuration");
        }
        self.tasks
            .set_parser(uri, Arc::new(WikitextParser::new(config)))
            .await;
    }

    /// Settings of an open document. Closed documents have none, so nothing is cached for
    /// them.
    async fn settings_for(&self, uri: &Url) -> Option<Arc<Settings>> {
        self.documents.get(uri).await?;
        Some(self.settings.get(&self.client, uri).await)
    }

    /// Current document and its tree. `Ok(None)` when the document is not open.
    async fn parsed(&self, uri: &Url) -> Result<Option<Parsed>> {
        match self.tasks.parse(uri).await {
            None => Ok(None),
            Some(Ok(parsed)) => Ok(Some(parsed)),
            Some(Err(err)) => {
                warn!(%uri, error = %err, "parse failed");
                Err(internal_error(err))
            }
        }
    }
}

#[async_trait]
impl<C, P> tower_lsp::LanguageServer for WikitextLanguageServer<C, P>
where
    C: LspClient,
    P: FeatureProvider,
{
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(root) = workspace_root(&params) {
            debug!(root = %root.display(), "workspace root");
            if self.root.set(root).is_err() {
                warn!("initialize received more than once; keeping the first workspace root");
            }
        }
        Ok(InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(ServerInfo {
                name: SERVER_NAME.to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let registration = Registration {
            id: "workspace/didChangeConfiguration".to_string(),
            method: "workspace/didChangeConfiguration".to_string(),
            register_options: None,
        };
        if let Err(err) = self.client.register_capability(vec![registration]).await {
            warn!(error = %err, "client refused configuration change notifications");
        }
        info!("{SERVER_NAME} initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        self.tasks.shutdown().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        debug!(uri = %item.uri, version = item.version, "did_open");
        self.documents
            .upsert(item.uri.clone(), item.version, item.text)
            .await;
        self.configure(&item.uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        if let Some(change) = params.content_changes.into_iter().last() {
            let identifier = params.text_document;
            self.documents
                .upsert(identifier.uri, identifier.version, change.text)
                .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        debug!(%uri, "did_close");
        self.documents.remove(&uri).await;
        self.tasks.remove(&uri).await;
        self.settings.remove(&uri).await;
    }

    async fn did_change_configuration(&self, _: DidChangeConfigurationParams) {
        self.settings.invalidate_all().await;
        for uri in self.documents.uris().await {
            self.configure(&uri).await;
        }
        if let Err(err) = self.client.workspace_diagnostic_refresh().await {
            debug!(error = %err, "diagnostic refresh not delivered");
        }
    }

    async fn diagnostic(
        &self,
        params: DocumentDiagnosticParams,
    ) -> Result<DocumentDiagnosticReportResult> {
        let uri = params.text_document.uri;
        let Some(settings) = self.settings_for(&uri).await else {
            return Ok(full_report(Vec::new()));
        };
        if !settings.linter.enable {
            return Ok(full_report(Vec::new()));
        }
        let Some(Parsed { document, tree }) = self.parsed(&uri).await? else {
            return Ok(full_report(Vec::new()));
        };
        let warnings = settings.warnings();
        let mut items = self.features.diagnostics(&document, &tree, warnings);
        items.extend(external_diagnostics(&document, &tree, &settings.linter, warnings).await);
        Ok(full_report(items))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let Some(Parsed { document, tree }) = self.parsed(&params.text_document.uri).await? else {
            return Ok(None);
        };
        let actions = self.features.code_actions(
            &document,
            &tree,
            params.range,
            &params.context.diagnostics,
            params.context.only.as_deref(),
        );
        Ok(Some(actions))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let TextDocumentPositionParams {
            text_document,
            position,
        } = params.text_document_position;
        let uri = text_document.uri;
        if !self.settings_for(&uri).await.is_some_and(|settings| settings.completion) {
            return Ok(None);
        }
        let Some(Parsed { document, tree }) = self.parsed(&uri).await? else {
            return Ok(None);
        };
        let parser = self.tasks.parser(&uri).await;
        let items = self
            .features
            .completions(&document, &tree, parser.config(), position);
        Ok((!items.is_empty()).then_some(CompletionResponse::Array(items)))
    }

    async fn document_color(&self, params: DocumentColorParams) -> Result<Vec<ColorInformation>> {
        let uri = params.text_document.uri;
        if !self.settings_for(&uri).await.is_some_and(|settings| settings.color) {
            return Ok(Vec::new());
        }
        let Some(Parsed { document, tree }) = self.parsed(&uri).await? else {
            return Ok(Vec::new());
        };
        Ok(self.features.document_colors(&document, &tree))
    }

    async fn color_presentation(
        &self,
        params: ColorPresentationParams,
    ) -> Result<Vec<ColorPresentation>> {
        Ok(self.features.color_presentations(params.color, params.range))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let TextDocumentPositionParams {
            text_document,
            position,
        } = params.text_document_position;
        let uri = text_document.uri;
        let Some(Parsed { document, tree }) = self.parsed(&uri).await? else {
            return Ok(None);
        };
        Ok(self
            .features
            .references(&document, &tree, position)
            .map(|ranges| {
                ranges
                    .into_iter()
                    .map(|range| Location::new(uri.clone(), range))
                    .collect()
            }))
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        let TextDocumentPositionParams {
            text_document,
            position,
        } = params.text_document_position_params;
        let Some(Parsed { document, tree }) = self.parsed(&text_document.uri).await? else {
            return Ok(None);
        };
        Ok(self.features.document_highlights(&document, &tree, position))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let TextDocumentPositionParams {
            text_document,
            position,
        } = params.text_document_position_params;
        let uri = text_document.uri;
        let Some(Parsed { document, tree }) = self.parsed(&uri).await? else {
            return Ok(None);
        };
        Ok(self
            .features
            .definition(&document, &tree, position)
            .map(|ranges| {
                GotoDefinitionResponse::Array(
                    ranges
                        .into_iter()
                        .map(|range| Location::new(uri.clone(), range))
                        .collect(),
                )
            }))
    }

    async fn prepare_rename(
        &self,
        params: TextDocumentPositionParams,
    ) -> Result<Option<PrepareRenameResponse>> {
        let Some(Parsed { document, tree }) = self.parsed(&params.text_document.uri).await? else {
            return Ok(None);
        };
        Ok(self
            .features
            .prepare_rename(&document, &tree, params.position)
            .map(PrepareRenameResponse::Range))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let TextDocumentPositionParams {
            text_document,
            position,
        } = params.text_document_position;
        let uri = text_document.uri;
        let Some(Parsed { document, tree }) = self.parsed(&uri).await? else {
            return Ok(None);
        };
        Ok(self
            .features
            .rename(&document, &tree, position, &params.new_name)
            .map(|edits| single_file_edit(&uri, edits)))
    }

    async fn document_link(&self, params: DocumentLinkParams) -> Result<Option<Vec<DocumentLink>>> {
        let uri = params.text_document.uri;
        let Some(Parsed { document, tree }) = self.parsed(&uri).await? else {
            return Ok(None);
        };
        let parser = self.tasks.parser(&uri).await;
        Ok(Some(self.features.document_links(&document, &tree, parser.config())))
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        let Some(Parsed { document, tree }) = self.parsed(&params.text_document.uri).await? else {
            return Ok(None);
        };
        Ok(Some(self.features.folding_ranges(&document, &tree)))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(Parsed { document, tree }) = self.parsed(&params.text_document.uri).await? else {
            return Ok(None);
        };
        let symbols = self.features.document_symbols(&document, &tree);
        Ok(Some(DocumentSymbolResponse::Nested(symbols)))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let TextDocumentPositionParams {
            text_document,
            position,
        } = params.text_document_position_params;
        let uri = text_document.uri;
        if !self.settings_for(&uri).await.is_some_and(|settings| settings.hover) {
            return Ok(None);
        }
        let Some(Parsed { document, tree }) = self.parsed(&uri).await? else {
            return Ok(None);
        };
        Ok(self.features.hover(&document, &tree, position))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let TextDocumentPositionParams {
            text_document,
            position,
        } = params.text_document_position_params;
        let uri = text_document.uri;
        if !self.settings_for(&uri).await.is_some_and(|settings| settings.signature) {
            return Ok(None);
        }
        let Some(document) = self.documents.get(&uri).await else {
            return Ok(None);
        };
        let (snippet, cursor) = signature_snippet(&document, position);
        let tree = self
            .tasks
            .parse_signature(&uri, &snippet)
            .await
            .map_err(internal_error)?;
        Ok(self.features.signature_help(&tree, cursor))
    }

    async fn inlay_hint(&self, params: InlayHintParams) -> Result<Option<Vec<InlayHint>>> {
        let uri = params.text_document.uri;
        if !self.settings_for(&uri).await.is_some_and(|settings| settings.inlay) {
            return Ok(None);
        }
        let Some(Parsed { document, tree }) = self.parsed(&uri).await? else {
            return Ok(None);
        };
        Ok(Some(self.features.inlay_hints(&document, &tree)))
    }
}
