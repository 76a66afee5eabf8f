use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;
use wikitext_lsp::WikitextLanguageServer;

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_env("WIKITEXT_LSP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let (service, socket) = LspService::new(WikitextLanguageServer::new);
    Server::new(stdin(), stdout(), socket).serve(service).await;
}
