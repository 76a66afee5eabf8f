//! Per-document settings fetched from the client.
//!
//! The first request for a document asks the client for its `wikiparser` section; every
//! concurrent request for the same document waits on that single fetch. Anything that goes
//! wrong (transport error, malformed payload) degrades to the defaults.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tower_lsp::lsp_types::{ConfigurationItem, Url};
use tracing::{debug, warn};
use wikitext_config::{load_client_settings, WikitextSettings};

use crate::server::LspClient;

pub const SETTINGS_SECTION: &str = "wikiparser";

pub type Settings = WikitextSettings;

#[derive(Default)]
pub struct SettingsCache {
    cells: Mutex<HashMap<Url, Arc<OnceCell<Arc<Settings>>>>>,
}

impl SettingsCache {
    pub async fn get<C: LspClient>(&self, client: &C, uri: &Url) -> Arc<Settings> {
        let cell = {
            let mut cells = self.cells.lock().await;
            Arc::clone(cells.entry(uri.clone()).or_default())
        };
        let settings = cell.get_or_init(|| fetch(client, uri)).await;
        Arc::clone(settings)
    }

    pub async fn remove(&self, uri: &Url) {
        self.cells.lock().await.remove(uri);
    }

    pub async fn invalidate_all(&self) {
        self.cells.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.cells.lock().await.len()
    }
}

async fn fetch<C: LspClient>(client: &C, uri: &Url) -> Arc<Settings> {
    let items = vec![ConfigurationItem {
        scope_uri: Some(uri.clone()),
        section: Some(SETTINGS_SECTION.to_string()),
    }];
    let settings = match client.configuration(items).await {
        Ok(values) => match values.first() {
            Some(value) => load_client_settings(value).unwrap_or_else(|err| {
                warn!(%uri, error = %err, "invalid settings, using defaults");
                Settings::default()
            }),
            None => Settings::default(),
        },
        Err(err) => {
            warn!(%uri, error = %err, "settings request failed, using defaults");
            Settings::default()
        }
    };
    debug!(%uri, ?settings, "settings loaded");
    Arc::new(settings)
}
