use crate::DictionaryEntry;
use crate::cache::CacheStore;
use crate::client::{HttpDictionary, http_client};
use crate::config::LookupConfig;
use crate::error::LookupError;
use crate::lemmatiser::HttpLemmatiser;
use crate::lookup::{Lookup, Resolution};
use crate::presentation::{BoundingBox, PresentationCoordinator, Surface};
use crate::storage::FileStorage;
use std::sync::Arc;
use tracing::info;

/// One reader session: the lookup pipeline plus the display slots it feeds.
pub struct DictionaryReader {
    lookup: Arc<Lookup>,
    presentation: PresentationCoordinator,
}

impl DictionaryReader {
    pub fn new(lookup: Arc<Lookup>, presentation: PresentationCoordinator) -> Self {
        Self {
            lookup,
            presentation,
        }
    }

    /// Wires HTTP clients and the file-backed cache described by `config`.
    pub fn from_config(config: &LookupConfig) -> Result<Self, LookupError> {
        let client = http_client(config.request_timeout)?;
        let storage = FileStorage::new(&config.cache_dir, config.cache_slot.clone());
        info!(
            backend = %config.backend_url,
            cache = %storage.path().display(),
            max_entries = config.max_entries,
            "dictionary reader configured"
        );
        let cache = Arc::new(CacheStore::with_capacity(storage, config.max_entries));
        let lookup = Lookup::new(
            cache,
            Arc::new(HttpDictionary::new(client.clone(), &config.backend_url)),
            Arc::new(HttpLemmatiser::new(client, &config.backend_url)),
        );
        Ok(Self::new(
            Arc::new(lookup),
            PresentationCoordinator::new(config.panel_breakpoint),
        ))
    }

    pub fn lookup_pipeline(&self) -> &Arc<Lookup> {
        &self.lookup
    }

    pub fn presentation(&self) -> &PresentationCoordinator {
        &self.presentation
    }

    pub async fn lookup(&self, word: &str) -> Option<DictionaryEntry> {
        self.lookup.lookup(word).await
    }

    pub async fn resolve(&self, word: &str) -> Resolution {
        self.lookup.resolve(word).await
    }

    /// Handles a reader selecting `word` in the lesson text.
    ///
    /// On wide viewports the panel is shown, marked loading, and filled with
    /// the lookup result once it arrives, unless another selection or a hide
    /// happened in the meantime. On narrow viewports only the popup slot is
    /// set; the popup resolves its own entry through [`DictionaryReader::lookup`].
    pub async fn select<B: BoundingBox + ?Sized>(
        &self,
        word: &str,
        origin: &B,
        viewport_width: f64,
    ) -> Option<Surface> {
        let surface = self
            .presentation
            .trigger_from_selection(word, origin, viewport_width)?;
        if let Surface::Panel(ticket) = &surface {
            self.presentation.set_panel_loading_for(ticket, true);
            let entry = self.lookup.lookup(ticket.word()).await;
            self.presentation.finish_panel_lookup(ticket, entry);
        }
        Some(surface)
    }
}
