//! Inline dictionary lookup for Tamil reading lessons.
//!
//! A selected token is normalized into a key, resolved through a bounded
//! durable cache, then the backend dictionary, then the backend under the
//! token's lemma. The result feeds one of two display slots: an anchored
//! popup on narrow viewports or a side panel on wide ones.
//!
//! ```no_run
//! use avvai_lookup::{DictionaryReader, LookupConfig, Rect};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = DictionaryReader::from_config(&LookupConfig::from_env())?;
//! let origin = Rect { left: 120.0, top: 300.0, width: 64.0, height: 22.0 };
//! reader.select("முல்லை", &origin, 1280.0).await;
//! println!("{:?}", reader.presentation().panel().entry);
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod config;
mod error;
mod lemmatiser;
mod lookup;
mod normalize;
mod presentation;
mod reader;
mod storage;

#[cfg(feature = "web")]
pub mod web;

use serde::{Deserialize, Serialize};

pub use cache::{
    CacheRecord, CacheStore, CachedEntry, Clock, LoadState, MAX_ENTRIES, ManualClock, SystemClock,
};
pub use client::{DictionaryBackend, HttpDictionary, http_client};
pub use config::{DEFAULT_BACKEND_URL, DEFAULT_CACHE_SLOT, LookupConfig};
pub use error::{LookupError, StorageError};
pub use lemmatiser::{HttpLemmatiser, Lemmatiser};
pub use lookup::{Lookup, LookupStats, LookupStep, Resolution, ResolutionSource, StepFailure};
pub use normalize::normalize;
pub use presentation::{
    Anchor, BoundingBox, PANEL_BREAKPOINT, PanelSlot, PanelTicket, PopupSlot,
    PresentationCoordinator, Rect, Surface,
};
pub use reader::DictionaryReader;
pub use storage::{CacheStorage, FileStorage, MemoryStorage};

/// A definition as served by the backend. Never modified after fetch, except
/// that the cache fills a blank `word` with its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub word: String,
    pub definition: String,
    #[serde(default)]
    pub examples: Vec<String>,
}
