use crate::cache::MAX_ENTRIES;
use crate::presentation::PANEL_BREAKPOINT;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5173";
pub const DEFAULT_CACHE_SLOT: &str = "dictionary-cache";

#[derive(Debug, Clone, PartialEq)]
pub struct LookupConfig {
    /// Origin serving `/api/dictionary` and `/api/dictionary/lemmatise`.
    pub backend_url: String,
    /// Directory holding the cache slot file.
    pub cache_dir: PathBuf,
    pub cache_slot: String,
    pub max_entries: usize,
    pub panel_breakpoint: f64,
    pub request_timeout: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            cache_dir: default_cache_dir(),
            cache_slot: DEFAULT_CACHE_SLOT.to_string(),
            max_entries: MAX_ENTRIES,
            panel_breakpoint: PANEL_BREAKPOINT,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl LookupConfig {
    /// Defaults overlaid with `AVVAI_*` environment variables.
    ///
    /// `BACKEND_URL` is honoured when `AVVAI_BACKEND_URL` is unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = var("AVVAI_BACKEND_URL").or_else(|| var("BACKEND_URL")) {
            config.backend_url = url;
        }
        if let Some(dir) = var("AVVAI_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(slot) = var("AVVAI_CACHE_SLOT") {
            config.cache_slot = slot;
        }
        if let Some(raw) = var("AVVAI_CACHE_MAX_ENTRIES") {
            match raw.parse::<usize>() {
                Ok(max) if max > 0 => config.max_entries = max,
                _ => warn!(value = %raw, "ignoring invalid AVVAI_CACHE_MAX_ENTRIES"),
            }
        }
        if let Some(raw) = var("AVVAI_REQUEST_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) => config.request_timeout = Duration::from_secs(secs),
                Err(_) => warn!(value = %raw, "ignoring invalid AVVAI_REQUEST_TIMEOUT_SECS"),
            }
        }
        config
    }
}

fn default_cache_dir() -> PathBuf {
    env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
        .unwrap_or_else(env::temp_dir)
        .join("avvai")
}
