use crate::DictionaryEntry;
use crate::cache::{CacheRecord, CacheStore, Clock, SystemClock};
use crate::client::DictionaryBackend;
use crate::error::LookupError;
use crate::lemmatiser::Lemmatiser;
use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionSource {
    /// The token normalized to nothing; no cache or network access happened.
    Skipped,
    /// Served from a cached positive record under the word's own key.
    Cache,
    /// Fetched from the backend under the word's own key.
    Backend,
    /// Resolved through the lemma. `cached` is true when the lemma's record
    /// was already in the cache and no second backend call was made.
    Lemma { lemma: String, cached: bool },
    /// Neither the word nor its lemma produced an entry.
    NotFound,
}

/// Which network call an absorbed failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStep {
    Backend,
    Lemmatiser,
    LemmaBackend,
}

impl fmt::Display for LookupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupStep::Backend => write!(f, "backend"),
            LookupStep::Lemmatiser => write!(f, "lemmatiser"),
            LookupStep::LemmaBackend => write!(f, "lemma backend"),
        }
    }
}

#[derive(Debug)]
pub struct StepFailure {
    pub step: LookupStep,
    pub error: LookupError,
}

/// Full outcome of one lookup, including failures that were treated as "not found".
#[derive(Debug)]
pub struct Resolution {
    pub key: String,
    pub entry: Option<DictionaryEntry>,
    pub source: ResolutionSource,
    pub failures: Vec<StepFailure>,
}

impl Resolution {
    fn skipped() -> Self {
        Self {
            key: String::new(),
            entry: None,
            source: ResolutionSource::Skipped,
            failures: Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.entry.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LookupStats {
    pub cache_hits: u64,
    pub backend_calls: u64,
    pub lemmatiser_calls: u64,
    pub lemma_hits: u64,
    pub failures: u64,
}

#[derive(Default)]
struct LookupCounters {
    cache_hits: AtomicU64,
    backend_calls: AtomicU64,
    lemmatiser_calls: AtomicU64,
    lemma_hits: AtomicU64,
    failures: AtomicU64,
}

impl LookupCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LookupStats {
        LookupStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            lemmatiser_calls: self.lemmatiser_calls.load(Ordering::Relaxed),
            lemma_hits: self.lemma_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Cache-first dictionary resolution with a lemma fallback.
///
/// Resolution order for a normalized key:
/// 1. a cached record whose value is present,
/// 2. the backend under the key,
/// 3. the lemmatiser, then the lemma's cached record, then the backend under the lemma.
///
/// The outcome, found or not, is then written under the original key. A
/// cached "not found" is not a hit: the word is fetched again every time.
pub struct Lookup {
    cache: Arc<CacheStore>,
    backend: Arc<dyn DictionaryBackend>,
    lemmatiser: Arc<dyn Lemmatiser>,
    clock: Arc<dyn Clock>,
    counters: LookupCounters,
}

impl Lookup {
    pub fn new(
        cache: Arc<CacheStore>,
        backend: Arc<dyn DictionaryBackend>,
        lemmatiser: Arc<dyn Lemmatiser>,
    ) -> Self {
        Self {
            cache,
            backend,
            lemmatiser,
            clock: Arc::new(SystemClock),
            counters: LookupCounters::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn stats(&self) -> LookupStats {
        self.counters.snapshot()
    }

    /// Resolves `raw` to an entry, or `None`. Never fails.
    pub async fn lookup(&self, raw: &str) -> Option<DictionaryEntry> {
        self.resolve(raw).await.entry
    }

    pub async fn resolve(&self, raw: &str) -> Resolution {
        let key = normalize(raw);
        if key.is_empty() {
            return Resolution::skipped();
        }

        if let Some(entry) = self.cache.get(&key).and_then(|record| record.value) {
            LookupCounters::bump(&self.counters.cache_hits);
            debug!(%key, "dictionary cache hit");
            return Resolution {
                key,
                entry: Some(entry),
                source: ResolutionSource::Cache,
                failures: Vec::new(),
            };
        }

        let mut failures = Vec::new();
        let mut entry = self.fetch(&key, LookupStep::Backend, &mut failures).await;
        let mut source = if entry.is_some() {
            ResolutionSource::Backend
        } else {
            ResolutionSource::NotFound
        };

        if entry.is_none() {
            if let Some(lemma) = self.lemma_key(&key, &mut failures).await {
                if let Some(cached) = self.cache.get(&lemma).and_then(|record| record.value) {
                    LookupCounters::bump(&self.counters.lemma_hits);
                    debug!(%key, %lemma, "resolved through cached lemma");
                    entry = Some(cached);
                    source = ResolutionSource::Lemma {
                        lemma,
                        cached: true,
                    };
                } else if let Some(fetched) =
                    self.fetch(&lemma, LookupStep::LemmaBackend, &mut failures).await
                {
                    LookupCounters::bump(&self.counters.lemma_hits);
                    debug!(%key, %lemma, "resolved through lemma");
                    self.cache.put(&lemma, self.record(Some(fetched.clone())));
                    entry = Some(fetched);
                    source = ResolutionSource::Lemma {
                        lemma,
                        cached: false,
                    };
                }
            }
        }

        self.cache.put(&key, self.record(entry.clone()));
        if entry.is_none() {
            debug!(%key, failures = failures.len(), "no dictionary entry");
        }
        Resolution {
            key,
            entry,
            source,
            failures,
        }
    }

    async fn fetch(
        &self,
        key: &str,
        step: LookupStep,
        failures: &mut Vec<StepFailure>,
    ) -> Option<DictionaryEntry> {
        LookupCounters::bump(&self.counters.backend_calls);
        match self.backend.lookup(key).await {
            Ok(entry) => entry,
            Err(error) => {
                self.absorb(key, step, error, failures);
                None
            }
        }
    }

    /// The normalized lemma, when it is usable and differs from `key`.
    async fn lemma_key(&self, key: &str, failures: &mut Vec<StepFailure>) -> Option<String> {
        LookupCounters::bump(&self.counters.lemmatiser_calls);
        let lemma = match self.lemmatiser.lemmatise(key).await {
            Ok(lemma) => lemma?,
            Err(error) => {
                self.absorb(key, LookupStep::Lemmatiser, error, failures);
                return None;
            }
        };
        let lemma = normalize(&lemma);
        if lemma.is_empty() || lemma == key {
            return None;
        }
        Some(lemma)
    }

    fn absorb(
        &self,
        key: &str,
        step: LookupStep,
        error: LookupError,
        failures: &mut Vec<StepFailure>,
    ) {
        LookupCounters::bump(&self.counters.failures);
        warn!(%key, %step, error = %error, "dictionary request failed, treating as not found");
        failures.push(StepFailure { step, error });
    }

    /// Wraps `value` in a record stamped by this pipeline's clock.
    pub fn record(&self, value: Option<DictionaryEntry>) -> CacheRecord {
        CacheRecord::new(value, self.clock.now_millis())
    }
}
