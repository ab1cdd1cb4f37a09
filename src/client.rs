use crate::DictionaryEntry;
use crate::error::LookupError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

const LOOKUP_ENDPOINT: &str = "dictionary lookup";

/// The backend that turns a normalized word into a definition.
#[async_trait]
pub trait DictionaryBackend: Send + Sync {
    /// `Ok(None)` means the backend has no entry for `word`.
    async fn lookup(&self, word: &str) -> Result<Option<DictionaryEntry>, LookupError>;
}

/// Builds the shared HTTP client used by both backend clients.
pub fn http_client(timeout: Duration) -> Result<Client, LookupError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("avvai-lookup/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| LookupError::Transport {
            endpoint: "client setup",
            source,
        })
}

/// `GET {base}/api/dictionary?word=<word>`.
#[derive(Clone)]
pub struct HttpDictionary {
    client: Client,
    base_url: String,
}

impl HttpDictionary {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DictionaryBackend for HttpDictionary {
    async fn lookup(&self, word: &str) -> Result<Option<DictionaryEntry>, LookupError> {
        let url = format!("{}/api/dictionary", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("word", word)])
            .send()
            .await
            .map_err(|source| LookupError::Transport {
                endpoint: LOOKUP_ENDPOINT,
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LookupError::Status {
                endpoint: LOOKUP_ENDPOINT,
                status: status.as_u16(),
            });
        }

        response
            .json::<DictionaryEntry>()
            .await
            .map(Some)
            .map_err(|err| LookupError::Decode {
                endpoint: LOOKUP_ENDPOINT,
                message: err.to_string(),
            })
    }
}
