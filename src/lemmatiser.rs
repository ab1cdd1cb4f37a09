use crate::error::LookupError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const LEMMATISE_ENDPOINT: &str = "lemmatiser";

/// Maps an inflected form to its dictionary root.
///
/// Best effort: one request, no retry. Callers treat every `Err` as "no lemma".
#[async_trait]
pub trait Lemmatiser: Send + Sync {
    async fn lemmatise(&self, word: &str) -> Result<Option<String>, LookupError>;
}

#[derive(Serialize)]
struct LemmatiseRequest<'a> {
    word: &'a str,
}

#[derive(Deserialize)]
struct LemmatiseResponse {
    lemma: String,
}

/// `POST {base}/api/dictionary/lemmatise` with `{"word": ..}`.
#[derive(Clone)]
pub struct HttpLemmatiser {
    client: Client,
    base_url: String,
}

impl HttpLemmatiser {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Lemmatiser for HttpLemmatiser {
    async fn lemmatise(&self, word: &str) -> Result<Option<String>, LookupError> {
        let url = format!("{}/api/dictionary/lemmatise", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LemmatiseRequest { word })
            .send()
            .await
            .map_err(|source| LookupError::Transport {
                endpoint: LEMMATISE_ENDPOINT,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                endpoint: LEMMATISE_ENDPOINT,
                status: status.as_u16(),
            });
        }

        let payload = response
            .json::<LemmatiseResponse>()
            .await
            .map_err(|err| LookupError::Decode {
                endpoint: LEMMATISE_ENDPOINT,
                message: err.to_string(),
            })?;
        let lemma = payload.lemma.trim();
        if lemma.is_empty() {
            Ok(None)
        } else {
            Ok(Some(lemma.to_string()))
        }
    }
}
