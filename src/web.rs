use crate::{CachedEntry, DictionaryEntry, Lookup, LookupStats, ResolutionSource, normalize};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;

#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<Lookup>,
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Error, Debug)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: WebConfig, lookup: Arc<Lookup>) -> Result<(), WebError> {
    let state = Arc::new(AppState { lookup });
    let router = build_router(state);
    info!(%config.addr, "Binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/lookup", get(api_lookup))
        .route("/api/stats", get(api_stats))
        .route("/api/cache", get(api_cache_list))
        .route(
            "/api/cache/entry",
            get(api_cache_get)
                .put(api_cache_upsert)
                .delete(api_cache_delete),
        )
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct WordParams {
    word: Option<String>,
}

#[derive(Deserialize)]
struct KeyParams {
    key: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct LookupPayload {
    key: String,
    entry: DictionaryEntry,
    source: ResolutionSource,
}

#[derive(Deserialize)]
struct UpsertRequest {
    key: String,
    entry: DictionaryEntry,
}

async fn api_lookup(
    State(state): State<SharedState>,
    Query(params): Query<WordParams>,
) -> Result<Json<LookupPayload>, ApiError> {
    let word = params
        .word
        .ok_or_else(|| ApiError::bad_request("Missing word parameter"))?;
    let resolution = state.lookup.resolve(&word).await;
    if resolution.source == ResolutionSource::Skipped {
        return Err(ApiError::bad_request("Empty word parameter"));
    }
    match resolution.entry {
        Some(entry) => Ok(Json(LookupPayload {
            key: resolution.key,
            entry,
            source: resolution.source,
        })),
        None => Err(ApiError::not_found(format!(
            "No entry found for {:?}",
            resolution.key
        ))),
    }
}

async fn api_stats(State(state): State<SharedState>) -> Json<LookupStats> {
    Json(state.lookup.stats())
}

async fn api_cache_list(State(state): State<SharedState>) -> Json<Vec<CachedEntry>> {
    Json(state.lookup.cache().entries())
}

fn required_key(params: KeyParams) -> Result<String, ApiError> {
    let key = normalize(params.key.as_deref().unwrap_or_default());
    if key.is_empty() {
        return Err(ApiError::bad_request("Missing key"));
    }
    Ok(key)
}

async fn api_cache_get(
    State(state): State<SharedState>,
    Query(params): Query<KeyParams>,
) -> Result<Json<CachedEntry>, ApiError> {
    let key = required_key(params)?;
    state
        .lookup
        .cache()
        .get(&key)
        .map(|record| Json(CachedEntry { key, record }))
        .ok_or_else(|| ApiError::not_found("Entry not found"))
}

async fn api_cache_upsert(
    State(state): State<SharedState>,
    Json(request): Json<UpsertRequest>,
) -> Result<Json<CachedEntry>, ApiError> {
    let key = normalize(&request.key);
    if key.is_empty() {
        return Err(ApiError::bad_request("Missing key"));
    }
    let cache = state.lookup.cache();
    cache.put(&key, state.lookup.record(Some(request.entry)));
    cache
        .get(&key)
        .map(|record| Json(CachedEntry { key, record }))
        .ok_or_else(|| ApiError::not_found("Entry evicted"))
}

async fn api_cache_delete(
    State(state): State<SharedState>,
    Query(params): Query<KeyParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key = required_key(params)?;
    if state.lookup.cache().remove(&key) {
        Ok(Json(json!({ "status": "deleted" })))
    } else {
        Err(ApiError::not_found("Entry not found"))
    }
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use crate::lookup::fakes::{FakeBackend, FakeLemmatiser, entry};
    use crate::{CacheRecord, CacheStore, MemoryStorage};
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let cache = Arc::new(CacheStore::new(MemoryStorage::new("web-test")));
        let backend = FakeBackend::with(&[("kurinji", entry("kurinji", "a mountain flower"))]);
        let lookup = Lookup::new(
            cache,
            Arc::new(backend),
            Arc::new(FakeLemmatiser::with(&[("kurinjiyil", "kurinji")])),
        );
        Arc::new(AppState {
            lookup: Arc::new(lookup),
        })
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn api_lookup_resolves_through_lemma() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                Request::get("/api/lookup?word=Kurinjiyil")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        let payload: LookupPayload = json_body(response).await;
        assert_eq!(payload.key, "kurinjiyil");
        assert_eq!(payload.entry.word, "kurinji");
        assert_eq!(
            payload.source,
            ResolutionSource::Lemma {
                lemma: "kurinji".to_string(),
                cached: false
            }
        );
    }

    #[tokio::test]
    async fn api_lookup_unknown_word_is_404() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                Request::get("/api/lookup?word=palai")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn api_lookup_rejects_punctuation_only() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                Request::get("/api/lookup?word=%E2%80%94")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cache_admin_round_trip() {
        let state = test_state();
        state
            .lookup
            .cache()
            .put("mullai", CacheRecord::new(None, 1));

        let router = build_router(state.clone());
        let response = router
            .oneshot(Request::get("/api/cache").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listed: serde_json::Value = json_body(response).await;
        assert_eq!(listed[0]["key"], "mullai");
        assert_eq!(listed[0]["insertedAt"], 1);

        let upsert = json!({
            "key": "Neithal",
            "entry": { "word": "neithal", "definition": "seashore tract" }
        });
        let response = build_router(state.clone())
            .oneshot(
                Request::put("/api/cache/entry")
                    .header("content-type", "application/json")
                    .body(Body::from(upsert.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(state.lookup.cache().get("neithal").is_some());

        let response = build_router(state.clone())
            .oneshot(
                Request::delete("/api/cache/entry?key=neithal")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(state.lookup.cache().get("neithal").is_none());

        let response = build_router(state)
            .oneshot(
                Request::get("/api/cache/entry?key=neithal")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn web_error_wraps_io_source() {
        use std::error::Error as _;
        let err = WebError::from(std::io::Error::other("address in use"));
        assert_eq!(err.to_string(), "io error: address in use");
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn healthz_ok() {
        let router = build_router(test_state());
        let response = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
}
