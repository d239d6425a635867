//! HTTP surface: request validation and dispatch to the cache store
//!
//! Provides /health plus the direct and streamed fetch endpoints under the
//! configured API prefix.

use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::types::{GetFileRequest, HealthResponse, ResponseMode, StreamParams};
use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use file_url_cache::CacheStore;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Cookie carrying the service token on streamed fetches
pub const TOKEN_COOKIE: &str = "XID";

/// Shared state for the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CacheStore>,
    pub credentials: Arc<CredentialStore>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn CacheStore>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            store,
            credentials,
            started_at: Utc::now(),
        }
    }
}

/// Join an endpoint path onto the API prefix
fn api_path(api_base: &str, path: &str) -> String {
    let base = api_base.trim_matches('/');
    let path = path.trim_start_matches('/');
    if base.is_empty() {
        format!("/{}", path)
    } else {
        format!("/{}/{}", base, path)
    }
}

/// Create the HTTP router
pub fn create_router(state: AppState, api_base: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(&api_path(api_base, "/get_file/"), post(get_file))
        .route(&api_path(api_base, "/stream/"), get(stream_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server, draining connections once `shutdown` fires
pub async fn start_server(
    router: Router,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { crate::shutdown::cancelled(&mut shutdown).await })
        .await
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
    })
}

/// POST {api}/get_file/
///
/// Reached only from internal callers, so no token is required.
async fn get_file(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let req: GetFileRequest = serde_json::from_slice(&body).map_err(|_| ApiError::BadInput)?;
    if req.url.is_empty() {
        return Err(ApiError::InvalidUrl);
    }
    let mode = ResponseMode::parse(&req.content_type).ok_or(ApiError::InvalidType)?;

    serve(state.store.as_ref(), &req.url, mode).await
}

/// GET {api}/stream/?url=...&mode=content|url
///
/// Used from the browser, so the service token cookie is required.
async fn stream_file(
    State(state): State<AppState>,
    cookies: CookieJar,
    params: Result<Query<StreamParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let token = cookies.get(TOKEN_COOKIE).ok_or_else(|| {
        warn!("No service cookie");
        ApiError::Unauthorized
    })?;
    if !state.credentials.is_valid(token.value()) {
        warn!("Invalid service cookie");
        return Err(ApiError::Unauthorized);
    }

    let Query(params) = params.map_err(|e| {
        warn!(error = %e, "Malformed query string");
        ApiError::InvalidRequest
    })?;
    let url = params.url.filter(|u| !u.is_empty()).ok_or_else(|| {
        warn!("No url argument");
        ApiError::InvalidRequest
    })?;

    let mode = match params.mode.as_deref() {
        None => ResponseMode::Content,
        Some(m) => ResponseMode::parse(m).ok_or_else(|| {
            warn!(mode = %m, "Invalid mode");
            ApiError::InvalidRequest
        })?,
    };

    serve(state.store.as_ref(), &url, mode).await
}

/// Some feeds carry scheme-relative links such as `//cdn.example.com/file`
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

async fn serve(store: &dyn CacheStore, url: &str, mode: ResponseMode) -> Result<Response, ApiError> {
    let url = normalize_url(url);

    match mode {
        ResponseMode::Url => {
            let path = store.get_url(&url).await?;
            Ok(Response::new(Body::from(path)))
        }
        ResponseMode::Content => {
            let content = store.get_content(&url).await?;
            let content_type = HeaderValue::from_str(&content.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            let mut response = Response::new(Body::from(content.data));
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{Request, StatusCode};
    use chrono::TimeDelta;
    use file_url_cache::{CachedContent, StoreError};
    use parking_lot::Mutex;
    use tower::ServiceExt;

    /// Store double that records every call
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<(&'static str, String)>>,
        fail: bool,
    }

    impl RecordingStore {
        fn calls(&self) -> Vec<(&'static str, String)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CacheStore for RecordingStore {
        async fn get_url(&self, url: &str) -> file_url_cache::Result<String> {
            self.calls.lock().push(("url", url.to_string()));
            if self.fail {
                return Err(StoreError::Origin("unreachable".to_string()));
            }
            Ok("ab/abcdef".to_string())
        }

        async fn get_content(&self, url: &str) -> file_url_cache::Result<CachedContent> {
            self.calls.lock().push(("content", url.to_string()));
            if self.fail {
                return Err(StoreError::Origin("unreachable".to_string()));
            }
            Ok(CachedContent {
                data: b"PNGDATA".to_vec(),
                content_type: "image/png".to_string(),
            })
        }
    }

    fn create_test_router(store: Arc<RecordingStore>, credentials: CredentialStore) -> Router {
        let state = AppState::new(store, Arc::new(credentials));
        create_router(state, "api")
    }

    fn credentials() -> CredentialStore {
        CredentialStore::new("abc".to_string(), Utc::now())
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/get_file/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn stream(query: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(format!("/api/stream/?{}", query));
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("{}={}", TOKEN_COOKIE, token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn error_message(response: Response) -> String {
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        json["error"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("//cdn.example.com/img.png"),
            "https://cdn.example.com/img.png"
        );
        assert_eq!(
            normalize_url("http://cdn.example.com/img.png"),
            "http://cdn.example.com/img.png"
        );
        assert_eq!(normalize_url("/local/path"), "/local/path");
    }

    #[test]
    fn test_api_path() {
        assert_eq!(api_path("api", "/get_file/"), "/api/get_file/");
        assert_eq!(api_path("/files/v1/", "stream/"), "/files/v1/stream/");
        assert_eq!(api_path("", "/stream/"), "/stream/");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = create_test_router(Arc::new(RecordingStore::default()), credentials());

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
    }

    #[tokio::test]
    async fn test_get_file_empty_url_is_rejected_without_store_call() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(post_json(r#"{"url":"","content_type":"content"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "invalid URL");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_file_malformed_body() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router.oneshot(post_json("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "error decoding input JSON");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_file_content_mode() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(post_json(
                r#"{"url":"https://cdn.example.com/img.png","content_type":"content"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(body_bytes(response).await, b"PNGDATA");
        assert_eq!(
            store.calls(),
            vec![("content", "https://cdn.example.com/img.png".to_string())]
        );
    }

    #[tokio::test]
    async fn test_get_file_url_mode_has_no_content_type() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(post_json(r#"{"url":"//cdn.example.com/a.js","content_type":"url"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(body_bytes(response).await, b"ab/abcdef");
        assert_eq!(
            store.calls(),
            vec![("url", "https://cdn.example.com/a.js".to_string())]
        );
    }

    #[tokio::test]
    async fn test_get_file_unknown_mode_is_invalid_type() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(post_json(r#"{"url":"https://cdn.example.com/a","content_type":"thumb"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "invalid file type");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_file_store_failure_is_internal_error() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(post_json(r#"{"url":"https://cdn.example.com/a","content_type":"content"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_stream_requires_cookie() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(stream("url=https://cdn.example.com/a", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stream_rejects_unknown_token() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(stream("url=https://cdn.example.com/a", Some("nope")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stream_normalizes_scheme_relative_url() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(stream("url=//cdn.example.com/img.png&mode=url", Some("abc")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            store.calls(),
            vec![("url", "https://cdn.example.com/img.png".to_string())]
        );
    }

    #[tokio::test]
    async fn test_stream_defaults_to_content_mode() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(stream("url=https://cdn.example.com/img.png", Some("abc")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(store.calls()[0].0, "content");
    }

    #[tokio::test]
    async fn test_stream_missing_url() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router.oneshot(stream("mode=url", Some("abc"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "invalid request");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stream_empty_url_is_rejected_without_store_call() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(stream("url=&mode=content", Some("abc")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "invalid request");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stream_malformed_query_without_cookie_is_unauthorized() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(stream("url=https://a.example.com/x&url=https://b.example.com/y", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(response).await, "Authentication required");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stream_malformed_query_with_cookie_is_invalid_request() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(stream(
                "url=https://a.example.com/x&url=https://b.example.com/y",
                Some("abc"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "invalid request");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stream_invalid_mode() {
        let store = Arc::new(RecordingStore::default());
        let router = create_test_router(store.clone(), credentials());

        let response = router
            .oneshot(stream("url=https://cdn.example.com/a&mode=thumb", Some("abc")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stream_accepts_superseded_token_within_grace() {
        let store = Arc::new(RecordingStore::default());
        let credentials = credentials();
        credentials.rotate("xyz".to_string());
        let router = create_test_router(store.clone(), credentials);

        let response = router
            .clone()
            .oneshot(stream("url=https://cdn.example.com/a", Some("abc")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(stream("url=https://cdn.example.com/a", Some("xyz")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stream_rejects_superseded_token_after_grace() {
        let store = Arc::new(RecordingStore::default());
        let credentials = credentials();
        credentials.rotate_at("xyz".to_string(), Utc::now() - TimeDelta::minutes(10));
        let router = create_test_router(store.clone(), credentials);

        let response = router
            .oneshot(stream("url=https://cdn.example.com/a", Some("abc")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(store.calls().is_empty());
    }
}
