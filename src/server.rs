//! HTTP surface.
//!
//! Thin axum handlers over [`crate::display`] and [`crate::channels`].
//! Handlers stay small: parse, delegate, frame the response. Conversion
//! endpoints return `image/bmp` bodies; the display endpoint returns JSON
//! and never 500s on a malformed body (devices in the field retry
//! whatever they get, so a parseable error beats a connection reset).

use std::sync::Arc;
use std::time::Duration;

use ab_glyph::FontVec;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::channels::{daily, now_playing, random};
use crate::config::Config;
use crate::display;
use crate::model::DisplayRequest;
use crate::normalize;
use crate::store::Store;

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
    /// Overlay font; `None` when the configured TTF could not be loaded.
    pub font: Arc<Option<FontVec>>,
}

impl AppState {
    /// Build state from configuration and a store. Loads the overlay font
    /// from disk; a missing font disables the overlay but not the server.
    pub fn new(config: Config, store: Arc<dyn Store>) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;

        let font = match std::fs::read(&config.font_path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(e) => {
                    warn!("font '{}' did not parse: {e}", config.font_path);
                    None
                }
            },
            Err(e) => {
                warn!("font '{}' not readable: {e}", config.font_path);
                None
            }
        };

        Ok(Self {
            store,
            http,
            config: Arc::new(config),
            font: Arc::new(font),
        })
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/devices/{device_uuid}/display", post(device_display))
        .route("/api/devices/{device_uuid}/refresh", post(device_refresh))
        .route("/api/convert", get(convert))
        .route("/api/random_convert", get(random_convert))
        .route("/api/daily_convert", get(daily_convert))
        .route("/api/nts_now_playing", get(nts_now_playing))
        .with_state(state)
}

/// Query parameters shared by the conversion endpoints.
#[derive(Debug, Deserialize)]
struct ConvertParams {
    url: Option<String>,
    device_uuid: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

impl ConvertParams {
    fn dimensions(&self) -> (u32, u32) {
        (
            self.width.unwrap_or(crate::DEFAULT_DISPLAY_WIDTH),
            self.height.unwrap_or(crate::DEFAULT_DISPLAY_HEIGHT),
        )
    }
}

fn bmp_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/bmp")], bytes).into_response()
}

fn internal_error(context: &str, e: crate::Error) -> Response {
    error!("{context}: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

/// POST /api/devices/{device_uuid}/display
///
/// The body is optional: an empty body means a default request. A body
/// that is present but malformed gets a JSON error without touching the
/// store.
async fn device_display(
    State(state): State<AppState>,
    Path(device_uuid): Path<String>,
    body: Bytes,
) -> Response {
    let request = if body.is_empty() {
        DisplayRequest::default()
    } else {
        match serde_json::from_slice::<DisplayRequest>(&body) {
            Ok(req) => req,
            Err(e) => {
                warn!("device {device_uuid}: malformed display request: {e}");
                return Json(json!({ "error": format!("invalid request body: {e}") }))
                    .into_response();
            }
        }
    };

    info!(
        "display request from {device_uuid} (fw={:?} battery={:?} wifi={:?})",
        request.current_fw_ver, request.battery_voltage, request.wifi_signal
    );

    match display::handle_display_request(state.store.as_ref(), &state.config, &device_uuid, &request)
        .await
    {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => internal_error("display request failed", e),
    }
}

/// POST /api/devices/{device_uuid}/refresh
///
/// Assign a fresh random asset to the device immediately; the new URL
/// takes effect on its next poll.
async fn device_refresh(
    State(state): State<AppState>,
    Path(device_uuid): Path<String>,
) -> Response {
    let result = async {
        let device = state.store.get_or_create_device(&device_uuid).await?;
        let url = random::resolve_url(state.store.as_ref(), &state.config.fallback_image_url).await?;
        state.store.update_device_image(device.id, &url).await?;
        Ok::<_, crate::Error>(url)
    }
    .await;

    match result {
        Ok(url) => Json(json!({ "image_url": url })).into_response(),
        Err(e) => internal_error("refresh failed", e),
    }
}

/// GET /api/convert?url=...&width=...&height=...
async fn convert(State(state): State<AppState>, Query(params): Query<ConvertParams>) -> Response {
    let Some(url) = params.url.as_deref() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing 'url' parameter" })),
        )
            .into_response();
    };
    let (width, height) = params.dimensions();

    let result = async {
        let adapted = normalize::fetch_and_adapt(
            &state.http,
            url,
            &state.config.fallback_image_url,
            width,
            height,
        )
        .await?;
        normalize::encode_bmp(&adapted.image)
    }
    .await;

    match result {
        Ok(bytes) => bmp_response(bytes),
        Err(e) => internal_error("convert failed", e),
    }
}

/// GET /api/random_convert?device_uuid=...&width=...&height=...
async fn random_convert(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
) -> Response {
    let (width, height) = params.dimensions();
    match random::render(
        state.store.as_ref(),
        &state.http,
        &state.config.fallback_image_url,
        width,
        height,
    )
    .await
    {
        Ok(bytes) => bmp_response(bytes),
        Err(e) => internal_error("random_convert failed", e),
    }
}

/// GET /api/daily_convert?device_uuid=...&width=...&height=...
async fn daily_convert(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
) -> Response {
    let (width, height) = params.dimensions();
    let device_uuid = params.device_uuid.as_deref().unwrap_or("unknown");

    let result = async {
        let today = display::local_today(&state.config)?;
        daily::render(
            state.store.as_ref(),
            &state.http,
            &state.config.fallback_image_url,
            state.font.as_ref().as_ref(),
            device_uuid,
            width,
            height,
            today,
        )
        .await
    }
    .await;

    match result {
        Ok(bytes) => bmp_response(bytes),
        Err(e) => internal_error("daily_convert failed", e),
    }
}

/// GET /api/nts_now_playing?width=...&height=...
async fn nts_now_playing(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
) -> Response {
    let (width, height) = params.dimensions();
    match now_playing::render(
        &state.http,
        state.config.now_playing_snapshot_url.as_deref(),
        &state.config.fallback_image_url,
        width,
        height,
        Duration::from_secs(state.config.scrape_timeout_secs),
    )
    .await
    {
        Ok(bytes) => bmp_response(bytes),
        Err(e) => internal_error("nts_now_playing failed", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = Config::from_yaml("timezone: \"UTC\"").unwrap();
        let state = AppState::new(config, store.clone()).unwrap();
        (state, store)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_display_empty_body_uses_defaults() {
        let (state, _store) = test_state();
        let app = router(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/devices/AABBCC/display")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["next_wake_secs"], 3600);
        assert!(json["image_url"].as_str().unwrap().contains("/api/convert?"));
    }

    #[tokio::test]
    async fn test_display_malformed_body_is_json_error_without_store_writes() {
        let (state, store) = test_state();
        let app = router(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/devices/AABBCC/display")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(json["error"].is_string());
        // The malformed request never reached the store.
        assert_eq!(store.display_log_len(), 0);
    }

    #[tokio::test]
    async fn test_display_json_body_round_trips() {
        let (state, _store) = test_state();
        let app = router(state);

        let body = serde_json::to_vec(&DisplayRequest {
            current_fw_ver: Some("1.2.3".to_string()),
            request_time_sync: true,
            ..Default::default()
        })
        .unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/devices/AABBCC/display")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(json["time"].is_object());
    }

    #[tokio::test]
    async fn test_convert_without_url_is_bad_request() {
        let (state, _store) = test_state();
        let app = router(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/convert?width=600&height=448")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_assigns_fallback_when_no_assets() {
        let (state, _store) = test_state();
        let app = router(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/devices/AABBCC/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(
            json["image_url"],
            crate::config::DEFAULT_FALLBACK_IMAGE_URL
        );
    }
}
