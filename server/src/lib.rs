#![warn(clippy::nursery, clippy::pedantic)]

//! In-memory reference implementation of the paste service API.

use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use pastegate_common::{CreatePaste, CreatedPaste, ErrorBody, PasteView, Url};
use rand::prelude::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::paste::{Paste, Store};
use crate::short_code::{Generator, ShortCode};
use crate::time::{MAX_TTL_SECONDS, SWEEP_INTERVAL};

mod paste;
mod short_code;
mod time;

const SHORT_CODE_SIZE: usize = 12;

/// Overrides the clock for a single request when test mode is on.
pub const TEST_NOW_HEADER: &str = "x-test-now-ms";

#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Base for the `url` returned on creation. Taken from the request's
    /// host headers when unset.
    pub public_url: Option<Url>,
    pub test_mode: bool,
}

pub struct AppState {
    config: Config,
    store: Store,
    rng: Mutex<StdRng>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: Store::default(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    fn now(&self, headers: &HeaderMap) -> DateTime<Utc> {
        if self.config.test_mode {
            let overridden = headers
                .get(TEST_NOW_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

            if let Some(now) = overridden {
                return now;
            }
        }

        Utc::now()
    }

    fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.config.public_url {
            return url.as_str().trim_end_matches('/').to_owned();
        }

        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let host = header("x-forwarded-host")
            .or_else(|| header("host"))
            .unwrap_or("localhost:8081");
        let scheme = header("x-forwarded-proto").unwrap_or("http");
        format!("{}://{}", scheme, host)
    }

    fn store(&self, paste: Paste) -> Option<String> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        // Try finding a code; give up after 1000 attempts
        let candidates = std::iter::repeat_with(|| {
            let code: ShortCode<SHORT_CODE_SIZE> = rng.sample(Generator);
            code.to_string()
        })
        .take(1000);
        self.store.insert(paste, candidates)
    }
}

#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/pastes", post(create))
        .route("/pastes/:id", get(fetch))
        .route("/healthz", get(healthz));

    let paste = Router::new()
        .nest("/api", api)
        .route("/p/:id", get(view));

    Router::new()
        .nest("/paste", paste)
        .layer(Extension(state))
}

/// Binds the service to `addr`. Returns the bound address, which differs
/// from `addr` when binding to port 0, and the future that runs the server
/// until `shutdown` resolves.
///
/// # Errors
///
/// Fails if the address cannot be bound.
pub fn bind(
    addr: &SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = Result<()>>)> {
    let server = axum::Server::try_bind(addr)?.serve(router(state).into_make_service());
    let local_addr = server.local_addr();
    let server = server.with_graceful_shutdown(shutdown);

    Ok((local_addr, async move {
        server.await.map_err(anyhow::Error::from)
    }))
}

/// Periodic clean-up task that deletes expired entries.
pub async fn cleanup(state: Arc<AppState>) {
    loop {
        tokio::time::sleep(SWEEP_INTERVAL).await;
        let removed = state.store.sweep(Utc::now());
        if removed > 0 {
            debug!("Swept {} expired pastes", removed);
        }
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    const fn bad_request(message: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: Some(self.status.as_u16()),
            error: None,
            message: Some(self.message.to_owned()),
        };
        (self.status, Json(body)).into_response()
    }
}

const NOT_FOUND: ApiError = ApiError {
    status: StatusCode::NOT_FOUND,
    message: "paste not found or unavailable",
};

fn positive(value: Option<i64>, message: &'static str) -> Result<Option<u64>, ApiError> {
    match value {
        None => Ok(None),
        Some(n) if n >= 1 => Ok(u64::try_from(n).ok()),
        Some(_) => Err(ApiError::bad_request(message)),
    }
}

#[instrument(skip_all, err)]
async fn create(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreatePaste>,
) -> Result<(StatusCode, Json<CreatedPaste>), ApiError> {
    if request.content.trim().is_empty() {
        return Err(ApiError::bad_request(
            "content is required and must be non-empty",
        ));
    }

    if request.ttl_seconds.map_or(false, |ttl| ttl > MAX_TTL_SECONDS) {
        return Err(ApiError::bad_request("ttl_seconds is too large"));
    }
    let ttl_seconds = positive(request.ttl_seconds, "ttl_seconds must be >= 1")?;
    let max_views = positive(request.max_views, "max_views must be >= 1")?;

    let paste = Paste::new(request.content, ttl_seconds, max_views, state.now(&headers));
    let id = if let Some(id) = state.store(paste) {
        id
    } else {
        error!("Failed to generate a valid shortcode");
        return Err(ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "persistence unavailable",
        });
    };

    let url = format!("{}/paste/p/{}", state.base_url(&headers), id);
    debug!(%id, "Created paste");

    Ok((
        StatusCode::CREATED,
        Json(CreatedPaste {
            id: Some(id),
            url: Some(url),
        }),
    ))
}

#[instrument(skip(state, headers), err)]
async fn fetch(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PasteView>, ApiError> {
    state
        .store
        .take_view(&id, state.now(&headers))
        .map(Json)
        .ok_or(NOT_FOUND)
}

#[instrument(skip(state, headers))]
async fn view(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Html<String>) {
    match state.store.take_view(&id, state.now(&headers)) {
        Some(view) => (
            StatusCode::OK,
            Html(format!(
                "<!doctype html><html><head><meta charset=\"utf-8\"></head><body><pre>{}</pre></body></html>",
                escape_html(&view.content)
            )),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 Not found</h1>".to_owned()),
        ),
    }
}

#[derive(Serialize)]
struct Health {
    ok: bool,
    pastes: usize,
}

async fn healthz(Extension(state): Extension<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        ok: true,
        pastes: state.store.count(),
    })
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
