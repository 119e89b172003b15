//! HTTP surface: session store, JSON/SVG endpoints and the static page.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Single-page UI |
//! | `GET` | `/health` | Liveness probe |
//! | `POST` | `/api/sessions` | Create a session |
//! | `DELETE` | `/api/sessions/{id}` | Drop a session |
//! | `POST` | `/api/sessions/{id}/upload` | Upload a CSV (multipart field `file`) |
//! | `PUT` | `/api/sessions/{id}/selection` | Change column or range selections |
//! | `GET` | `/api/sessions/{id}/state` | Selections, choices, file info, diagnostics |
//! | `GET` | `/api/sessions/{id}/preview` | First rows of the dataset |
//! | `GET` | `/api/sessions/{id}/summary` | Describe table of the filtered view |
//! | `GET` | `/api/sessions/{id}/missing` | Missing-value table |
//! | `GET` | `/api/sessions/{id}/charts/{kind}` | SVG chart, 204 when there is none |

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::classify::ScatterColor;
use crate::config::AppConfig;
use crate::filter::{reset_bound, RangeBound};
use crate::ingest::UploadedFile;
use crate::outcome::Outcome;
use crate::panels::{missing_table, summary_table, Table};
use crate::reactive::Node;
use crate::session::{ChartKind, SelectionSnapshot, Session, SessionOptions};

/// Largest non-file form field that is read.
const MAX_FORM_FIELD: u64 = 64 * 1024;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// A session plus its bookkeeping.
pub struct SessionHandle {
    pub session: Arc<Mutex<Session>>,
    created_at: DateTime<Utc>,
    last_seen_ms: AtomicI64,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        let now = Utc::now();
        Self {
            session: Arc::new(Mutex::new(session)),
            created_at: now,
            last_seen_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    fn touch(&self) {
        self.last_seen_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn last_seen_ms(&self) -> i64 {
        self.last_seen_ms.load(Ordering::Relaxed)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Live sessions keyed by id. Idle sessions are dropped when a new one is created.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
    idle_timeout_ms: i64,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_timeout_minutes: u64, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout_ms: i64::try_from(idle_timeout_minutes.saturating_mul(60_000))
                .unwrap_or(i64::MAX),
            max_sessions: max_sessions.max(1),
        }
    }

    pub async fn create(&self, session: Session) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;

        let cutoff = Utc::now().timestamp_millis().saturating_sub(self.idle_timeout_ms);
        let before = sessions.len();
        sessions.retain(|_, handle| handle.last_seen_ms() >= cutoff);
        if sessions.len() < before {
            tracing::info!("Dropped {} idle sessions", before - sessions.len());
        }

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, handle)| handle.last_seen_ms())
                .map(|(id, _)| *id);
            match oldest {
                Some(oldest) => {
                    tracing::info!("Session limit reached; dropping {}", oldest);
                    sessions.remove(&oldest);
                }
                None => break,
            }
        }

        sessions.insert(id, Arc::new(SessionHandle::new(session)));
        tracing::debug!("Created session {} ({} live)", id, sessions.len());
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.read().await.get(id).cloned()?;
        handle.touch();
        Some(handle)
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        match self.sessions.write().await.remove(id) {
            Some(handle) => {
                tracing::debug!("Removed session {} (created {})", id, handle.created_at());
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Shared application state
pub struct AppState {
    pub sessions: SessionStore,
    pub options: SessionOptions,
    pub max_upload_bytes: Option<u64>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            sessions: SessionStore::new(
                config.session.idle_timeout_minutes,
                config.session.max_sessions,
            ),
            options: SessionOptions::from(config),
            max_upload_bytes: config.upload.max_upload_bytes(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found")]
    SessionNotFound,
    #[error("unknown chart: {0}")]
    UnknownChart(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::SessionNotFound | ApiError::UnknownChart(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", delete(delete_session))
        .route(
            "/api/sessions/{id}/upload",
            // The file field is capped while it is read
            post(upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/sessions/{id}/selection", put(update_selection))
        .route("/api/sessions/{id}/state", get(get_state))
        .route("/api/sessions/{id}/preview", get(get_preview))
        .route("/api/sessions/{id}/summary", get(get_summary))
        .route("/api/sessions/{id}/missing", get(get_missing))
        .route("/api/sessions/{id}/charts/{kind}", get(get_chart))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &AppConfig) -> color_eyre::Result<()> {
    let state = Arc::new(AppState::new(config));
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct CreatedSession {
    session_id: Uuid,
}

async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = Session::new(state.options.clone());
    let session_id = state.sessions.create(session).await;
    (StatusCode::CREATED, Json(CreatedSession { session_id }))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound)
    }
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::SessionNotFound)
}

async fn lookup(state: &AppState, id: &str) -> Result<Arc<SessionHandle>, ApiError> {
    let id = parse_id(id)?;
    state.sessions.get(&id).await.ok_or(ApiError::SessionNotFound)
}

/// Widget choices derived from the current classification.
#[derive(Debug, Serialize)]
pub struct Choices {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub scatter_color: Vec<String>,
}

/// Everything the page needs to redraw its controls and text panels.
#[derive(Debug, Serialize)]
pub struct StateSnapshot {
    pub file_info: String,
    pub has_data: bool,
    pub rejection: Option<String>,
    pub shape: Option<(usize, usize)>,
    pub filtered_shape: Option<(usize, usize)>,
    pub choices: Choices,
    pub selection: SelectionSnapshot,
    /// Full extent of the selected numeric column, for the range slider.
    pub slider: RangeBound,
    pub diagnostics: String,
    pub invalidated: Vec<Node>,
}

fn snapshot(session: &Session, invalidated: Vec<Node>) -> StateSnapshot {
    let classification = session.classification();
    let selection = session.selection();
    let slider = reset_bound(session.raw_dataset(), selection.num_column.as_deref());
    StateSnapshot {
        file_info: session.file_info().to_string(),
        has_data: session.raw_dataset().is_some(),
        rejection: session.rejection().map(|e| e.to_string()),
        shape: session.raw_dataset().map(|d| d.shape()),
        filtered_shape: session.filtered().map(|v| v.shape()),
        choices: Choices {
            numeric: classification.continuous.clone(),
            categorical: classification.categorical.clone(),
            scatter_color: classification.color_choices(),
        },
        selection,
        slider,
        diagnostics: session.diagnostics().to_string(),
        invalidated,
    }
}

async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StateSnapshot>, ApiError> {
    let handle = lookup(&state, &id).await?;
    let session = handle.session.lock().await;
    Ok(Json(snapshot(&session, Vec::new())))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<StateSnapshot>, ApiError> {
    let handle = lookup(&state, &id).await?;

    let mut declared_size: Option<u64> = None;
    let mut file: Option<UploadedFile> = None;
    while let Some(mut field) = multipart.next_field().await.map_err(bad_upload)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("size") => {
                if let Capped::Complete(bytes) =
                    read_capped(&mut field, Some(MAX_FORM_FIELD)).await.map_err(bad_upload)?
                {
                    declared_size = String::from_utf8_lossy(&bytes).trim().parse().ok();
                }
            }
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                match read_capped(&mut field, state.max_upload_bytes)
                    .await
                    .map_err(bad_upload)?
                {
                    Capped::Complete(bytes) => {
                        let mut uploaded = UploadedFile::new(name, bytes);
                        if let Some(size) = declared_size {
                            uploaded.declared_size = uploaded.declared_size.max(size);
                        }
                        file = Some(uploaded);
                    }
                    Capped::Exceeded(received) => {
                        tracing::info!("Upload of {} stopped after {} bytes", name, received);
                        file = Some(UploadedFile::over_limit(name, received));
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    update_blocking(&handle, move |session| session.upload(file)).await
}

fn bad_upload(e: MultipartError) -> ApiError {
    tracing::warn!("Malformed upload: {}", e.body_text());
    ApiError::BadRequest(e.body_text())
}

/// A form field read up to a byte cap.
enum Capped {
    Complete(Vec<u8>),
    /// The field went past the cap after this many bytes; the rest was not read.
    Exceeded(u64),
}

async fn read_capped(field: &mut Field<'_>, limit: Option<u64>) -> Result<Capped, MultipartError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        bytes.extend_from_slice(&chunk);
        let received = bytes.len() as u64;
        if limit.is_some_and(|limit| received > limit) {
            return Ok(Capped::Exceeded(received));
        }
    }
    Ok(Capped::Complete(bytes))
}

/// Apply a change to the session on the blocking pool. CSV parsing and chart rendering run
/// there while the session lock is held.
async fn update_blocking<F>(
    handle: &SessionHandle,
    update: F,
) -> Result<Json<StateSnapshot>, ApiError>
where
    F: FnOnce(&mut Session) -> Vec<Node> + Send + 'static,
{
    let mut session = Arc::clone(&handle.session).lock_owned().await;
    let state = tokio::task::spawn_blocking(move || {
        let invalidated = update(&mut *session);
        snapshot(&*session, invalidated)
    })
    .await
    .map_err(|e| {
        tracing::error!("Session update failed: {}", e);
        ApiError::Internal(e.to_string())
    })?;
    Ok(Json(state))
}

/// Partial selection change; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct SelectionUpdate {
    pub num_column: Option<String>,
    pub range: Option<[f64; 2]>,
    pub cat_column: Option<String>,
    pub scatter_x: Option<String>,
    pub scatter_y: Option<String>,
    pub scatter_color: Option<String>,
}

/// Apply an update in widget order: the numeric column first since it resets the bound.
pub fn apply_selection(session: &mut Session, update: SelectionUpdate) -> Vec<Node> {
    let mut invalidated = Vec::new();
    if let Some(column) = update.num_column {
        invalidated.extend(session.select_numeric(Some(column)));
    }
    if let Some([lo, hi]) = update.range {
        invalidated.extend(session.set_range(lo, hi));
    }
    if let Some(column) = update.cat_column {
        invalidated.extend(session.select_categorical(Some(column)));
    }
    if let Some(column) = update.scatter_x {
        invalidated.extend(session.select_scatter_x(Some(column)));
    }
    if let Some(column) = update.scatter_y {
        invalidated.extend(session.select_scatter_y(Some(column)));
    }
    if let Some(choice) = update.scatter_color {
        invalidated.extend(session.select_scatter_color(ScatterColor::from_choice(&choice)));
    }
    invalidated.sort();
    invalidated.dedup();
    invalidated
}

async fn update_selection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<SelectionUpdate>,
) -> Result<Json<StateSnapshot>, ApiError> {
    if let Some([lo, hi]) = update.range {
        if !lo.is_finite() || !hi.is_finite() {
            return Err(ApiError::BadRequest("range bounds must be finite".into()));
        }
    }
    let handle = lookup(&state, &id).await?;
    update_blocking(&handle, move |session| apply_selection(session, update)).await
}

async fn get_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Table>, ApiError> {
    let handle = lookup(&state, &id).await?;
    let session = handle.session.lock().await;
    Ok(Json(session.preview().clone()))
}

async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Table>, ApiError> {
    let handle = lookup(&state, &id).await?;
    let session = handle.session.lock().await;
    Ok(Json(summary_table(session.summary())))
}

async fn get_missing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Table>, ApiError> {
    let handle = lookup(&state, &id).await?;
    let session = handle.session.lock().await;
    Ok(Json(missing_table(session.missing())))
}

async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let handle = lookup(&state, &id).await?;
    let kind = ChartKind::parse(&kind).ok_or(ApiError::UnknownChart(kind))?;
    let session = handle.session.lock().await;
    Ok(match session.chart(kind) {
        Outcome::Ready(svg) => {
            ([(header::CONTENT_TYPE, "image/svg+xml")], svg.clone()).into_response()
        }
        Outcome::Empty | Outcome::Failed(_) => StatusCode::NO_CONTENT.into_response(),
    })
}
