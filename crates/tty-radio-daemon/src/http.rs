//! REST API.  Every response body is an [`ApiResponse`] envelope; the status
//! code mirrors the error class but clients should trust `success`.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::session::{ErrorKind, PlaybackSession, SessionError};
use tty_radio_proto::catalog::CatalogError;
use tty_radio_proto::protocol::{
    ApiResponse, FindQuery, FoundStream, IndexData, NameQuery, NowPlaying, NowPlayingQuery,
    PlayRequest, SelectRequest, StationQuery, StationSummary, StatusData, StreamDetail,
    StreamQuery, VolumeRequest,
};

// ── errors ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let status = match e.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidState => StatusCode::CONFLICT,
            ErrorKind::InvalidVolume => StatusCode::BAD_REQUEST,
            ErrorKind::SpawnFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        SessionError::from(e).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!("HTTP API error {}: {}", self.status, self.message);
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// POST bodies are optional JSON; an empty body means "no fields".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_required(body)
}

fn parse_required<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid request body: {}", e)))
}

// ── server ────────────────────────────────────────────────────────────────────

pub fn router(session: Arc<PlaybackSession>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/stations", get(stations))
        .route("/api/station", get(station))
        .route("/api/streams", get(streams))
        .route("/api/stream", get(stream))
        .route("/api/find", get(find))
        .route("/api/now_playing", get(now_playing))
        .route("/api/set", post(select))
        .route("/api/play", post(play))
        .route("/api/pause", post(pause))
        .route("/api/stop", post(stop))
        .route("/api/volume", post(volume))
        .layer(CorsLayer::permissive())
        .with_state(session)
}

/// Serve on an already bound listener until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    session: Arc<PlaybackSession>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let app = router(session);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

// ── handlers ──────────────────────────────────────────────────────────────────

async fn index() -> ApiResult<IndexData> {
    ok(IndexData {
        name: "tty-radio".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn status(State(session): State<Arc<PlaybackSession>>) -> ApiResult<StatusData> {
    ok(session.status().await)
}

async fn stations(State(session): State<Arc<PlaybackSession>>) -> ApiResult<Vec<StationSummary>> {
    ok(session.catalog().summaries())
}

async fn station(
    State(session): State<Arc<PlaybackSession>>,
    query: Result<Query<NameQuery>, QueryRejection>,
) -> ApiResult<StationSummary> {
    let Query(q) = query?;
    ok(session.catalog().get_station(&q.name)?.summary())
}

async fn streams(
    State(session): State<Arc<PlaybackSession>>,
    query: Result<Query<StationQuery>, QueryRejection>,
) -> ApiResult<Vec<String>> {
    let Query(q) = query?;
    ok(session.catalog().stream_names(q.station.as_deref())?)
}

async fn stream(
    State(session): State<Arc<PlaybackSession>>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> ApiResult<StreamDetail> {
    let Query(q) = query?;
    ok(session.stream_detail(&q.station, &q.stream).await?)
}

async fn find(
    State(session): State<Arc<PlaybackSession>>,
    query: Result<Query<FindQuery>, QueryRejection>,
) -> ApiResult<FoundStream> {
    let Query(q) = query?;
    let (st, s) = session.catalog().find_stream(&q.query, q.station.as_deref())?;
    ok(FoundStream {
        station: st.name.clone(),
        stream: s.name.clone(),
    })
}

async fn now_playing(
    State(session): State<Arc<PlaybackSession>>,
    query: Result<Query<NowPlayingQuery>, QueryRejection>,
) -> ApiResult<NowPlaying> {
    let Query(q) = query?;
    ok(session.now_playing(q.wait).await)
}

async fn select(State(session): State<Arc<PlaybackSession>>, body: Bytes) -> ApiResult<StatusData> {
    let req: SelectRequest = parse_required(&body)?;
    info!("HTTP API: Select {} / {:?}", req.station, req.stream);
    ok(session.select(&req.station, req.stream.as_deref()).await?)
}

async fn play(State(session): State<Arc<PlaybackSession>>, body: Bytes) -> ApiResult<StatusData> {
    let req: PlayRequest = parse_body(&body)?;
    info!("HTTP API: Play {:?} / {:?}", req.station, req.stream);
    ok(session
        .play(req.station.as_deref(), req.stream.as_deref())
        .await?)
}

async fn pause(State(session): State<Arc<PlaybackSession>>) -> ApiResult<StatusData> {
    info!("HTTP API: Pause");
    ok(session.pause().await?)
}

async fn stop(State(session): State<Arc<PlaybackSession>>) -> ApiResult<StatusData> {
    info!("HTTP API: Stop");
    ok(session.stop().await)
}

async fn volume(State(session): State<Arc<PlaybackSession>>, body: Bytes) -> ApiResult<StatusData> {
    let req: VolumeRequest = parse_required(&body)?;
    info!("HTTP API: Set volume to {}", req.value);
    ok(session.set_volume(req.value).await?)
}
