//! Purpose: Provide the HTTP/JSON document-store proxy for Leafsync.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based loopback server backing the mirror client routes.
//! Invariants: Records are keyed by the metadata-service `id` string.
//! Invariants: Error envelopes expose stable kinds mapped to HTTP statuses.
//! Invariants: Loopback-only unless explicitly allowed.

use axum::extract::{DefaultBodyLimit, Path as AxumPath, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::collection::{self, FileCollection};
use leafsync::api::{Error, ErrorKind, Record};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub data_file: PathBuf,
    pub token: Option<String>,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
    pub cors_origins: Vec<String>,
}

#[derive(Clone)]
struct AppState {
    data_file: PathBuf,
    token: Option<String>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let state = Arc::new(AppState {
        data_file: config.data_file,
        token: config.token,
    });

    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/addRecord", post(add_record))
        .route(
            "/api/updateRecord/:id",
            axum::routing::patch(update_record).put(update_record),
        )
        .route("/api/deleteRecord/:id", delete(delete_record))
        .route("/api/fetchData", get(fetch_data))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if !config.cors_origins.is_empty() {
        app = app.layer(cors_layer(&config.cors_origins)?);
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;

    tracing::info!(bind = %config.bind, "mirror proxy listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }
    Ok(())
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, Error> {
    let mut values = Vec::with_capacity(origins.len());
    for origin in origins {
        let value = HeaderValue::from_str(origin).map_err(|_| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid cors origin: {origin}"))
                .with_hint("Use an origin like http://localhost:3000.")
        })?;
        values.push(value);
    }
    Ok(CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::list(values))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), Error> {
    let Some(token) = state.token.as_ref() else {
        return Ok(());
    };
    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(Error::new(ErrorKind::Permission).with_message("missing bearer token"));
    };
    let value = value.to_str().unwrap_or_default();
    let expected = format!("Bearer {token}");
    if value != expected {
        return Err(Error::new(ErrorKind::Permission).with_message("invalid bearer token"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct FetchQuery {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

async fn add_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(record): Json<Record>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    if let Err(err) = validate_record(&record) {
        return error_response(err);
    }
    let result = with_collection(&state, |collection| collection.insert_front(record.clone()));
    match result {
        Ok(()) => json_response(json!({ "record": record })),
        Err(err) => error_response(err),
    }
}

async fn update_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(record): Json<Record>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    if let Err(err) = validate_record(&record) {
        return error_response(err);
    }
    let result = with_collection(&state, |collection| collection.update(&id, record.clone()));
    match result {
        Ok(()) => json_response(json!({ "record": record })),
        Err(err) => error_response(err),
    }
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let result = with_collection(&state, |collection| collection.remove(&id));
    match result {
        Ok(()) => json_response(json!({ "ok": true })),
        Err(err) => error_response(err),
    }
}

async fn fetch_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FetchQuery>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let collection = match FileCollection::open(&state.data_file) {
        Ok(collection) => collection,
        Err(err) => return error_response(err),
    };
    match query.id {
        Some(id) => match collection.find(&id) {
            Some(record) => json_response(json!({ "record": record })),
            None => error_response(
                Error::new(ErrorKind::NotFound)
                    .with_message("record not found")
                    .with_id(id),
            ),
        },
        None => json_response(json!({ "records": collection.all() })),
    }
}

/// Load-mutate-save under the collection lock.
fn with_collection(
    state: &AppState,
    apply: impl FnOnce(&mut FileCollection) -> Result<(), Error>,
) -> Result<(), Error> {
    let _guard = collection::lock(&state.data_file)?;
    let mut collection = FileCollection::open(&state.data_file)?;
    apply(&mut collection)?;
    collection.save()
}

fn validate_record(record: &Record) -> Result<(), Error> {
    if record.id.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("record id must not be empty"));
    }
    if record.title.trim().is_empty() {
        return Err(Error::new(ErrorKind::Validation).with_message("title must not be empty"));
    }
    if record.domain_name.trim().is_empty() {
        return Err(
            Error::new(ErrorKind::Validation).with_message("domain_name must not be empty")
        );
    }
    Ok(())
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Permission => StatusCode::UNAUTHORIZED,
        ErrorKind::Inconsistent | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
            id: err.id().map(str::to_string),
        },
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("leafsync-version", HeaderValue::from_static("0"));
    response
}

fn json_response(payload: serde_json::Value) -> Response {
    let mut response = Json(payload).into_response();
    response
        .headers_mut()
        .insert("leafsync-version", HeaderValue::from_static("0"));
    response
}

#[cfg(test)]
mod tests {
    use super::{ServeConfig, validate_config};
    use leafsync::api::ErrorKind;
    use std::path::PathBuf;

    fn config(bind: &str) -> ServeConfig {
        ServeConfig {
            bind: bind.parse().expect("addr"),
            data_file: PathBuf::from("leaves.json"),
            token: None,
            allow_non_loopback: false,
            max_body_bytes: 1024 * 1024,
            cors_origins: Vec::new(),
        }
    }

    #[test]
    fn loopback_bind_is_accepted() {
        assert!(validate_config(&config("127.0.0.1:9800")).is_ok());
    }

    #[test]
    fn non_loopback_bind_requires_opt_in() {
        let err = validate_config(&config("0.0.0.0:9800")).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let mut allowed = config("0.0.0.0:9800");
        allowed.allow_non_loopback = true;
        assert!(validate_config(&allowed).is_ok());
    }

    #[test]
    fn zero_body_limit_is_rejected() {
        let mut bad = config("127.0.0.1:9800");
        bad.max_body_bytes = 0;
        let err = validate_config(&bad).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
