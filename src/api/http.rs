use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::database::{AddressPayload, AddressRecord, Database};
use crate::error::DatabaseError;
use crate::logging::LogContext;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Registry error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Server error: {0}")]
    Server(String),
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Acknowledgement for mutating routes
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub registry: String,
}

type ApiResult<T> = Result<(StatusCode, Json<T>), (StatusCode, Json<ErrorResponse>)>;

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: message.into() }))
}

impl From<ApiError> for (StatusCode, Json<ErrorResponse>) {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Database(DatabaseError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, "not found"),
            ApiError::Database(DatabaseError::Validation(e)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::InvalidRequest(message) => error_response(StatusCode::BAD_REQUEST, message),
            ApiError::Database(e) => {
                LogContext::new("api", "registry").error(&format!("Registry operation failed: {}", e));
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Server(message) => error_response(StatusCode::INTERNAL_SERVER_ERROR, message),
        }
    }
}

fn ok() -> (StatusCode, Json<StatusResponse>) {
    (
        StatusCode::OK,
        Json(StatusResponse {
            status: "ok".to_string(),
        }),
    )
}

fn parse_payload(body: &Bytes) -> Result<AddressPayload, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::InvalidRequest("invalid json".to_string()))
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
}

/// Routes for the address registry
pub fn build_router(database: Arc<Database>) -> Router {
    Router::new()
        .route("/addresses", post(create_address).get(list_addresses_not_allowed))
        .route(
            "/addresses/:address",
            get(get_address).put(update_address).delete(delete_address),
        )
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(AppState { database })
}

/// HTTP API server
pub struct ApiServer {
    database: Arc<Database>,
    pub host: String,
    pub port: u16,
}

impl ApiServer {
    pub fn new(database: Arc<Database>, host: impl Into<String>, port: u16) -> Self {
        Self {
            database,
            host: host.into(),
            port,
        }
    }

    /// Serve until `shutdown` fires
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), ApiError> {
        let app = build_router(self.database.clone());

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        LogContext::new("api", "start")
            .with_metadata("addr", json!(addr))
            .info(&format!("Registry API listening on {}", addr));

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Serve on a background task until `shutdown` fires or the handle is stopped
    pub fn spawn(self, shutdown: &CancellationToken) -> ApiHandle {
        let token = shutdown.child_token();
        let server_token = token.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = self.start(server_token).await {
                LogContext::new("api", "serve").error(&format!("Registry API stopped: {}", e));
            }
        });

        ApiHandle { shutdown: token, task }
    }
}

/// Running API server task
pub struct ApiHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ApiHandle {
    /// Request graceful shutdown and wait for the server to finish
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            LogContext::new("api", "stop").error(&format!("Registry API task failed: {}", e));
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// POST /addresses - insert or merge an address
pub async fn create_address(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusResponse> {
    let payload = parse_payload(&body)?;
    if payload.address.trim().is_empty() {
        return Err(ApiError::InvalidRequest("address required".to_string()).into());
    }

    let address = state.database.upsert_address(&payload).map_err(ApiError::from)?;

    LogContext::new("api", "create_address")
        .with_address(&address)
        .info("Address registered");

    Ok((
        StatusCode::CREATED,
        Json(StatusResponse {
            status: "ok".to_string(),
        }),
    ))
}

/// GET /addresses - listing is intentionally not exposed
pub async fn list_addresses_not_allowed() -> (StatusCode, Json<ErrorResponse>) {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "use /addresses/{address}")
}

/// GET /addresses/:address
pub async fn get_address(State(state): State<AppState>, Path(address): Path<String>) -> ApiResult<AddressRecord> {
    let record = state.database.get_address(&address).map_err(ApiError::from)?;
    Ok((StatusCode::OK, Json(record)))
}

/// PUT /addresses/:address - replace first_seen, last_seen and labels
pub async fn update_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
    body: Bytes,
) -> ApiResult<StatusResponse> {
    let payload = parse_payload(&body)?;
    state.database.update_address(&address, &payload).map_err(ApiError::from)?;
    Ok(ok())
}

/// DELETE /addresses/:address
pub async fn delete_address(State(state): State<AppState>, Path(address): Path<String>) -> ApiResult<StatusResponse> {
    state.database.delete_address(&address).map_err(ApiError::from)?;

    LogContext::new("api", "delete_address")
        .with_address(&address)
        .info("Address removed");
    Ok(ok())
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    match state.database.health_check() {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                registry: "connected".to_string(),
            }),
        )),
        Err(e) => Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("registry unavailable: {}", e),
        )),
    }
}
