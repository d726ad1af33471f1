pub mod http;

pub use http::{build_router, ApiError, ApiHandle, ApiServer, AppState, ErrorResponse, HealthResponse, StatusResponse};
