//! REST API layer
//!
//! Asynchronous generation launches, task polling and cancellation, plus
//! the configuration endpoints the generation stages read from.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use response::SuccessResponse;
pub use routes::{create_router, AppState};
