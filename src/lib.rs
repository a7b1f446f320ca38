// Job Board - progressively enhanced job search with live server-pushed results

pub mod config;
pub mod csrf;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod push;      // Per-session SSE result stream
pub mod render;
pub mod routes;
pub mod sessions;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
