//! Static File Serving
//!
//! Serves `style.css` and `app.js` (the progressive-enhancement script) from
//! the configured static directory. Unknown paths fall through to a 404.

use axum::Router;
use std::path::{Path, PathBuf};
use tower_http::services::ServeDir;
use tracing::{info, warn};

/// Pick the first existing directory among the configured one and the
/// crate's own `static/`.
pub fn resolve_static_dir(configured: &Path) -> PathBuf {
    let candidates = [
        configured.to_path_buf(),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"),
    ];

    for path in candidates {
        if path.is_dir() {
            info!(path = %path.display(), "Found static files directory");
            return path;
        }
    }

    warn!(path = %configured.display(), "Static files directory not found, assets will 404");
    configured.to_path_buf()
}

/// Create router for serving static files from an already resolved
/// directory (see [`resolve_static_dir`]).
pub fn router(static_dir: &Path) -> Router {
    Router::new().fallback_service(ServeDir::new(static_dir))
}
