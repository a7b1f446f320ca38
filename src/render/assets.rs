//! Subresource integrity hashes for the page's own assets.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha384};
use tracing::{info, warn};

pub const STYLESHEET: &str = "style.css";
pub const SCRIPT: &str = "app.js";

/// `integrity` attribute values for the stylesheet and script, when the
/// files could be read at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetIntegrity {
    pub stylesheet: Option<String>,
    pub script: Option<String>,
}

impl AssetIntegrity {
    pub fn from_dir(dir: &Path) -> Self {
        let integrity = Self {
            stylesheet: hash_file(&dir.join(STYLESHEET)),
            script: hash_file(&dir.join(SCRIPT)),
        };
        info!(
            dir = %dir.display(),
            stylesheet = integrity.stylesheet.is_some(),
            script = integrity.script.is_some(),
            "Computed asset integrity"
        );
        integrity
    }
}

/// `sha384-<base64 digest>` of the given bytes.
pub fn sri_hash(bytes: &[u8]) -> String {
    format!("sha384-{}", BASE64.encode(Sha384::digest(bytes)))
}

fn hash_file(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(sri_hash(&bytes)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Asset not readable, serving without integrity");
            None
        }
    }
}
