//! Synchronizer-token CSRF protection
//!
//! Each session is issued a random token when it is created. The page embeds
//! it in a hidden `_csrf` form field; script-driven submissions send it in the
//! `x-csrf-token` header. State-changing requests are rejected unless the
//! submitted token equals the session's token.

use axum::http::Method;
use rand::RngCore;

/// Header carrying the token on JSON submissions.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Form field carrying the token on plain form submissions.
pub const CSRF_FIELD: &str = "_csrf";

const TOKEN_BYTES: usize = 32;

/// Generate a fresh hex-encoded token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Methods that never need a token.
pub fn is_exempt(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Check a submitted token against the session's token.
pub fn verify_token(expected: &str, submitted: Option<&str>) -> bool {
    match submitted {
        Some(submitted) if !submitted.is_empty() => {
            constant_time_compare(expected.as_bytes(), submitted.as_bytes())
        }
        _ => false,
    }
}

/// Compare two byte slices without short-circuiting on the first mismatch.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_token() {
        let token = generate_token();
        assert!(verify_token(&token, Some(&token)));
        assert!(!verify_token(&token, Some("wrong")));
        assert!(!verify_token(&token, Some("")));
        assert!(!verify_token(&token, None));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"hello", b"hello!"));
        assert!(constant_time_compare(b"", b""));
    }

    #[test]
    fn test_safe_methods_exempt() {
        assert!(is_exempt(&Method::GET));
        assert!(is_exempt(&Method::HEAD));
        assert!(!is_exempt(&Method::POST));
        assert!(!is_exempt(&Method::PUT));
    }
}
