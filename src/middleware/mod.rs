// Middleware for client identification, rate limiting and security headers

pub mod client_ip;
pub mod rate_limiter;
pub mod security_headers;

pub use client_ip::*;
pub use rate_limiter::*;
pub use security_headers::*;
