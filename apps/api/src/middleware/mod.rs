pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use rate_limit::RateLimiter;
pub use request_id::request_tracing;
pub use security_headers::security_headers;
