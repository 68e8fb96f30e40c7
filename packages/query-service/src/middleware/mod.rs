pub mod auth;
pub mod ip_extractor;
pub mod rate_limit;

pub use auth::resolve_tier_middleware;
pub use ip_extractor::{extract_client_ip, ClientIp};
pub use rate_limit::{RateLimitLayer, RateLimiter};
