//! Login-path security primitives: bcrypt-over-MD5 password verification
//! with a short-lived verified-digest cache, and per-IP login rate
//! limiting.

pub mod password;
pub mod rate_limit;

pub use password::PasswordCache;
pub use rate_limit::LoginRateLimiter;
