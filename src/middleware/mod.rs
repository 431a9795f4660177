//! Request extractors and response middleware.
//!
//! - `auth`: the `CurrentUser` extractor gating every mutating endpoint
//! - `security_headers`: hardening headers and cache policy on every response

pub mod auth;
pub mod security_headers;

pub use auth::CurrentUser;
