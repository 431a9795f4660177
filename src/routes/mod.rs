//! HTTP route handlers for the PixelBrain API.
//!
//! - `auth`: token issuance (`/login`)
//! - `health`: banner, liveness, readiness, metrics and version endpoints
//! - `images`: upload, privacy toggle, listing and deletion of images
//! - `search`: metadata search over visible images
//! - `users`: account management and per-user image listing

pub mod auth;
pub mod health;
pub mod images;
pub mod search;
pub mod users;
