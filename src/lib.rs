//! # PixelBrain Backend Library
//!
//! Backend for an image-sharing application. Uploaded photos are sent to an
//! external scene-classification service, re-encoded, stored in cloud object
//! storage and indexed in SQLite for search.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server and routing
//! - **SQLx**: asynchronous SQLite access
//! - **Reqwest**: outbound calls to the classifier and the storage provider
//! - **Tokio**: async runtime
//!
//! ## Core Components
//!
//! - [`app`]: router assembly
//! - [`auth`]: password hashing and access tokens
//! - [`config`]: layered configuration
//! - [`db`]: schema initialization
//! - [`error`]: centralized error handling and HTTP error responses
//! - [`imaging`]: re-encoding, crop geometry and classifier label interpretation
//! - [`metrics`]: lifecycle counters
//! - [`middleware`]: the `CurrentUser` extractor and security headers
//! - [`models`]: rows and queries
//! - [`routes`]: HTTP API endpoint handlers
//! - [`services`]: classifier and object-store clients
//! - [`state`]: shared application state
//! - [`types`]: request and response bodies

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod imaging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
