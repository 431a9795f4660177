//! Integration and unit tests for the PixelBrain backend.
//!
//! ## Test Modules
//!
//! - **support**: temporary database, fake classifier/object store, request helpers
//! - **images_api_tests**: upload workflow, privacy, deletion and listing
//! - **users_api_tests**: account endpoints, login and user removal
//! - **search_api_tests**: visibility and metadata filters of `/search/images`
//! - **health_api_tests**: banner, probes, metrics and response headers
//! - **db_tests**: schema and query behaviour
//! - **config_tests**: configuration loading and validation
//! - **error_tests**: error-to-response mapping
//!
//! Individual modules can be run with e.g. `cargo test images_api_tests`.

pub mod support;

pub mod health_api_tests;
