//! Clients for the two outbound collaborators of the ingestion workflow.
//!
//! - `classifier`: the scene-classification inference endpoint
//! - `storage`: the cloud object store holding the processed images
//!
//! Both are exposed as traits so handlers can be exercised against in-process fakes.

pub mod classifier;
pub mod storage;

pub use classifier::{Classifier, HttpClassifier};
pub use storage::{CloudinaryStore, ObjectStore};
