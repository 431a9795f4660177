use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::services::{Classifier, CloudinaryStore, HttpClassifier, ObjectStore};

/// The shared application state.
///
/// Cheap to clone; handed to every handler by axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// The application metrics.
    pub metrics: Metrics,
    /// Scene-classification service the ingestion workflow calls.
    pub classifier: Arc<dyn Classifier>,
    /// Cloud object storage for processed images.
    pub storage: Arc<dyn ObjectStore>,
}

impl AppState {
    /// Wires the production HTTP clients from `config`.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let classifier = Arc::new(HttpClassifier::new(&config.classifier)?);
        let storage = Arc::new(CloudinaryStore::new(&config.storage)?);
        Ok(Self::with_services(db, config, classifier, storage))
    }

    /// Builds the state around caller-provided collaborators.
    pub fn with_services(
        db: sqlx::SqlitePool,
        config: AppConfig,
        classifier: Arc<dyn Classifier>,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        Self { db, config: Arc::new(config), metrics: Metrics::new(), classifier, storage }
    }
}
