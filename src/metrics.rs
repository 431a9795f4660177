use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-wide counters for the image lifecycle.
#[derive(Clone)]
pub struct Metrics {
    pub users_created: Arc<AtomicU64>,
    pub users_deleted: Arc<AtomicU64>,
    pub images_uploaded: Arc<AtomicU64>,
    pub images_deleted: Arc<AtomicU64>,
    pub classifier_failures: Arc<AtomicU64>,
    pub storage_failures: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            users_created: Arc::new(AtomicU64::new(0)),
            users_deleted: Arc::new(AtomicU64::new(0)),
            images_uploaded: Arc::new(AtomicU64::new(0)),
            images_deleted: Arc::new(AtomicU64::new(0)),
            classifier_failures: Arc::new(AtomicU64::new(0)),
            storage_failures: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_users_created(&self) {
        self.users_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_users_deleted(&self) {
        self.users_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_images_uploaded(&self) {
        self.images_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_images_deleted(&self, count: u64) {
        self.images_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_classifier_failures(&self) {
        self.classifier_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_storage_failures(&self, count: u64) {
        self.storage_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            users_created: self.users_created.load(Ordering::Relaxed),
            users_deleted: self.users_deleted.load(Ordering::Relaxed),
            images_uploaded: self.images_uploaded.load(Ordering::Relaxed),
            images_deleted: self.images_deleted.load(Ordering::Relaxed),
            classifier_failures: self.classifier_failures.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub users_created: u64,
    pub users_deleted: u64,
    pub images_uploaded: u64,
    pub images_deleted: u64,
    pub classifier_failures: u64,
    pub storage_failures: u64,
    pub uptime_seconds: u64,
}
