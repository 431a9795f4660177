//! Shared fixtures: a temporary database, fake collaborators and request helpers.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::{
    AppConfig, AuthConfig, ClassifierConfig, DatabaseConfig, SecurityConfig, ServerConfig, StorageConfig,
};
use crate::services::classifier::{Classification, Classifier, ClassifierError, UploadedFile};
use crate::services::storage::{DestroyResult, ObjectStore, StorageError, UploadOptions, UploadResult};
use crate::state::AppState;

pub const JWT_SECRET: &str = "test-secret";
pub const BOUNDARY: &str = "pixelbrain-test-boundary";

pub fn test_config(db_url: &str) -> AppConfig {
    AppConfig {
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 8000, max_upload_bytes: 5 * 1024 * 1024 },
        database: DatabaseConfig { url: db_url.to_string(), max_connections: 4 },
        auth: AuthConfig { jwt_secret: JWT_SECRET.to_string(), access_token_expire_minutes: 60, bcrypt_cost: 4 },
        classifier: ClassifierConfig { url: "http://classifier.invalid/process".to_string(), timeout_secs: 5 },
        storage: StorageConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: "images".to_string(),
            api_base: "http://storage.invalid".to_string(),
        },
        security: Some(SecurityConfig::default()),
    }
}

/// A classifier answer with one 4x3 PNG and the given detections.
pub fn classification(labels: [&str; 4], detections: &[(&str, Vec<[f64; 4]>)], filters: &[&str]) -> Classification {
    Classification {
        image_base64: crate::imaging::sample_png_base64(),
        labels: labels.iter().map(|s| s.to_string()).collect(),
        detections: detections
            .iter()
            .map(|(label, boxes)| (label.to_string(), boxes.iter().map(|b| b.to_vec()).collect()))
            .collect(),
        applied_filters: filters.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn default_classification() -> Classification {
    classification(
        ["indoor", "kitchen", "Not detected", "cloudy"],
        &[("cat", vec![[0.0, 0.0, 10.0, 10.0]]), ("dog", vec![[0.0, 0.0, 20.0, 5.0]])],
        &["original", "sepia", "vivid"],
    )
}

/// Classifier double answering with a configurable outcome.
pub struct FakeClassifier {
    /// `Err(status)` simulates a non-200 answer.
    pub outcome: Mutex<Result<Classification, u16>>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeClassifier {
    pub fn new() -> Self {
        Self { outcome: Mutex::new(Ok(default_classification())), calls: AtomicUsize::new(0), prompts: Mutex::new(Vec::new()) }
    }

    pub fn respond_with(&self, outcome: Result<Classification, u16>) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, _file: &UploadedFile, prompt: &str) -> Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.outcome.lock().unwrap().clone().map_err(ClassifierError::Status)
    }
}

/// How the fake store answers a destroy call for a given public id.
#[derive(Debug, Clone, Copy)]
pub enum DestroyFailure {
    /// The provider answers, but not with a success result.
    Refused,
    /// The provider cannot be reached.
    Unreachable,
}

/// Object-store double keeping everything in memory.
pub struct FakeStore {
    pub uploads: Mutex<Vec<UploadOptions>>,
    pub destroyed: Mutex<Vec<String>>,
    pub destroy_failures: Mutex<HashMap<String, DestroyFailure>>,
    pub fail_uploads: Mutex<bool>,
    next_id: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
            destroy_failures: Mutex::new(HashMap::new()),
            fail_uploads: Mutex::new(false),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn fail_destroy(&self, public_id: &str, failure: DestroyFailure) {
        self.destroy_failures.lock().unwrap().insert(public_id.to_string(), failure);
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<UploadOptions> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn upload(&self, png: Vec<u8>, options: &UploadOptions) -> Result<UploadResult, StorageError> {
        if *self.fail_uploads.lock().unwrap() {
            return Err(StorageError::Status { status: 500, message: "upload refused".to_string() });
        }
        assert_eq!(&png[..4], b"\x89PNG", "store must receive PNG bytes");
        self.uploads.lock().unwrap().push(options.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let public_id = format!("{}/fake-{}", options.folder, n);
        Ok(UploadResult { secure_url: format!("https://cdn.test/{}.png", public_id), public_id })
    }

    async fn destroy(&self, public_id: &str, _invalidate: bool) -> Result<DestroyResult, StorageError> {
        match self.destroy_failures.lock().unwrap().get(public_id).copied() {
            Some(DestroyFailure::Refused) => Ok(DestroyResult { result: "error".to_string() }),
            Some(DestroyFailure::Unreachable) => {
                Err(StorageError::Status { status: 503, message: "unreachable".to_string() })
            }
            None => {
                self.destroyed.lock().unwrap().push(public_id.to_string());
                Ok(DestroyResult { result: "ok".to_string() })
            }
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub classifier: Arc<FakeClassifier>,
    pub store: Arc<FakeStore>,
    _dir: TempDir,
}

pub async fn setup() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db_url = format!("sqlite://{}", dir.path().join("test.db").display());
    let opts = SqliteConnectOptions::from_str(&db_url).unwrap().create_if_missing(true).foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(4).connect_with(opts).await.unwrap();
    crate::db::init_db(&pool).await.unwrap();

    let classifier = Arc::new(FakeClassifier::new());
    let store = Arc::new(FakeStore::new());
    let state = AppState::with_services(pool, test_config(&db_url), classifier.clone(), store.clone());
    let router = crate::app::build_router(state.clone());
    TestApp { router, state, classifier, store, _dir: dir }
}

impl TestApp {
    /// Inserts a user directly and returns its id and a valid bearer token.
    pub async fn user(&self, email: &str, password: &str) -> (i64, String) {
        let hash = crate::auth::hash_password(password.to_string(), 4).await.unwrap();
        let user = crate::models::insert_user(&self.state.db, "tester", 30, email, &hash).await.unwrap();
        let token = crate::auth::create_access_token(user.id, &self.state.config.auth).unwrap();
        (user.id, token)
    }

    /// Inserts an image row with an explicit creation time (`YYYY-MM-DDTHH:MM:SS.sssZ`).
    pub async fn image(&self, owner_id: i64, private: bool, created_at: &str, meta: ImageMeta<'_>) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO images (indoor, daytime, weather, image_url, public_id, private, created_at, \
             primary_object, owner_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) RETURNING id",
        )
        .bind(meta.indoor)
        .bind(meta.daytime)
        .bind(meta.weather)
        .bind(format!("https://cdn.test/{}.png", meta.public_id))
        .bind(meta.public_id)
        .bind(private)
        .bind(created_at)
        .bind(meta.primary_object)
        .bind(owner_id)
        .fetch_one(&self.state.db)
        .await
        .unwrap()
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.into_body().collect().await.unwrap().to_bytes();
        Response { status, headers, body }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImageMeta<'a> {
    pub public_id: &'a str,
    pub indoor: bool,
    pub daytime: Option<&'a str>,
    pub weather: Option<&'a str>,
    pub primary_object: Option<&'a str>,
}

impl<'a> ImageMeta<'a> {
    pub fn id(public_id: &'a str) -> Self {
        Self { public_id, indoor: false, daytime: None, weather: None, primary_object: None }
    }
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!("body is not JSON ({}): {}", e, String::from_utf8_lossy(&self.body))
        })
    }

    /// `id`s of a JSON array of images, in response order.
    pub fn ids(&self) -> Vec<i64> {
        self.json().as_array().unwrap().iter().map(|i| i["id"].as_i64().unwrap()).collect()
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    with_auth(Request::builder().method("GET").uri(uri), token).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    with_auth(Request::builder().method("DELETE").uri(uri), token).body(Body::empty()).unwrap()
}

pub fn json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    with_auth(Request::builder().method(method).uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Multipart upload to `/images`; `image` is sent as a file part, the rest as text parts.
pub fn upload(token: Option<&str>, image: &[u8], fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"photo.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\n",
            b = BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(b"\r\n");
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{b}\r\nContent-Disposition: form-data; name=\"{n}\"\r\n\r\n{v}\r\n", b = BOUNDARY, n = name, v = value)
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    with_auth(Request::builder().method("POST").uri("/images"), token)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn with_auth(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(t) => builder.header(header::AUTHORIZATION, format!("Bearer {}", t)),
        None => builder,
    }
}
