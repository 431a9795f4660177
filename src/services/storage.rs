use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage credentials are not configured")]
    NotConfigured,
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage answered with status {status}: {message}")]
    Status { status: u16, message: String },
}

/// How the uploaded image should be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub folder: String,
    /// Center-fill crop to this width/height ratio.
    pub aspect_ratio: Option<f64>,
}

impl UploadOptions {
    /// Provider transformation string, e.g. `ar_1.7778,c_fill,g_auto`.
    pub fn transformation(&self) -> Option<String> {
        self.aspect_ratio.map(|ar| format!("ar_{},c_fill,g_auto", ar))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResult {
    pub secure_url: String,
    pub public_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DestroyResult {
    pub result: String,
}

impl DestroyResult {
    /// An object that is already gone counts as deleted.
    pub fn is_success(&self) -> bool {
        matches!(self.result.as_str(), "ok" | "deleted" | "not_found" | "not found")
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, png: Vec<u8>, options: &UploadOptions) -> Result<UploadResult, StorageError>;
    async fn destroy(&self, public_id: &str, invalidate: bool) -> Result<DestroyResult, StorageError>;
}

/// Cloudinary image API with signed requests.
///
/// Signatures use SHA-256, so the account's signature algorithm must be set to SHA-256.
pub struct CloudinaryStore {
    client: reqwest::Client,
    cfg: StorageConfig,
}

impl CloudinaryStore {
    pub fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { client, cfg: cfg.clone() })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", self.cfg.api_base.trim_end_matches('/'), self.cfg.cloud_name, action)
    }

    fn ensure_configured(&self) -> Result<(), StorageError> {
        if self.cfg.cloud_name.is_empty() || self.cfg.api_key.is_empty() || self.cfg.api_secret.is_empty() {
            return Err(StorageError::NotConfigured);
        }
        Ok(())
    }

    /// Builds the signed text fields of a request from the signable `params`.
    fn signed_form(&self, mut params: Vec<(&'static str, String)>) -> Form {
        params.push(("timestamp", chrono::Utc::now().timestamp().to_string()));
        let signature = sign_params(&params, &self.cfg.api_secret);

        let mut form = Form::new();
        for (key, value) in params {
            form = form.text(key, value);
        }
        form.text("api_key", self.cfg.api_key.clone()).text("signature", signature)
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, action: &str, form: Form) -> Result<T, StorageError> {
        let response = self.client.post(self.endpoint(action)).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Status { status: status.as_u16(), message });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    async fn upload(&self, png: Vec<u8>, options: &UploadOptions) -> Result<UploadResult, StorageError> {
        self.ensure_configured()?;
        let mut params = vec![("folder", options.folder.clone())];
        if let Some(t) = options.transformation() {
            params.push(("transformation", t));
        }
        let file = Part::bytes(png).file_name("upload.png").mime_str("image/png")?;
        let form = self.signed_form(params).part("file", file);

        let uploaded: UploadResult = self.post("upload", form).await?;
        tracing::info!(public_id = %uploaded.public_id, "uploaded image to cloud storage");
        Ok(uploaded)
    }

    async fn destroy(&self, public_id: &str, invalidate: bool) -> Result<DestroyResult, StorageError> {
        self.ensure_configured()?;
        let params = vec![("invalidate", invalidate.to_string()), ("public_id", public_id.to_string())];
        let form = self.signed_form(params);

        let destroyed: DestroyResult = self.post("destroy", form).await?;
        tracing::info!(public_id = %public_id, result = %destroyed.result, "destroyed image in cloud storage");
        Ok(destroyed)
    }
}

/// `sha256("k1=v1&k2=v2..." + secret)` with keys sorted and empty values dropped.
pub fn sign_params(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}
