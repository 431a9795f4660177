use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ClassifierConfig;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("classifier answered with status {0}")]
    Status(u16),
    #[error("classifier response is malformed: {0}")]
    Payload(String),
    #[error("classifier reported status '{0}'")]
    Rejected(String),
}

/// The file as received from the client, forwarded verbatim.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A successful classifier answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub image_base64: String,
    /// `[scene, place, time_of_day, weather]`
    pub labels: Vec<String>,
    /// Detection label -> `[x, y, w, h]` boxes, in response order.
    pub detections: Vec<(String, Vec<Vec<f64>>)>,
    pub applied_filters: Vec<String>,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, file: &UploadedFile, prompt: &str) -> Result<Classification, ClassifierError>;
}

/// Classifier reached over HTTP with a multipart `image` + `text` request.
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(cfg: &ClassifierConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(cfg.timeout_secs)).build()?;
        Ok(Self { client, url: cfg.url.clone() })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, file: &UploadedFile, prompt: &str) -> Result<Classification, ClassifierError> {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(ct) = file.content_type.as_deref() {
            part = part.mime_str(ct)?;
        }
        let form = Form::new().part("image", part).text("text", prompt.to_string());

        tracing::debug!(url = %self.url, bytes = file.bytes.len(), "sending image to classifier");
        let response = self.client.post(&self.url).multipart(form).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClassifierError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        parse_response(&body)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<Payload>,
}

#[derive(Deserialize)]
struct Payload {
    image_base64: String,
    classification: Vec<String>,
    #[serde(default)]
    detection: Map<String, Value>,
    #[serde(default)]
    applied_filters: Vec<String>,
}

/// Parses the classifier's JSON body; anything but `status == "success"` is rejected.
pub fn parse_response(body: &[u8]) -> Result<Classification, ClassifierError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| ClassifierError::Payload(e.to_string()))?;

    let status = envelope.status.unwrap_or_default();
    if status != "success" {
        return Err(ClassifierError::Rejected(status));
    }
    let data = envelope.data.ok_or_else(|| ClassifierError::Payload("missing data".to_string()))?;

    let mut detections = Vec::with_capacity(data.detection.len());
    for (label, boxes) in data.detection {
        let boxes = parse_boxes(&label, boxes);
        detections.push((label, boxes));
    }

    Ok(Classification {
        image_base64: data.image_base64,
        labels: data.classification,
        detections,
        applied_filters: data.applied_filters,
    })
}

/// Keeps the boxes of one label that are exactly four finite numbers.
fn parse_boxes(label: &str, boxes: Value) -> Vec<Vec<f64>> {
    let Value::Array(boxes) = boxes else {
        tracing::warn!(label, "detection boxes are not a list, ignoring label");
        return Vec::new();
    };
    boxes
        .into_iter()
        .filter_map(|bbox| {
            let parsed = serde_json::from_value::<[f64; 4]>(bbox.clone())
                .ok()
                .filter(|b| b.iter().all(|v| v.is_finite()));
            if parsed.is_none() {
                tracing::debug!(label, %bbox, "skipping malformed detection box");
            }
            parsed.map(|b| b.to_vec())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_and_keeps_detection_order() {
        let body = br#"{
            "status": "success",
            "data": {
                "image_base64": "AAAA",
                "classification": ["outdoor", "beach", "day", "sunny"],
                "detection": {"zebra": [[0, 0, 1, 1]], "apple": [[1, 2, 3, 4], [0, 0, 5, 5]]},
                "applied_filters": ["none", "sepia", "vivid"]
            }
        }"#;
        let c = parse_response(body).unwrap();
        assert_eq!(c.labels, vec!["outdoor", "beach", "day", "sunny"]);
        let labels: Vec<&str> = c.detections.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["zebra", "apple"]);
        assert_eq!(c.detections[1].1, vec![vec![1.0, 2.0, 3.0, 4.0], vec![0.0, 0.0, 5.0, 5.0]]);
        assert_eq!(c.applied_filters.len(), 3);
    }

    #[test]
    fn missing_detection_and_filters_default_to_empty() {
        let body = br#"{"status":"success","data":{"image_base64":"AAAA","classification":["a","b","c","d"]}}"#;
        let c = parse_response(body).unwrap();
        assert!(c.detections.is_empty());
        assert!(c.applied_filters.is_empty());
    }

    #[test]
    fn non_success_status_is_rejected() {
        let body = br#"{"status":"error","message":"model offline"}"#;
        assert!(matches!(parse_response(body), Err(ClassifierError::Rejected(s)) if s == "error"));
    }

    #[test]
    fn invalid_json_is_a_payload_error() {
        assert!(matches!(parse_response(b"<html>"), Err(ClassifierError::Payload(_))));
        let body = br#"{"status":"success","data":{"classification":[]}}"#;
        assert!(matches!(parse_response(body), Err(ClassifierError::Payload(_))));
    }

    #[test]
    fn malformed_boxes_are_dropped_not_fatal() {
        let body = br#"{"status":"success","data":{"image_base64":"A","classification":[],
            "detection":{"cat":[[0,0,"10",10]],"dog":[[0,0,5,5],[1,2,3],[1,2,3,4,5]],"x":"nope"}}}"#;
        let c = parse_response(body).unwrap();
        assert_eq!(
            c.detections,
            vec![
                ("cat".to_string(), vec![]),
                ("dog".to_string(), vec![vec![0.0, 0.0, 5.0, 5.0]]),
                ("x".to_string(), vec![]),
            ]
        );
        assert_eq!(crate::imaging::primary_object(&c.detections).as_deref(), Some("dog"));
    }
}
