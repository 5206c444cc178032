// TerraScope inference - client for the external object-detection service.
//
// The pipeline talks to the model API through the `InferenceClient` trait so
// tests can substitute a fake; the HTTP implementation lives here.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::path::Path;
use terrascope_core::error::{Error, Result};
use terrascope_core::types::{InferenceOutcome, RawDetection};
use tracing::debug;

/// Tuning parameters forwarded with every inference call.
#[derive(Debug, Clone)]
pub struct InferenceParams {
    pub model: String,
    pub confidence: f64,
    pub iou: f64,
}

/// External object-detection collaborator.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submit the image at `file` and return the parsed detection payload.
    async fn analyze(&self, file: &Path, params: &InferenceParams) -> Result<InferenceOutcome>;
}

/// HTTP implementation posting multipart form data to the model API.
///
/// The client is built without a timeout: large images and long-running
/// inference are allowed to take as long as they need, callers supply any
/// upper bound themselves.
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpInferenceClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn analyze(&self, file: &Path, params: &InferenceParams) -> Result<InferenceOutcome> {
        let bytes = tokio::fs::read(file).await?;
        debug!(
            endpoint = %self.endpoint,
            model = %params.model,
            size = bytes.len(),
            "dispatching image to model API"
        );

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name))
            .text("model", params.model.clone())
            .text("confidence", params.confidence.to_string())
            .text("iou", params.iou.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::InferenceRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::InvalidInferenceResponse);
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|_| Error::InvalidInferenceResponse)?;
        parse_outcome(body)
    }
}

/// Validate and parse a model API response body. The `detections` field must
/// be a sequence of well-formed detection objects; `result_image` and
/// `metadata` are carried through as-is, staying absent when the service
/// sent nothing.
pub fn parse_outcome(body: JsonValue) -> Result<InferenceOutcome> {
    let items = body
        .get("detections")
        .and_then(JsonValue::as_array)
        .ok_or(Error::InvalidInferenceResponse)?;

    let detections = items
        .iter()
        .map(|item| serde_json::from_value::<RawDetection>(item.clone()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::InvalidInferenceResponse)?;

    Ok(InferenceOutcome {
        detections,
        result_image: body.get("result_image").cloned(),
        metadata: body.get("metadata").cloned(),
    })
}
