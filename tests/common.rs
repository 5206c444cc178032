#![allow(dead_code)]
// Shared fixtures for the integration tests: substitutable inference fakes
// and canned model-API bodies.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use terrascope_core::error::{Error, Result};
use terrascope_core::types::InferenceOutcome;
use terrascope_inference::{parse_outcome, InferenceClient, InferenceParams};

/// Inference fake returning a canned JSON body and recording call params.
pub struct FakeInference {
    pub body: serde_json::Value,
    pub calls: Mutex<Vec<InferenceParams>>,
}

impl FakeInference {
    pub fn new(body: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            body,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl InferenceClient for FakeInference {
    async fn analyze(&self, file: &Path, params: &InferenceParams) -> Result<InferenceOutcome> {
        // Mimic the real dispatcher: the spooled upload must be readable.
        let _ = tokio::fs::read(file).await?;
        self.calls.lock().unwrap().push(params.clone());
        parse_outcome(self.body.clone())
    }
}

/// Inference fake that always fails at the transport level.
pub struct UnreachableInference;

#[async_trait]
impl InferenceClient for UnreachableInference {
    async fn analyze(
        &self,
        _file: &Path,
        _params: &InferenceParams,
    ) -> Result<InferenceOutcome> {
        Err(Error::InferenceRequest("connection refused".to_string()))
    }
}

pub fn detection_json(
    label: &str,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
) -> serde_json::Value {
    serde_json::json!({
        "label": label,
        "coordinates": {"x1": x1, "y1": y1, "x2": x2, "y2": y2},
        "confidence": confidence
    })
}

pub fn inference_body(detections: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "detections": detections,
        "result_image": "results/analyzed.png",
        "metadata": {"inference_ms": 42}
    })
}
