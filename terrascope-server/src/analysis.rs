// The analysis-ingestion pipeline: validate the upload, dispatch it to the
// model API, persist novel detections, recompute the project summary, and
// compose the combined response. The temp upload travels with the request
// and is removed when it drops, whichever way the pipeline exits.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::Arc;
use terrascope_core::error::{Error, Result};
use terrascope_core::types::{
    AnalysisResponse, AnnotatedDetection, Detection, DetectionId, ProjectId, Summary,
};
use terrascope_inference::{InferenceClient, InferenceParams};
use terrascope_storage::Storage;
use tracing::{debug, info};

use crate::upload::TempUpload;

/// One incoming analysis request, as extracted from the multipart form.
/// Fields are optional here; the pipeline owns the validation order.
#[derive(Debug)]
pub struct AnalyzeRequest {
    pub upload: Option<TempUpload>,
    pub project_id: Option<String>,
    pub model: Option<String>,
    pub confidence: Option<f64>,
    pub iou: Option<f64>,
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    storage: Storage,
    inference: Arc<dyn InferenceClient>,
}

impl AnalysisPipeline {
    pub fn new(storage: Storage, inference: Arc<dyn InferenceClient>) -> Self {
        Self { storage, inference }
    }

    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResponse> {
        let (project_id, params) = self.validate(&request).await?;
        let upload = request.upload.as_ref().ok_or(Error::MissingFile)?;

        let outcome = self.inference.analyze(upload.path(), &params).await?;
        debug!(
            project_id = %project_id,
            detections = outcome.detections.len(),
            "model API returned detections"
        );

        let now = Utc::now();

        // Per-detection dedup/persist operations run concurrently; the store
        // key makes each one an atomic insert-if-absent. Output order follows
        // input order.
        let annotated = join_all(outcome.detections.into_iter().map(|raw| {
            let storage = self.storage.clone();
            async move {
                let record = Detection {
                    id: DetectionId::new(),
                    project_id,
                    label: raw.label.clone(),
                    bbox: raw.coordinates,
                    gps_coordinates: raw.gps_coordinates,
                    confidence: raw.confidence,
                    date: now,
                };
                let inserted = storage.insert_detection_if_absent(&record).await?;
                Ok::<AnnotatedDetection, Error>(AnnotatedDetection {
                    detection: raw,
                    duplicate: !inserted,
                })
            }
        }))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        // Aggregation runs strictly after every write above has completed:
        // the summary is a full recompute over the project's current
        // detection set, never an incremental counter.
        let all = self.storage.detections_for_project(project_id).await?;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for detection in &all {
            *counts.entry(detection.label.clone()).or_insert(0) += 1;
        }
        let summary = Summary::from_counts(project_id, counts, &params.model, now);
        self.storage.upsert_summary(&summary).await?;

        info!(
            project_id = %project_id,
            model = %params.model,
            received = annotated.len(),
            duplicates = annotated.iter().filter(|d| d.duplicate).count(),
            total_stored = all.len(),
            "analysis complete"
        );

        Ok(AnalysisResponse {
            project_id,
            date: now,
            detections: annotated,
            result_image: outcome.result_image,
            summary,
            metadata: outcome.metadata,
        })
    }

    /// Precondition checks, in contract order. No side effects.
    async fn validate(&self, request: &AnalyzeRequest) -> Result<(ProjectId, InferenceParams)> {
        // A received file must actually be on disk and readable. This is an
        // infrastructure failure, distinct from "no file uploaded" below.
        if let Some(upload) = &request.upload {
            match tokio::fs::metadata(upload.path()).await {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(Error::FileUnavailable)
                }
                Err(_) => return Err(Error::FilePermission),
            }
            if tokio::fs::File::open(upload.path()).await.is_err() {
                return Err(Error::FilePermission);
            }
        }

        let raw_project = request
            .project_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingProjectId)?;
        let project_id = ProjectId::parse(raw_project)?;
        if !self.storage.project_exists(project_id).await? {
            return Err(Error::ProjectNotFound);
        }

        if request.upload.is_none() {
            return Err(Error::MissingFile);
        }

        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingModel)?
            .to_string();

        Ok((
            project_id,
            InferenceParams {
                model,
                confidence: request.confidence.unwrap_or(0.5),
                iou: request.iou.unwrap_or(0.5),
            },
        ))
    }
}
