use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Parse a caller-supplied project reference, rejecting malformed input.
    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::from_str(raw)
            .map(Self)
            .map_err(|_| Error::InvalidProjectId(raw.to_string()))
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a stored detection record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectionId(pub Uuid);

impl DetectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DetectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DetectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Four-corner bounding box. Spatial identity for deduplication is exact
/// bit-level equality on all four coordinates, no tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Big-endian bit pattern of the four corners, used as part of the
    /// storage key so two boxes collide iff they are bit-identical.
    pub fn key_bits(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[0..8].copy_from_slice(&self.x1.to_bits().to_be_bytes());
        out[8..16].copy_from_slice(&self.y1.to_bits().to_be_bytes());
        out[16..24].copy_from_slice(&self.x2.to_bits().to_be_bytes());
        out[24..32].copy_from_slice(&self.y2.to_bits().to_be_bytes());
        out
    }
}

/// Optional geolocation attached to a detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A project record. Projects are referenced by the analysis pipeline,
/// never mutated by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One localized object found in one analyzed image.
///
/// Within a project no two stored records share the same
/// `(label, x1, y1, x2, y2)` tuple; the pipeline creates these, it never
/// updates or deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub id: DetectionId,
    pub project_id: ProjectId,
    pub label: String,
    pub bbox: BoundingBox,
    pub gps_coordinates: Option<GpsCoordinates>,
    pub confidence: f64,
    pub date: DateTime<Utc>,
}

/// One raw detection as returned by the inference service. Unknown fields
/// are carried through untouched so the response echoes exactly what the
/// model API produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    pub coordinates: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_coordinates: Option<GpsCoordinates>,
    pub confidence: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

/// Raw detection annotated with the dedup verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedDetection {
    #[serde(flatten)]
    pub detection: RawDetection,
    pub duplicate: bool,
}

/// Parsed, validated output of one inference call. `result_image` and
/// `metadata` are service-defined and passed through unmodified; a field
/// the model API never sent stays absent rather than becoming null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceOutcome {
    pub detections: Vec<RawDetection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_image: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// Grouping name used until land covers are classified per detection.
pub const DEFAULT_LAND_COVER: &str = "Not Specified";

/// One land-cover grouping inside a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandCover {
    pub name: String,
    pub counts: HashMap<String, u64>,
}

/// Derived aggregate of detection counts for a project. Fully recomputed on
/// every successful analysis, one record per project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub project_id: ProjectId,
    pub land_covers: Vec<LandCover>,
    pub filters: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Summary {
    /// Build a summary holding the full per-label tally under the single
    /// "Not Specified" grouping.
    pub fn from_counts(
        project_id: ProjectId,
        counts: HashMap<String, u64>,
        model: &str,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            project_id,
            land_covers: vec![LandCover {
                name: DEFAULT_LAND_COVER.to_string(),
                counts,
            }],
            filters: vec![model.to_string()],
            recorded_at,
        }
    }
}

/// The combined payload returned to the caller after a successful analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub project_id: ProjectId,
    pub date: DateTime<Utc>,
    pub detections: Vec<AnnotatedDetection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_image: Option<JsonValue>,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_parse_roundtrip() {
        let id = ProjectId::new();
        let parsed = ProjectId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_project_id_parse_rejects_garbage() {
        assert!(matches!(
            ProjectId::parse("not-a-uuid"),
            Err(Error::InvalidProjectId(_))
        ));
    }

    #[test]
    fn test_bbox_key_bits_exact_equality() {
        let a = BoundingBox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 };
        let b = BoundingBox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 };
        assert_eq!(a.key_bits(), b.key_bits());

        // The tiniest perturbation must produce a different key.
        let c = BoundingBox { x1: 0.0, y1: 0.0, x2: 10.0 + f64::EPSILON * 16.0, y2: 10.0 };
        assert_ne!(a.key_bits(), c.key_bits());
    }

    #[test]
    fn test_raw_detection_passes_unknown_fields_through() {
        let payload = serde_json::json!({
            "label": "tree",
            "coordinates": {"x1": 0.0, "y1": 0.0, "x2": 10.0, "y2": 10.0},
            "confidence": 0.9,
            "segmentation_mask": "abc123"
        });
        let det: RawDetection = serde_json::from_value(payload).unwrap();
        assert_eq!(det.label, "tree");
        assert_eq!(det.extra["segmentation_mask"], "abc123");

        let back = serde_json::to_value(&det).unwrap();
        assert_eq!(back["segmentation_mask"], "abc123");
        // gps_coordinates was absent on input and must stay absent.
        assert!(back.get("gps_coordinates").is_none());
    }

    #[test]
    fn test_annotated_detection_flattens_duplicate_flag() {
        let det = RawDetection {
            label: "water".to_string(),
            coordinates: BoundingBox { x1: 1.0, y1: 2.0, x2: 3.0, y2: 4.0 },
            gps_coordinates: None,
            confidence: 0.5,
            extra: serde_json::Map::new(),
        };
        let annotated = AnnotatedDetection { detection: det, duplicate: true };
        let value = serde_json::to_value(&annotated).unwrap();
        assert_eq!(value["label"], "water");
        assert_eq!(value["duplicate"], true);
    }

    #[test]
    fn test_summary_from_counts_shape() {
        let mut counts = HashMap::new();
        counts.insert("tree".to_string(), 3u64);
        let summary = Summary::from_counts(ProjectId::new(), counts, "yolo-v8", Utc::now());
        assert_eq!(summary.land_covers.len(), 1);
        assert_eq!(summary.land_covers[0].name, DEFAULT_LAND_COVER);
        assert_eq!(summary.land_covers[0].counts["tree"], 3);
        assert_eq!(summary.filters, vec!["yolo-v8".to_string()]);
    }
}
