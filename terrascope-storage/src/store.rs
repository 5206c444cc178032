// Embedded store for projects, detections, and per-project summaries.
//
// Detection records are keyed by their dedup tuple
// (project_id, bbox bits, label) so "insert unless an identical detection
// already exists" is a single atomic compare-and-swap on the tree, with no
// check-then-insert window between concurrent requests.

use chrono::Utc;
use sled::CompareAndSwapError;
use terrascope_core::error::{Error, Result};
use terrascope_core::types::{Detection, Project, ProjectId, Summary};

/// All persistent state, one sled database with one tree per record type.
#[derive(Debug, Clone)]
pub struct Storage {
    projects: sled::Tree,
    detections: sled::Tree,
    summaries: sled::Tree,
}

/// Detection key: 16-byte project id, 32-byte bounding-box bit pattern,
/// label as the variable-length suffix. The fixed-width prefix keeps
/// per-project range scans a plain prefix scan.
fn detection_key(detection: &Detection) -> Vec<u8> {
    let bbox = detection.bbox.key_bits();
    let mut key = Vec::with_capacity(16 + 32 + detection.label.len());
    key.extend_from_slice(detection.project_id.as_bytes());
    key.extend_from_slice(&bbox);
    key.extend_from_slice(detection.label.as_bytes());
    key
}

impl Storage {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = sled::open(path.as_ref())
            .map_err(|e| Error::Storage(format!("Sled open error: {}", e)))?;
        Ok(Self {
            projects: open_tree(&db, "projects")?,
            detections: open_tree(&db, "detections")?,
            summaries: open_tree(&db, "summaries")?,
        })
    }

    /// Create and persist a new project.
    pub async fn create_project(&self, name: &str) -> Result<Project> {
        let project = Project {
            id: ProjectId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let encoded = encode(&project)?;
        self.projects
            .insert(project.id.as_bytes(), encoded)
            .map_err(|e| Error::Storage(format!("Sled insert error: {}", e)))?;
        Ok(project)
    }

    pub async fn project_exists(&self, id: ProjectId) -> Result<bool> {
        self.projects
            .contains_key(id.as_bytes())
            .map_err(|e| Error::Storage(format!("Sled get error: {}", e)))
    }

    pub async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        match self.projects.get(id.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(decode(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Storage(format!("Sled get error: {}", e))),
        }
    }

    /// Persist a detection unless one with the same (project, label, bbox)
    /// tuple is already stored. Returns true when the record was written,
    /// false when an identical detection made it a duplicate.
    pub async fn insert_detection_if_absent(&self, detection: &Detection) -> Result<bool> {
        let key = detection_key(detection);
        let encoded = encode(detection)?;
        match self
            .detections
            .compare_and_swap(key, None::<&[u8]>, Some(encoded))
            .map_err(|e| Error::Storage(format!("Sled cas error: {}", e)))?
        {
            Ok(()) => Ok(true),
            Err(CompareAndSwapError { .. }) => Ok(false),
        }
    }

    /// Every detection currently stored for the project.
    pub async fn detections_for_project(&self, id: ProjectId) -> Result<Vec<Detection>> {
        let mut out = Vec::new();
        for entry in self.detections.scan_prefix(id.as_bytes()) {
            let (_, bytes) =
                entry.map_err(|e| Error::Storage(format!("Sled scan error: {}", e)))?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// Insert-or-replace the summary for its project.
    pub async fn upsert_summary(&self, summary: &Summary) -> Result<()> {
        let encoded = encode(summary)?;
        self.summaries
            .insert(summary.project_id.as_bytes(), encoded)
            .map_err(|e| Error::Storage(format!("Sled insert error: {}", e)))?;
        Ok(())
    }

    pub async fn get_summary(&self, id: ProjectId) -> Result<Option<Summary>> {
        match self.summaries.get(id.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(decode(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Storage(format!("Sled get error: {}", e))),
        }
    }
}

fn open_tree(db: &sled::Db, name: &str) -> Result<sled::Tree> {
    db.open_tree(name)
        .map_err(|e| Error::Storage(format!("Sled tree error: {}", e)))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
}
