use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("project_id is required")]
    MissingProjectId,

    #[error("project_id is not a valid identifier: {0}")]
    InvalidProjectId(String),

    #[error("Project does not exist.")]
    ProjectNotFound,

    #[error("No file uploaded.")]
    MissingFile,

    #[error("model is required")]
    MissingModel,

    #[error("Uploaded file not found.")]
    FileUnavailable,

    #[error("Cannot read uploaded file. Permission issue.")]
    FilePermission,

    #[error("Invalid response from model API.")]
    InvalidInferenceResponse,

    #[error("Model API request failed: {0}")]
    InferenceRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Client errors: bad or missing request input, no side effects occurred.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MissingProjectId
                | Error::InvalidProjectId(_)
                | Error::MissingFile
                | Error::MissingModel
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ProjectNotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
