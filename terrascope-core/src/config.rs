use std::path::PathBuf;

/// Address of the external model API when none is configured.
pub const DEFAULT_MODEL_API_URL: &str = "http://localhost:5001/predict";

/// Service configuration. Everything works out of the box; each field can be
/// overridden through the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to (`TERRASCOPE_LISTEN_ADDR`).
    pub listen_addr: String,
    /// Directory holding the sled database (`TERRASCOPE_DATA_DIR`).
    pub data_dir: PathBuf,
    /// Directory uploaded files are spooled into (`TERRASCOPE_UPLOAD_DIR`).
    pub upload_dir: PathBuf,
    /// Endpoint of the external inference service (`MODEL_API_URL`).
    pub model_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            data_dir: PathBuf::from("./data"),
            upload_dir: PathBuf::from("./uploads"),
            model_api_url: DEFAULT_MODEL_API_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: std::env::var("TERRASCOPE_LISTEN_ADDR")
                .unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("TERRASCOPE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            upload_dir: std::env::var("TERRASCOPE_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            model_api_url: std::env::var("MODEL_API_URL")
                .unwrap_or(defaults.model_api_url),
        }
    }
}
