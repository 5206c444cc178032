// TerraScope server - HTTP surface and the analysis-ingestion pipeline

pub mod analysis;
pub mod http;
pub mod upload;
