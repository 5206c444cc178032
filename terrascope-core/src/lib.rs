// TerraScope core - shared domain types, errors, and configuration

pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
