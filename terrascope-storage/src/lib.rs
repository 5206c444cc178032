// TerraScope storage - sled-backed project, detection, and summary stores

pub mod store;

pub use store::Storage;
