use std::fs;
use std::path::Path;
use tracing::debug;

use crate::domain::DatasetCollection;
use crate::error::Result;

/// Produces canonical datasets from an export, tagging each with the target database name.
pub trait Extractor {
    fn extract(&self, path: &Path, db_name: &str) -> Result<DatasetCollection>;
}

/// Reads datasets already in canonical shape from a JSON array.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn extract(&self, path: &Path, db_name: &str) -> Result<DatasetCollection> {
        let content = fs::read_to_string(path)?;
        let mut data: DatasetCollection = serde_json::from_str(&content)?;
        for ds in data.iter_mut() {
            ds.database = db_name.to_string();
        }
        debug!("Read {} datasets from {}", data.len(), path.display());
        Ok(data)
    }
}
