use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::domain::Dataset;
use crate::error::{ImportError, Result};

/// Registry of named databases: existence checks, record iteration and persistence.
pub trait DatabaseRegistry: Send + Sync {
    /// Whether a database with this name is registered
    fn contains(&self, name: &str) -> bool;

    /// All member records of a database, materialized
    fn records(&self, name: &str) -> Result<Vec<Dataset>>;

    /// Replace the contents of a database, registering it if needed
    fn write(&self, name: &str, data: &[Dataset]) -> Result<()>;

    /// Names of all registered databases, sorted
    fn names(&self) -> Result<Vec<String>>;
}

/// In-memory registry for development/testing
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    databases: Arc<Mutex<HashMap<String, Vec<Dataset>>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(self, name: &str, data: Vec<Dataset>) -> Self {
        self.lock().insert(name.to_string(), data);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Dataset>>> {
        self.databases
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DatabaseRegistry for InMemoryRegistry {
    fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    fn records(&self, name: &str) -> Result<Vec<Dataset>> {
        self.lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ImportError::UnknownDatabase(name.to_string()))
    }

    fn write(&self, name: &str, data: &[Dataset]) -> Result<()> {
        self.lock().insert(name.to_string(), data.to_vec());
        debug!("Wrote {} datasets to in-memory database {}", data.len(), name);
        Ok(())
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Registry storing each database as `<root>/<name>.json`
#[derive(Debug, Clone)]
pub struct JsonDirectoryRegistry {
    root: PathBuf,
}

impl JsonDirectoryRegistry {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }
}

impl DatabaseRegistry for JsonDirectoryRegistry {
    fn contains(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    fn records(&self, name: &str) -> Result<Vec<Dataset>> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(ImportError::UnknownDatabase(name.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        let records: Vec<Dataset> = serde_json::from_str(&content)?;
        debug!("Read {} records from {}", records.len(), path.display());
        Ok(records)
    }

    fn write(&self, name: &str, data: &[Dataset]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(name);
        let content = serde_json::to_string_pretty(data)?;
        fs::write(&path, content)?;
        info!("Wrote {} datasets to {}", data.len(), path.display());
        Ok(())
    }

    fn names(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn flow(code: &str) -> Dataset {
        Dataset::new("biosphere3").with_code(code).with_name("Carbon dioxide, fossil")
    }

    #[test]
    fn test_in_memory_registry_round_trip() {
        let registry = InMemoryRegistry::new().with_database("biosphere3", vec![flow("co2")]);

        assert!(registry.contains("biosphere3"));
        assert!(!registry.contains("ecoinvent"));
        assert_eq!(registry.records("biosphere3").unwrap().len(), 1);

        registry.write("mine", &[flow("a"), flow("b")]).unwrap();
        assert_eq!(registry.names().unwrap(), vec!["biosphere3", "mine"]);
    }

    #[test]
    fn test_unknown_database_is_configuration_error() {
        let registry = InMemoryRegistry::new();
        let err = registry.records("nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_json_directory_registry() {
        let dir = tempdir().unwrap();
        let registry = JsonDirectoryRegistry::new(dir.path().join("dbs"));

        assert!(!registry.contains("biosphere3"));
        assert!(registry.names().unwrap().is_empty());

        registry.write("biosphere3", &[flow("co2")]).unwrap();

        assert!(registry.contains("biosphere3"));
        assert_eq!(registry.records("biosphere3").unwrap(), vec![flow("co2")]);
        assert_eq!(registry.names().unwrap(), vec!["biosphere3"]);
    }
}
