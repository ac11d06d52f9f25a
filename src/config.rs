use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ImportError, Result};
use crate::pipeline::strategies::BiosphereMappings;
use crate::pipeline::{FieldList, PipelineConfig};

/// Environment variable naming the config file to load
pub const CONFIG_PATH_ENV: &str = "LCI_IMPORTER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub biosphere_database: String,
    pub link_fields: FieldList,
    pub logging: LoggingConfig,
    pub biosphere: BiosphereConfig,
    /// Replaces the importer's built-in strategy sequence when present
    pub pipeline: Option<PipelineConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            biosphere_database: "biosphere3".to_string(),
            link_fields: FieldList::default(),
            logging: LoggingConfig::default(),
            biosphere: BiosphereConfig::default(),
            pipeline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_prefix: String,
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_prefix: "importer.log".to_string(),
            default_filter: "lci_importer=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub from: Vec<String>,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameMapping {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiosphereConfig {
    pub category_mappings: Vec<CategoryMapping>,
    pub name_mappings: Vec<NameMapping>,
}

impl Default for BiosphereConfig {
    fn default() -> Self {
        Self {
            category_mappings: default_category_mappings(),
            name_mappings: Vec::new(),
        }
    }
}

/// Ecospold1 elementary flow categories and their ecoinvent 3 spelling
fn default_category_mappings() -> Vec<CategoryMapping> {
    let pairs: [(&[&str], &[&str]); 7] = [
        (
            &["air", "high population density"],
            &["air", "urban air close to ground"],
        ),
        (
            &["air", "low population density"],
            &["air", "non-urban air or from high stacks"],
        ),
        (&["resource"], &["natural resource"]),
        (&["resource", "biotic"], &["natural resource", "biotic"]),
        (&["resource", "in air"], &["natural resource", "in air"]),
        (&["resource", "in ground"], &["natural resource", "in ground"]),
        (&["resource", "in water"], &["natural resource", "in water"]),
    ];
    pairs
        .iter()
        .map(|(from, to)| CategoryMapping {
            from: from.iter().map(|s| s.to_string()).collect(),
            to: to.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}

impl BiosphereConfig {
    pub fn mappings(&self) -> BiosphereMappings {
        BiosphereMappings {
            categories: self
                .category_mappings
                .iter()
                .map(|m| (m.from.clone(), m.to.clone()))
                .collect(),
            names: self
                .name_mappings
                .iter()
                .map(|m| (m.from.clone(), m.to.clone()))
                .collect::<HashMap<_, _>>(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            ImportError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        if let Some(pipeline) = &config.pipeline {
            pipeline.validate()?;
        }
        Ok(config)
    }

    /// Load from `path`, else `$LCI_IMPORTER_CONFIG`, else `config.toml` if it exists, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load(path);
        }
        if Path::new(DEFAULT_CONFIG_PATH).is_file() {
            return Self::load(DEFAULT_CONFIG_PATH);
        }
        Ok(Self::default())
    }
}
