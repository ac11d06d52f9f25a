//! Ecospold1-style importers: extraction, the variant strategy pipeline and persistence.

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::domain::{DatasetCollection, Exchange};
use crate::error::{ImportError, Result};
use crate::extract::Extractor;
use crate::pipeline::strategies::AllocateMultioutput;
use crate::pipeline::{activity_hash, FieldList, Pipeline, PipelineConfig, PipelineExecutionResult};
use crate::storage::DatabaseRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImporterVariant {
    /// Datasets with a single reference product
    SingleOutputEcospold1,
    /// Allocated multi-output datasets, split before single-output processing
    MultiOutputEcospold1,
}

impl ImporterVariant {
    /// Declarative form of this variant's strategy sequence
    pub fn pipeline_config(&self, config: &Config) -> PipelineConfig {
        match self {
            ImporterVariant::SingleOutputEcospold1 => PipelineConfig::single_output_ecospold1(
                &config.biosphere_database,
                &config.link_fields,
            ),
            ImporterVariant::MultiOutputEcospold1 => PipelineConfig::multi_output_ecospold1(
                &config.biosphere_database,
                &config.link_fields,
            ),
        }
    }

    /// Build the strategy pipeline, honouring a custom pipeline from the config if present
    pub fn pipeline(
        &self,
        config: &Config,
        registry: Arc<dyn DatabaseRegistry>,
    ) -> Result<Pipeline> {
        let mappings = config.biosphere.mappings();
        if let Some(custom) = &config.pipeline {
            return custom.build(registry, &mappings);
        }

        let base = ImporterVariant::SingleOutputEcospold1
            .pipeline_config(config)
            .build(registry, &mappings)?;
        Ok(match self {
            ImporterVariant::SingleOutputEcospold1 => base,
            ImporterVariant::MultiOutputEcospold1 => {
                base.prepend("multi_output_ecospold1", Arc::new(AllocateMultioutput))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportStatistics {
    pub datasets: usize,
    pub exchanges: usize,
    pub unlinked: usize,
}

pub struct LciImporter {
    db_name: String,
    data: DatasetCollection,
    pipeline: Pipeline,
    registry: Arc<dyn DatabaseRegistry>,
    fields: FieldList,
}

impl LciImporter {
    /// Extract `path` into a new importer for database `db_name`
    pub fn new(
        extractor: &dyn Extractor,
        path: &Path,
        db_name: &str,
        variant: ImporterVariant,
        config: &Config,
        registry: Arc<dyn DatabaseRegistry>,
    ) -> Result<Self> {
        let start = Instant::now();
        let data = extractor.extract(path, db_name)?;
        info!(
            "Extracted {} datasets in {:.2} seconds",
            data.len(),
            start.elapsed().as_secs_f64()
        );
        Self::from_data(db_name, data, variant, config, registry)
    }

    /// Wrap already extracted datasets
    pub fn from_data(
        db_name: &str,
        data: DatasetCollection,
        variant: ImporterVariant,
        config: &Config,
        registry: Arc<dyn DatabaseRegistry>,
    ) -> Result<Self> {
        let pipeline = variant.pipeline(config, Arc::clone(&registry))?;
        Ok(Self {
            db_name: db_name.to_string(),
            data,
            pipeline,
            registry,
            fields: config.link_fields.clone(),
        })
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn data(&self) -> &DatasetCollection {
        &self.data
    }

    pub fn into_data(self) -> DatasetCollection {
        self.data
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the variant pipeline. On failure the datasets are left as the last successful step
    /// produced them and must be re-extracted before use.
    pub fn apply_strategies(&mut self) -> Result<PipelineExecutionResult> {
        self.pipeline.apply(&mut self.data)
    }

    pub fn statistics(&self) -> ImportStatistics {
        let exchanges = self.data.iter().map(|ds| ds.exchanges.len()).sum();
        let unlinked = self
            .data
            .iter()
            .flat_map(|ds| ds.exchanges.iter())
            .filter(|exc| !exc.is_linked())
            .count();
        let stats = ImportStatistics {
            datasets: self.data.len(),
            exchanges,
            unlinked,
        };
        info!(
            "{} datasets\n{} exchanges\n{} unlinked exchanges",
            stats.datasets, stats.exchanges, stats.unlinked
        );
        stats
    }

    /// Distinct unlinked exchanges, by type and fingerprint, in first-seen order
    pub fn unlinked(&self) -> Vec<&Exchange> {
        let mut seen = HashSet::new();
        self.data
            .iter()
            .flat_map(|ds| ds.exchanges.iter())
            .filter(|exc| !exc.is_linked())
            .filter(|exc| seen.insert((exc.exchange_type, activity_hash(*exc, &self.fields))))
            .collect()
    }

    /// Persist the datasets through the registry.
    pub fn write_database(&self, allow_unlinked: bool) -> Result<usize> {
        let unlinked = self.statistics().unlinked;
        if unlinked > 0 && !allow_unlinked {
            return Err(ImportError::Config(format!(
                "Database {} still has {} unlinked exchanges; link them or allow unlinked writes",
                self.db_name, unlinked
            )));
        }
        self.registry.write(&self.db_name, &self.data)?;
        info!("Wrote {} datasets to database {}", self.data.len(), self.db_name);
        Ok(self.data.len())
    }
}
