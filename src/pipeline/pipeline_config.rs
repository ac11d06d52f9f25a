use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::fingerprint::FieldList;
use super::linking::LinkOptions;
use super::orchestrator::Pipeline;
use super::strategies::{
    AllocateMultioutput, AssignOnlyProductAsProduction,
    AssignOnlyProductionWithAmountAsReferenceProduct, BiosphereMappings, CleanIntegerCodes,
    DropUnspecifiedSubcategories, LinkIterableByFields, LinkTechnosphereByActivityHash,
    NormalizeBiosphereCategories, NormalizeBiosphereNames, SetCodeByActivityHash, Strategy,
    StripBiosphereExcLocations,
};
use crate::domain::ExchangeType;
use crate::error::{ImportError, Result};
use crate::storage::DatabaseRegistry;

/// Declarative description of an import pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StrategyConfig>,
}

/// Configuration for individual strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyConfig {
    #[serde(rename = "es1_allocate_multioutput")]
    AllocateMultioutput,
    AssignOnlyProductAsProduction,
    AssignOnlyProductionWithAmountAsReferenceProduct,
    CleanIntegerCodes,
    DropUnspecifiedSubcategories,
    NormalizeBiosphereCategories,
    NormalizeBiosphereNames,
    StripBiosphereExcLocations,
    SetCodeByActivityHash {
        fields: FieldList,
    },
    LinkIterableByFields {
        /// Registry database to link against; the collection itself when absent
        #[serde(default)]
        database: Option<String>,
        fields: FieldList,
        #[serde(default)]
        kind: Option<Vec<ExchangeType>>,
        #[serde(default)]
        relink: bool,
    },
    LinkTechnosphereByActivityHash {
        #[serde(default)]
        external_db: Option<String>,
        fields: FieldList,
    },
}

impl StrategyConfig {
    /// Get the step name used in logs and ordering errors
    pub fn step_name(&self) -> &'static str {
        match self {
            StrategyConfig::AllocateMultioutput => "es1_allocate_multioutput",
            StrategyConfig::AssignOnlyProductAsProduction => "assign_only_product_as_production",
            StrategyConfig::AssignOnlyProductionWithAmountAsReferenceProduct => {
                "assign_only_production_with_amount_as_reference_product"
            }
            StrategyConfig::CleanIntegerCodes => "clean_integer_codes",
            StrategyConfig::DropUnspecifiedSubcategories => "drop_unspecified_subcategories",
            StrategyConfig::NormalizeBiosphereCategories => "normalize_biosphere_categories",
            StrategyConfig::NormalizeBiosphereNames => "normalize_biosphere_names",
            StrategyConfig::StripBiosphereExcLocations => "strip_biosphere_exc_locations",
            StrategyConfig::SetCodeByActivityHash { .. } => "set_code_by_activity_hash",
            StrategyConfig::LinkIterableByFields { .. } => "link_iterable_by_fields",
            StrategyConfig::LinkTechnosphereByActivityHash { .. } => {
                "link_technosphere_by_activity_hash"
            }
        }
    }

    pub fn requires_single_output(&self) -> bool {
        matches!(
            self,
            StrategyConfig::AssignOnlyProductAsProduction
                | StrategyConfig::AssignOnlyProductionWithAmountAsReferenceProduct
                | StrategyConfig::SetCodeByActivityHash { .. }
        )
    }

    pub fn splits_datasets(&self) -> bool {
        matches!(self, StrategyConfig::AllocateMultioutput)
    }

    /// Field list used to match the collection against itself, if this step does so
    fn internal_fields(&self) -> Option<&FieldList> {
        match self {
            StrategyConfig::SetCodeByActivityHash { fields } => Some(fields),
            StrategyConfig::LinkIterableByFields {
                database: None,
                fields,
                ..
            } => Some(fields),
            StrategyConfig::LinkTechnosphereByActivityHash {
                external_db: None,
                fields,
            } => Some(fields),
            _ => None,
        }
    }

    /// Create a strategy instance from configuration
    pub fn build(
        &self,
        registry: &Arc<dyn DatabaseRegistry>,
        mappings: &BiosphereMappings,
    ) -> Arc<dyn Strategy> {
        match self {
            StrategyConfig::AllocateMultioutput => Arc::new(AllocateMultioutput),
            StrategyConfig::AssignOnlyProductAsProduction => {
                Arc::new(AssignOnlyProductAsProduction)
            }
            StrategyConfig::AssignOnlyProductionWithAmountAsReferenceProduct => {
                Arc::new(AssignOnlyProductionWithAmountAsReferenceProduct)
            }
            StrategyConfig::CleanIntegerCodes => Arc::new(CleanIntegerCodes),
            StrategyConfig::DropUnspecifiedSubcategories => Arc::new(DropUnspecifiedSubcategories),
            StrategyConfig::NormalizeBiosphereCategories => Arc::new(
                NormalizeBiosphereCategories::new(mappings.categories.clone()),
            ),
            StrategyConfig::NormalizeBiosphereNames => {
                Arc::new(NormalizeBiosphereNames::new(mappings.names.clone()))
            }
            StrategyConfig::StripBiosphereExcLocations => Arc::new(StripBiosphereExcLocations),
            StrategyConfig::SetCodeByActivityHash { fields } => {
                Arc::new(SetCodeByActivityHash::new(fields.clone()))
            }
            StrategyConfig::LinkIterableByFields {
                database,
                fields,
                kind,
                relink,
            } => {
                let mut options = LinkOptions::new(fields.clone()).with_relink(*relink);
                options.kind = kind.clone();
                match database {
                    Some(db) => Arc::new(LinkIterableByFields::external(
                        Arc::clone(registry),
                        db.clone(),
                        options,
                    )),
                    None => Arc::new(LinkIterableByFields::internal(
                        Arc::clone(registry),
                        options,
                    )),
                }
            }
            StrategyConfig::LinkTechnosphereByActivityHash {
                external_db,
                fields,
            } => Arc::new(LinkTechnosphereByActivityHash::new(
                Arc::clone(registry),
                external_db.clone(),
                fields.clone(),
            )),
        }
    }
}

/// Reject any dataset-splitting step that appears after a step assuming single-output datasets.
pub(crate) fn check_single_output_order<'a, I>(steps: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, bool, bool)>,
{
    let mut first_single_output: Option<&str> = None;
    for (name, splits, single_output) in steps {
        if splits {
            if let Some(earlier) = first_single_output {
                return Err(ImportError::Config(format!(
                    "Step '{}' must run before '{}', which assumes single-output datasets",
                    name, earlier
                )));
            }
        }
        if single_output && first_single_output.is_none() {
            first_single_output = Some(name);
        }
    }
    Ok(())
}

impl PipelineConfig {
    /// Base strategy sequence for single-output Ecospold1 data
    pub fn single_output_ecospold1(biosphere_db: &str, fields: &FieldList) -> Self {
        Self {
            name: "single_output_ecospold1".to_string(),
            description: "Import and process single-output Ecospold1 datasets".to_string(),
            steps: vec![
                StrategyConfig::AssignOnlyProductAsProduction,
                StrategyConfig::CleanIntegerCodes,
                StrategyConfig::DropUnspecifiedSubcategories,
                StrategyConfig::NormalizeBiosphereCategories,
                StrategyConfig::NormalizeBiosphereNames,
                StrategyConfig::StripBiosphereExcLocations,
                StrategyConfig::SetCodeByActivityHash {
                    fields: fields.clone(),
                },
                StrategyConfig::LinkIterableByFields {
                    database: Some(biosphere_db.to_string()),
                    fields: fields.clone(),
                    kind: Some(vec![ExchangeType::Biosphere]),
                    relink: false,
                },
                StrategyConfig::LinkTechnosphereByActivityHash {
                    external_db: None,
                    fields: fields.clone(),
                },
            ],
        }
    }

    /// Multi-output Ecospold1: allocation ahead of a freshly built single-output sequence
    pub fn multi_output_ecospold1(biosphere_db: &str, fields: &FieldList) -> Self {
        let base = Self::single_output_ecospold1(biosphere_db, fields);
        Self {
            name: "multi_output_ecospold1".to_string(),
            description: "Allocate multi-output Ecospold1 datasets, then process as single-output"
                .to_string(),
            steps: std::iter::once(StrategyConfig::AllocateMultioutput)
                .chain(base.steps)
                .collect(),
        }
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(ImportError::Config(format!(
                "Pipeline '{}' must have at least one step",
                self.name
            )));
        }

        check_single_output_order(
            self.steps
                .iter()
                .map(|s| (s.step_name(), s.splits_datasets(), s.requires_single_output())),
        )?;

        let mut internal = self.steps.iter().filter_map(|s| s.internal_fields());
        if let Some(first) = internal.next() {
            if internal.any(|fields| fields != first) {
                warn!(
                    "Pipeline '{}' sets codes and links internally with different field lists; internal links may silently fail to match",
                    self.name
                );
            }
        }

        Ok(())
    }

    /// Validate and instantiate every step
    pub fn build(
        &self,
        registry: Arc<dyn DatabaseRegistry>,
        mappings: &BiosphereMappings,
    ) -> Result<Pipeline> {
        self.validate()?;
        let steps = self
            .steps
            .iter()
            .map(|step| step.build(&registry, mappings))
            .collect();
        Ok(Pipeline::new(self.name.clone(), steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::fingerprint::Field;
    use crate::storage::InMemoryRegistry;

    #[test]
    fn test_multi_output_prepends_allocation_without_touching_base() {
        let fields = FieldList::default();
        let base = PipelineConfig::single_output_ecospold1("biosphere3", &fields);
        let multi = PipelineConfig::multi_output_ecospold1("biosphere3", &fields);
        let again = PipelineConfig::multi_output_ecospold1("biosphere3", &fields);

        assert_eq!(multi.steps.len(), base.steps.len() + 1);
        assert_eq!(multi.steps[0], StrategyConfig::AllocateMultioutput);
        assert_eq!(&multi.steps[1..], base.steps.as_slice());
        assert_eq!(multi, again);
        assert!(!base.steps.contains(&StrategyConfig::AllocateMultioutput));
    }

    #[test]
    fn test_allocation_after_single_output_step_is_rejected() {
        let config = PipelineConfig {
            name: "misordered".to_string(),
            description: String::new(),
            steps: vec![
                StrategyConfig::AssignOnlyProductAsProduction,
                StrategyConfig::AllocateMultioutput,
            ],
        };

        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("es1_allocate_multioutput"));
    }

    #[test]
    fn test_empty_pipeline_is_rejected() {
        let config = PipelineConfig {
            name: "empty".to_string(),
            description: String::new(),
            steps: Vec::new(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets_validate() {
        let fields = FieldList::default();
        assert!(PipelineConfig::single_output_ecospold1("b", &fields).validate().is_ok());
        assert!(PipelineConfig::multi_output_ecospold1("b", &fields).validate().is_ok());
    }

    #[test]
    fn test_parses_from_toml() {
        let config: PipelineConfig = toml::from_str(
            r#"
            name = "custom"

            [[steps]]
            strategy = "es1_allocate_multioutput"

            [[steps]]
            strategy = "set_code_by_activity_hash"
            fields = ["name", "location"]

            [[steps]]
            strategy = "link_iterable_by_fields"
            database = "biosphere3"
            fields = ["name", "categories"]
            kind = ["biosphere"]
            "#,
        )
        .unwrap();

        assert_eq!(config.steps.len(), 3);
        assert_eq!(
            config.steps[1],
            StrategyConfig::SetCodeByActivityHash {
                fields: FieldList::new(vec![Field::Name, Field::Location]).unwrap()
            }
        );
        match &config.steps[2] {
            StrategyConfig::LinkIterableByFields {
                database,
                kind,
                relink,
                ..
            } => {
                assert_eq!(database.as_deref(), Some("biosphere3"));
                assert_eq!(kind.as_deref(), Some(&[ExchangeType::Biosphere][..]));
                assert!(!relink);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_build_creates_steps_in_order() {
        let registry: Arc<dyn DatabaseRegistry> = Arc::new(InMemoryRegistry::new());
        let pipeline = PipelineConfig::multi_output_ecospold1("biosphere3", &FieldList::default())
            .build(registry, &BiosphereMappings::default())
            .unwrap();

        let names = pipeline.step_names();
        assert_eq!(names.first(), Some(&"es1_allocate_multioutput"));
        assert_eq!(names.last(), Some(&"link_technosphere_by_activity_hash"));
        assert_eq!(names.len(), 10);
    }
}
