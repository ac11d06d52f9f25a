use std::collections::HashMap;

use crate::domain::DatasetCollection;
use crate::error::Result;

/// Common trait for all import strategies.
///
/// A strategy rewrites the collection in place. Fallible strategies validate everything they
/// need before their first write, so a returned error leaves the collection untouched.
pub trait Strategy: Send + Sync {
    /// Name used in logs, reports and pipeline configuration
    fn name(&self) -> &'static str;

    /// Apply this strategy to the collection
    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome>;

    /// Whether this strategy assumes every dataset has at most one product
    fn requires_single_output(&self) -> bool {
        false
    }

    /// Whether this strategy replaces multi-output datasets by single-output ones
    fn splits_datasets(&self) -> bool {
        false
    }
}

/// Result of applying a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub datasets: usize,
    pub modified_count: usize,
    pub message: String,
    pub metadata: HashMap<String, String>,
}

impl StrategyOutcome {
    pub fn modified(datasets: usize, modified: usize, message: String) -> Self {
        Self {
            datasets,
            modified_count: modified,
            message,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Adapter turning a plain function into a [`Strategy`].
pub struct FnStrategy<F> {
    name: &'static str,
    single_output: bool,
    f: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&mut DatasetCollection) -> Result<usize> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self {
            name,
            single_output: false,
            f,
        }
    }

    pub fn single_output(mut self) -> Self {
        self.single_output = true;
        self
    }
}

impl<F> Strategy for FnStrategy<F>
where
    F: Fn(&mut DatasetCollection) -> Result<usize> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let modified = (self.f)(data)?;
        Ok(StrategyOutcome::modified(
            data.len(),
            modified,
            format!("{}: modified {} records", self.name, modified),
        ))
    }

    fn requires_single_output(&self) -> bool {
        self.single_output
    }
}

pub mod allocation;
pub mod biosphere;
pub mod generic;

pub use allocation::{allocate_multioutput, AllocateMultioutput};
pub use biosphere::{
    drop_unspecified_subcategories, normalize_biosphere_categories, normalize_biosphere_names,
    strip_biosphere_exc_locations, BiosphereMappings, DropUnspecifiedSubcategories,
    NormalizeBiosphereCategories, NormalizeBiosphereNames, StripBiosphereExcLocations,
};
pub use generic::{
    assign_only_product_as_production, assign_only_production_with_amount_as_reference_product,
    clean_integer_codes, link_technosphere_by_activity_hash, set_code_by_activity_hash,
    AssignOnlyProductAsProduction, AssignOnlyProductionWithAmountAsReferenceProduct,
    CleanIntegerCodes, LinkIterableByFields, LinkTechnosphereByActivityHash, SetCodeByActivityHash,
};
