//! Generic strategies shared by all importers.

use std::sync::Arc;
use tracing::{debug, info};

use super::{Strategy, StrategyOutcome};
use crate::domain::{Dataset, DatasetCollection, ExchangeType, NodeType};
use crate::error::{ImportError, Result};
use crate::pipeline::fingerprint::{activity_hash, FieldList};
use crate::pipeline::linking::{link_iterable_by_fields, LinkOptions, LinkReport, LinkTarget};
use crate::storage::DatabaseRegistry;

/// If a dataset has no reference product and exactly one product, copy that product's name,
/// unit and amount onto the dataset.
pub fn assign_only_product_as_production(data: &mut [Dataset]) -> usize {
    let mut modified = 0;
    for ds in data.iter_mut() {
        if ds.reference_product.is_some() {
            continue;
        }
        if let [product] = ds.products.as_slice() {
            ds.name = Some(product.name.clone());
            ds.unit = Some(product.unit.clone());
            ds.production_amount = Some(product.amount);
            modified += 1;
        }
    }
    modified
}

/// If exactly one product has a non-zero amount, make it the reference product.
pub fn assign_only_production_with_amount_as_reference_product(data: &mut [Dataset]) -> usize {
    let mut modified = 0;
    for ds in data.iter_mut() {
        let mut amounted = ds.products.iter().filter(|p| p.amount != 0.0);
        let (Some(product), None) = (amounted.next(), amounted.next()) else {
            continue;
        };
        let product = product.clone();
        ds.name = Some(product.name.clone());
        ds.reference_product = Some(product.name);
        ds.unit = Some(product.unit);
        ds.production_amount = Some(product.amount);
        modified += 1;
    }
    modified
}

/// Set each dataset's `code` to its fingerprint over `fields`.
pub fn set_code_by_activity_hash(data: &mut [Dataset], fields: &FieldList) -> usize {
    for ds in data.iter_mut() {
        ds.code = Some(activity_hash(ds, fields).into_string());
    }
    data.len()
}

/// Drop extractor-assigned integer codes from datasets and local ids from exchanges.
pub fn clean_integer_codes(data: &mut [Dataset]) -> usize {
    let mut modified = 0;
    for ds in data.iter_mut() {
        let mut touched = false;
        if ds
            .code
            .as_deref()
            .is_some_and(|code| code.trim().parse::<i64>().is_ok())
        {
            ds.code = None;
            touched = true;
        }
        for exc in ds.exchanges.iter_mut() {
            touched |= exc.local_id.take().is_some();
        }
        if touched {
            modified += 1;
        }
    }
    modified
}

/// Link technosphere, substitution and production exchanges by fingerprint.
///
/// With `external_db`, link against the process records of that database; it must be
/// registered. Otherwise link the collection against itself.
pub fn link_technosphere_by_activity_hash(
    data: &mut [Dataset],
    registry: &dyn DatabaseRegistry,
    external_db: Option<&str>,
    fields: &FieldList,
) -> Result<LinkReport> {
    let options = LinkOptions::new(fields.clone()).with_kind(ExchangeType::TECHNOSPHERE);
    match external_db {
        Some(name) => {
            if !registry.contains(name) {
                return Err(ImportError::UnknownDatabase(name.to_string()));
            }
            let processes: Vec<Dataset> = registry
                .records(name)?
                .into_iter()
                .filter(|ds| ds.node_type == NodeType::Process)
                .collect();
            link_iterable_by_fields(data, LinkTarget::External(&processes), &options)
        }
        None => link_iterable_by_fields(data, LinkTarget::Internal, &options),
    }
}

fn link_outcome(data: &DatasetCollection, name: &str, report: LinkReport) -> StrategyOutcome {
    StrategyOutcome::modified(
        data.len(),
        report.linked,
        format!(
            "{}: linked {} of {} exchanges",
            name, report.linked, report.considered
        ),
    )
    .with_metadata("candidates", report.candidates)
    .with_metadata("unresolved", report.unresolved)
}

pub struct AssignOnlyProductAsProduction;

impl Strategy for AssignOnlyProductAsProduction {
    fn name(&self) -> &'static str {
        "assign_only_product_as_production"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let modified = assign_only_product_as_production(data);
        Ok(StrategyOutcome::modified(
            data.len(),
            modified,
            format!("Assigned sole product on {} datasets", modified),
        ))
    }

    fn requires_single_output(&self) -> bool {
        true
    }
}

pub struct AssignOnlyProductionWithAmountAsReferenceProduct;

impl Strategy for AssignOnlyProductionWithAmountAsReferenceProduct {
    fn name(&self) -> &'static str {
        "assign_only_production_with_amount_as_reference_product"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let modified = assign_only_production_with_amount_as_reference_product(data);
        let unresolved = data.iter().filter(|ds| ds.reference_product.is_none()).count();
        Ok(StrategyOutcome::modified(
            data.len(),
            modified,
            format!("Assigned non-zero product on {} datasets", modified),
        )
        .with_metadata("without_reference_product", unresolved))
    }

    fn requires_single_output(&self) -> bool {
        true
    }
}

pub struct SetCodeByActivityHash {
    fields: FieldList,
}

impl SetCodeByActivityHash {
    pub fn new(fields: FieldList) -> Self {
        Self { fields }
    }
}

impl Strategy for SetCodeByActivityHash {
    fn name(&self) -> &'static str {
        "set_code_by_activity_hash"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let modified = set_code_by_activity_hash(data, &self.fields);
        Ok(StrategyOutcome::modified(
            data.len(),
            modified,
            format!("Set code on {} datasets", modified),
        ))
    }

    fn requires_single_output(&self) -> bool {
        true
    }
}

pub struct CleanIntegerCodes;

impl Strategy for CleanIntegerCodes {
    fn name(&self) -> &'static str {
        "clean_integer_codes"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let modified = clean_integer_codes(data);
        Ok(StrategyOutcome::modified(
            data.len(),
            modified,
            format!("Removed integer codes from {} datasets", modified),
        ))
    }
}

/// Link exchanges against a named database in the registry, or internally.
pub struct LinkIterableByFields {
    registry: Arc<dyn DatabaseRegistry>,
    database: Option<String>,
    options: LinkOptions,
}

impl LinkIterableByFields {
    pub fn internal(registry: Arc<dyn DatabaseRegistry>, options: LinkOptions) -> Self {
        Self {
            registry,
            database: None,
            options,
        }
    }

    pub fn external(
        registry: Arc<dyn DatabaseRegistry>,
        database: impl Into<String>,
        options: LinkOptions,
    ) -> Self {
        Self {
            registry,
            database: Some(database.into()),
            options,
        }
    }
}

impl Strategy for LinkIterableByFields {
    fn name(&self) -> &'static str {
        "link_iterable_by_fields"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let report = match &self.database {
            Some(name) => {
                if !self.registry.contains(name) {
                    return Err(ImportError::UnknownDatabase(name.clone()));
                }
                let records = self.registry.records(name)?;
                debug!("Linking against {} records of {}", records.len(), name);
                link_iterable_by_fields(data, LinkTarget::External(&records), &self.options)?
            }
            None => link_iterable_by_fields(data, LinkTarget::Internal, &self.options)?,
        };
        Ok(link_outcome(data, self.name(), report))
    }
}

pub struct LinkTechnosphereByActivityHash {
    registry: Arc<dyn DatabaseRegistry>,
    external_db: Option<String>,
    fields: FieldList,
}

impl LinkTechnosphereByActivityHash {
    pub fn new(
        registry: Arc<dyn DatabaseRegistry>,
        external_db: Option<String>,
        fields: FieldList,
    ) -> Self {
        Self {
            registry,
            external_db,
            fields,
        }
    }
}

impl Strategy for LinkTechnosphereByActivityHash {
    fn name(&self) -> &'static str {
        "link_technosphere_by_activity_hash"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let report = link_technosphere_by_activity_hash(
            data,
            self.registry.as_ref(),
            self.external_db.as_deref(),
            &self.fields,
        )?;
        if let Some(db) = &self.external_db {
            info!("Technosphere exchanges linked against external database {}", db);
        }
        Ok(link_outcome(data, self.name(), report))
    }
}
