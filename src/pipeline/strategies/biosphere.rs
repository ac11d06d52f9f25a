//! Clean-up strategies for elementary (biosphere) flows.

use std::collections::HashMap;

use super::{Strategy, StrategyOutcome};
use crate::domain::{Dataset, DatasetCollection, ExchangeType, NodeType};
use crate::error::Result;

const UNSPECIFIED: [&str; 3] = ["unspecified", "(unspecified)", ""];

/// Category and name replacement tables for biosphere flows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BiosphereMappings {
    pub categories: HashMap<Vec<String>, Vec<String>>,
    pub names: HashMap<String, String>,
}

fn is_flow(ds: &Dataset) -> bool {
    matches!(ds.node_type, NodeType::Emission | NodeType::NaturalResource)
}

fn drop_unspecified(categories: &mut Vec<String>) -> bool {
    if categories.len() == 2 && UNSPECIFIED.contains(&categories[1].trim()) {
        categories.truncate(1);
        return true;
    }
    false
}

fn remap_categories(
    categories: &mut Vec<String>,
    mapping: &HashMap<Vec<String>, Vec<String>>,
) -> bool {
    match mapping.get(categories.as_slice()) {
        Some(replacement) if *replacement != *categories => {
            *categories = replacement.clone();
            true
        }
        _ => false,
    }
}

/// Turn `(category, "unspecified")` into `(category,)` on datasets and exchanges.
pub fn drop_unspecified_subcategories(data: &mut [Dataset]) -> usize {
    let mut modified = 0;
    for ds in data.iter_mut() {
        let mut touched = drop_unspecified(&mut ds.categories);
        for exc in ds.exchanges.iter_mut() {
            touched |= drop_unspecified(&mut exc.categories);
        }
        if touched {
            modified += 1;
        }
    }
    modified
}

/// Rewrite categories of flow datasets and biosphere exchanges through `mapping`.
pub fn normalize_biosphere_categories(
    data: &mut [Dataset],
    mapping: &HashMap<Vec<String>, Vec<String>>,
) -> usize {
    let mut modified = 0;
    for ds in data.iter_mut() {
        let mut touched = is_flow(ds) && remap_categories(&mut ds.categories, mapping);
        for exc in ds
            .exchanges
            .iter_mut()
            .filter(|exc| exc.exchange_type == ExchangeType::Biosphere)
        {
            touched |= remap_categories(&mut exc.categories, mapping);
        }
        if touched {
            modified += 1;
        }
    }
    modified
}

/// Rename flow datasets and biosphere exchanges through `mapping`.
pub fn normalize_biosphere_names(data: &mut [Dataset], mapping: &HashMap<String, String>) -> usize {
    let mut modified = 0;
    for ds in data.iter_mut() {
        let mut touched = false;
        if is_flow(ds) {
            if let Some(new_name) = ds.name.as_ref().and_then(|name| mapping.get(name)) {
                ds.name = Some(new_name.clone());
                touched = true;
            }
        }
        for exc in ds
            .exchanges
            .iter_mut()
            .filter(|exc| exc.exchange_type == ExchangeType::Biosphere)
        {
            if let Some(new_name) = mapping.get(&exc.name) {
                exc.name = new_name.clone();
                touched = true;
            }
        }
        if touched {
            modified += 1;
        }
    }
    modified
}

/// Biosphere flows are not regionalized; drop their locations.
pub fn strip_biosphere_exc_locations(data: &mut [Dataset]) -> usize {
    let mut modified = 0;
    for ds in data.iter_mut() {
        let mut touched = false;
        for exc in ds
            .exchanges
            .iter_mut()
            .filter(|exc| exc.exchange_type == ExchangeType::Biosphere)
        {
            touched |= exc.location.take().is_some();
        }
        if touched {
            modified += 1;
        }
    }
    modified
}

pub struct DropUnspecifiedSubcategories;

impl Strategy for DropUnspecifiedSubcategories {
    fn name(&self) -> &'static str {
        "drop_unspecified_subcategories"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let modified = drop_unspecified_subcategories(data);
        Ok(StrategyOutcome::modified(
            data.len(),
            modified,
            format!("Dropped unspecified subcategories in {} datasets", modified),
        ))
    }
}

pub struct NormalizeBiosphereCategories {
    mapping: HashMap<Vec<String>, Vec<String>>,
}

impl NormalizeBiosphereCategories {
    pub fn new(mapping: HashMap<Vec<String>, Vec<String>>) -> Self {
        Self { mapping }
    }
}

impl Strategy for NormalizeBiosphereCategories {
    fn name(&self) -> &'static str {
        "normalize_biosphere_categories"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let modified = normalize_biosphere_categories(data, &self.mapping);
        Ok(StrategyOutcome::modified(
            data.len(),
            modified,
            format!("Normalized biosphere categories in {} datasets", modified),
        ))
    }
}

pub struct NormalizeBiosphereNames {
    mapping: HashMap<String, String>,
}

impl NormalizeBiosphereNames {
    pub fn new(mapping: HashMap<String, String>) -> Self {
        Self { mapping }
    }
}

impl Strategy for NormalizeBiosphereNames {
    fn name(&self) -> &'static str {
        "normalize_biosphere_names"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let modified = normalize_biosphere_names(data, &self.mapping);
        Ok(StrategyOutcome::modified(
            data.len(),
            modified,
            format!("Normalized biosphere names in {} datasets", modified),
        ))
    }
}

pub struct StripBiosphereExcLocations;

impl Strategy for StripBiosphereExcLocations {
    fn name(&self) -> &'static str {
        "strip_biosphere_exc_locations"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let modified = strip_biosphere_exc_locations(data);
        Ok(StrategyOutcome::modified(
            data.len(),
            modified,
            format!("Stripped biosphere locations in {} datasets", modified),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Exchange;

    fn cats(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_drop_unspecified_subcategories() {
        let mut data = vec![Dataset::new("es1")
            .with_categories(["air", "unspecified"])
            .with_exchange(
                Exchange::new("CO2", ExchangeType::Biosphere, 1.0)
                    .with_categories(["water", "(unspecified)"]),
            )
            .with_exchange(
                Exchange::new("SO2", ExchangeType::Biosphere, 1.0)
                    .with_categories(["air", "urban air close to ground"]),
            )];

        assert_eq!(drop_unspecified_subcategories(&mut data), 1);
        assert_eq!(data[0].categories, cats(&["air"]));
        assert_eq!(data[0].exchanges[0].categories, cats(&["water"]));
        assert_eq!(data[0].exchanges[1].categories.len(), 2);
    }

    #[test]
    fn test_category_mapping_only_touches_biosphere() {
        let mapping = HashMap::from([(
            cats(&["air", "low population density"]),
            cats(&["air", "non-urban air or from high stacks"]),
        )]);
        let mut data = vec![Dataset::new("es1")
            .with_exchange(
                Exchange::new("CO2", ExchangeType::Biosphere, 1.0)
                    .with_categories(["air", "low population density"]),
            )
            .with_exchange(
                Exchange::new("odd", ExchangeType::Technosphere, 1.0)
                    .with_categories(["air", "low population density"]),
            )];

        assert_eq!(normalize_biosphere_categories(&mut data, &mapping), 1);
        assert_eq!(
            data[0].exchanges[0].categories,
            cats(&["air", "non-urban air or from high stacks"])
        );
        assert_eq!(
            data[0].exchanges[1].categories,
            cats(&["air", "low population density"])
        );
    }

    #[test]
    fn test_flow_dataset_categories_and_names_mapped() {
        let categories = HashMap::from([(
            cats(&["resource", "in ground"]),
            cats(&["natural resource", "in ground"]),
        )]);
        let names = HashMap::from([(
            "Gas, natural, in ground".to_string(),
            "Gas, natural".to_string(),
        )]);
        let mut data = vec![Dataset::new("biosphere")
            .with_node_type(NodeType::NaturalResource)
            .with_name("Gas, natural, in ground")
            .with_categories(["resource", "in ground"])];

        normalize_biosphere_categories(&mut data, &categories);
        normalize_biosphere_names(&mut data, &names);

        assert_eq!(data[0].categories, cats(&["natural resource", "in ground"]));
        assert_eq!(data[0].name.as_deref(), Some("Gas, natural"));
    }

    #[test]
    fn test_strip_biosphere_locations() {
        let mut data = vec![Dataset::new("es1")
            .with_exchange(Exchange::new("CO2", ExchangeType::Biosphere, 1.0).with_location("CH"))
            .with_exchange(
                Exchange::new("steel", ExchangeType::Technosphere, 1.0).with_location("CH"),
            )];

        assert_eq!(strip_biosphere_exc_locations(&mut data), 1);
        assert!(data[0].exchanges[0].location.is_none());
        assert_eq!(data[0].exchanges[1].location.as_deref(), Some("CH"));
    }
}
