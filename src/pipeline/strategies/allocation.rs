//! Splitting of allocated multi-output datasets into one dataset per co-product.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::{Strategy, StrategyOutcome};
use crate::domain::{Dataset, DatasetCollection, Exchange, ExchangeType, Product};
use crate::error::Result;

/// Replace every dataset carrying allocation records by one dataset per co-product.
///
/// Returns the number of datasets that were split. Multi-product datasets without allocation
/// records are kept as they are.
pub fn allocate_multioutput(data: &mut DatasetCollection) -> usize {
    let mut split = 0;
    let mut activities = Vec::with_capacity(data.len());

    for ds in std::mem::take(data) {
        if ds.allocations.is_empty() {
            if ds.is_multi_output() {
                warn!(
                    "Dataset {:?} has {} products but no allocation data; leaving unsplit",
                    ds.name,
                    ds.products.len()
                );
            }
            activities.push(ds);
            continue;
        }
        let allocated = allocate_exchanges(&ds);
        debug!("Split dataset {:?} into {} datasets", ds.name, allocated.len());
        activities.extend(allocated);
        split += 1;
    }

    *data = activities;
    split
}

fn allocate_exchanges(ds: &Dataset) -> Vec<Dataset> {
    let mut multipliers: HashMap<u64, Vec<(u64, f64)>> = HashMap::new();
    for allocation in &ds.allocations {
        if allocation.fraction == 0.0 {
            continue;
        }
        let scales = multipliers.entry(allocation.reference).or_default();
        for exc_id in &allocation.exchanges {
            let scale = allocation.fraction / 100.0;
            // one multiplier per exchange id; the last listing wins, first-seen order is kept
            match scales.iter_mut().find(|entry| entry.0 == *exc_id) {
                Some(entry) => entry.1 = scale,
                None => scales.push((*exc_id, scale)),
            }
        }
    }

    let exchanges: HashMap<u64, &Exchange> = ds
        .exchanges
        .iter()
        .filter(|exc| exc.exchange_type != ExchangeType::Production)
        .filter_map(|exc| exc.local_id.map(|id| (id, exc)))
        .collect();

    ds.exchanges
        .iter()
        .filter(|exc| exc.exchange_type == ExchangeType::Production)
        .map(|coproduct| {
            let mut new_ds = ds.clone();
            let scales = coproduct
                .local_id
                .and_then(|id| multipliers.get(&id))
                .map(Vec::as_slice)
                .unwrap_or_default();

            new_ds.exchanges = scales
                .iter()
                .filter(|(exc_id, _)| Some(*exc_id) != coproduct.local_id)
                .filter_map(|(exc_id, scale)| exchanges.get(exc_id).map(|exc| rescale(exc, *scale)))
                .collect();
            new_ds.exchanges.push(coproduct.clone());

            new_ds.products = vec![Product::new(
                coproduct.name.clone(),
                coproduct.unit.clone().unwrap_or_default(),
                coproduct.amount,
            )];
            new_ds.reference_product = None;
            new_ds.production_amount = None;
            new_ds.allocations.clear();
            new_ds
        })
        .collect()
}

fn rescale(exchange: &Exchange, scale: f64) -> Exchange {
    let mut exchange = exchange.clone();
    exchange.amount *= scale;
    exchange
}

pub struct AllocateMultioutput;

impl Strategy for AllocateMultioutput {
    fn name(&self) -> &'static str {
        "es1_allocate_multioutput"
    }

    fn apply(&self, data: &mut DatasetCollection) -> Result<StrategyOutcome> {
        let before = data.len();
        let split = allocate_multioutput(data);
        Ok(StrategyOutcome::modified(
            data.len(),
            split,
            format!(
                "Split {} multi-output datasets ({} -> {} datasets)",
                split,
                before,
                data.len()
            ),
        ))
    }

    fn splits_datasets(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Allocation;

    fn combined_heat_and_power() -> Dataset {
        let mut ds = Dataset::new("es1")
            .with_name("cogeneration")
            .with_location("CH")
            .with_product(Product::new("electricity", "kilowatt hour", 10.0))
            .with_product(Product::new("heat", "megajoule", 20.0))
            .with_exchange(
                Exchange::new("electricity", ExchangeType::Production, 10.0)
                    .with_unit("kilowatt hour")
                    .with_local_id(1),
            )
            .with_exchange(
                Exchange::new("heat", ExchangeType::Production, 20.0)
                    .with_unit("megajoule")
                    .with_local_id(2),
            )
            .with_exchange(
                Exchange::new("natural gas", ExchangeType::Technosphere, 100.0)
                    .with_unit("cubic meter")
                    .with_local_id(3),
            )
            .with_exchange(
                Exchange::new("Carbon dioxide, fossil", ExchangeType::Biosphere, 50.0)
                    .with_unit("kilogram")
                    .with_local_id(4),
            );
        ds.allocations = vec![
            Allocation {
                reference: 1,
                fraction: 60.0,
                exchanges: vec![3, 4],
            },
            Allocation {
                reference: 2,
                fraction: 40.0,
                exchanges: vec![2, 3, 4],
            },
        ];
        ds
    }

    #[test]
    fn test_splits_one_dataset_per_coproduct() {
        let mut data = vec![combined_heat_and_power()];

        assert_eq!(allocate_multioutput(&mut data), 1);
        assert_eq!(data.len(), 2);

        let electricity = &data[0];
        assert_eq!(electricity.products, vec![Product::new("electricity", "kilowatt hour", 10.0)]);
        assert_eq!(electricity.exchanges.len(), 3);
        assert_eq!(electricity.exchanges[0].amount, 60.0);
        assert_eq!(electricity.exchanges[1].amount, 30.0);
        assert_eq!(electricity.exchanges[2].exchange_type, ExchangeType::Production);
        assert!(electricity.allocations.is_empty());

        let heat = &data[1];
        assert_eq!(heat.products[0].name, "heat");
        // self-allocation entry (id 2) is skipped
        assert_eq!(heat.exchanges.len(), 3);
        assert_eq!(heat.exchanges[0].amount, 40.0);
        assert_eq!(heat.exchanges[1].amount, 20.0);
    }

    #[test]
    fn test_repeated_exchange_id_is_allocated_once() {
        let mut ds = combined_heat_and_power();
        ds.allocations = vec![
            Allocation {
                reference: 1,
                fraction: 50.0,
                exchanges: vec![3, 3],
            },
            Allocation {
                reference: 1,
                fraction: 25.0,
                exchanges: vec![4, 3],
            },
        ];
        let mut data = vec![ds];

        allocate_multioutput(&mut data);

        let electricity = &data[0];
        let amounts: Vec<(&str, f64)> = electricity
            .exchanges
            .iter()
            .map(|exc| (exc.name.as_str(), exc.amount))
            .collect();
        assert_eq!(
            amounts,
            vec![
                ("natural gas", 25.0),
                ("Carbon dioxide, fossil", 12.5),
                ("electricity", 10.0)
            ]
        );
    }

    #[test]
    fn test_zero_fraction_allocations_are_ignored() {
        let mut ds = combined_heat_and_power();
        ds.allocations[1].fraction = 0.0;
        let mut data = vec![ds];

        allocate_multioutput(&mut data);

        let heat = &data[1];
        assert_eq!(heat.exchanges.len(), 1);
        assert_eq!(heat.exchanges[0].name, "heat");
    }

    #[test]
    fn test_datasets_without_allocations_pass_through() {
        let mut unallocated = combined_heat_and_power();
        unallocated.allocations.clear();
        let single = Dataset::new("es1").with_product(Product::new("steel", "kilogram", 1.0));
        let mut data = vec![unallocated.clone(), single.clone()];

        assert_eq!(allocate_multioutput(&mut data), 0);
        assert_eq!(data, vec![unallocated, single]);
    }
}
