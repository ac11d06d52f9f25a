//! Generic linking of exchanges to canonical activities by fingerprint.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{ActivityKey, Dataset, Exchange, ExchangeType};
use crate::error::{ImportError, Result};
use crate::pipeline::fingerprint::{activity_hash, FieldList, Fingerprint};

/// Where linking candidates come from.
#[derive(Debug, Clone, Copy)]
pub enum LinkTarget<'a> {
    /// Link the collection against itself
    Internal,
    /// Link against records of another database
    External(&'a [Dataset]),
}

/// Options for [`link_iterable_by_fields`]. The field list is mandatory.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkOptions {
    pub fields: FieldList,
    /// Restrict linking to exchanges of these types
    pub kind: Option<Vec<ExchangeType>>,
    /// Re-evaluate exchanges that already carry an `input`
    pub relink: bool,
}

impl LinkOptions {
    pub fn new(fields: FieldList) -> Self {
        Self {
            fields,
            kind: None,
            relink: false,
        }
    }

    pub fn with_kind<I: IntoIterator<Item = ExchangeType>>(mut self, kind: I) -> Self {
        self.kind = Some(kind.into_iter().collect());
        self
    }

    pub fn with_relink(mut self, relink: bool) -> Self {
        self.relink = relink;
        self
    }

    fn selects(&self, exchange: &Exchange) -> bool {
        if let Some(kind) = &self.kind {
            if !kind.contains(&exchange.exchange_type) {
                return false;
            }
        }
        self.relink || exchange.input.is_none()
    }
}

/// Fingerprint to canonical identity lookup, built fresh for every linking call.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: HashMap<Fingerprint, ActivityKey>,
}

impl CandidatePool {
    /// Build the pool, failing before any lookup if a candidate has no identity or two
    /// different candidates share a fingerprint.
    pub fn build<'a, I>(records: I, fields: &FieldList) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Dataset>,
    {
        let mut keyed = Vec::new();
        for (index, ds) in records.into_iter().enumerate() {
            if ds.database.is_empty() {
                return Err(ImportError::MissingIdentifier {
                    index,
                    missing: "database",
                });
            }
            let Some(key) = ds.key() else {
                return Err(ImportError::MissingIdentifier {
                    index,
                    missing: "code",
                });
            };
            keyed.push((activity_hash(ds, fields), key));
        }

        let mut candidates = HashMap::with_capacity(keyed.len());
        for (fingerprint, key) in keyed {
            match candidates.entry(fingerprint) {
                Entry::Vacant(slot) => {
                    slot.insert(key);
                }
                Entry::Occupied(existing) => {
                    if *existing.get() != key {
                        return Err(ImportError::Ambiguous {
                            fingerprint: existing.key().clone(),
                            first: existing.get().clone(),
                            second: key,
                        });
                    }
                }
            }
        }

        Ok(Self { candidates })
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&ActivityKey> {
        self.candidates.get(fingerprint)
    }

    pub fn resolve(&self, exchange: &Exchange, fields: &FieldList) -> Option<&ActivityKey> {
        self.get(&activity_hash(exchange, fields))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Counts from a single linking invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub candidates: usize,
    pub considered: usize,
    pub linked: usize,
    pub unresolved: usize,
}

/// Link exchanges in `unlinked` to candidates from `target` using `options.fields`.
///
/// Candidates must each carry `database` and `code` and be unique under the field list. The
/// candidate pool is fully built before any exchange is touched, so an error leaves `unlinked`
/// unchanged. Exchanges without a matching candidate are left as they are.
pub fn link_iterable_by_fields(
    unlinked: &mut [Dataset],
    target: LinkTarget<'_>,
    options: &LinkOptions,
) -> Result<LinkReport> {
    let pool = match target {
        LinkTarget::Internal => CandidatePool::build(unlinked.iter(), &options.fields)?,
        LinkTarget::External(records) => CandidatePool::build(records, &options.fields)?,
    };
    debug!("Built candidate pool with {} entries", pool.len());

    let mut report = LinkReport {
        candidates: pool.len(),
        ..LinkReport::default()
    };

    for exchange in unlinked
        .iter_mut()
        .flat_map(|ds| ds.exchanges.iter_mut())
        .filter(|exc| options.selects(exc))
    {
        report.considered += 1;
        match pool.resolve(exchange, &options.fields) {
            Some(key) => {
                exchange.input = Some(key.clone());
                report.linked += 1;
            }
            None => report.unresolved += 1,
        }
    }

    info!(
        "Linked {}/{} exchanges against {} candidates ({} unresolved)",
        report.linked, report.considered, report.candidates, report.unresolved
    );
    Ok(report)
}
