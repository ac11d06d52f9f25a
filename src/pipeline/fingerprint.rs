//! Deterministic content fingerprints ("activity hashes") over descriptive fields.
//!
//! The same [`FieldList`] must be used when fingerprinting candidates and the exchanges matched
//! against them; a mismatch produces zero matches rather than an error.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::domain::{Dataset, Exchange};
use crate::error::{ImportError, Result};

const FIELD_SEPARATOR: char = '\u{1f}';
const LIST_SEPARATOR: char = '\u{1e}';

/// Descriptive field that can participate in a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Categories,
    Unit,
    Location,
    #[serde(rename = "reference product")]
    ReferenceProduct,
}

/// Value of a [`Field`] on a particular record.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Text(&'a str),
    List(&'a [String]),
    Missing,
}

impl<'a> From<Option<&'a String>> for FieldValue<'a> {
    fn from(value: Option<&'a String>) -> Self {
        value.map_or(FieldValue::Missing, |s| FieldValue::Text(s))
    }
}

/// Records exposing the fields a fingerprint is computed from.
pub trait FieldSource {
    fn field_value(&self, field: Field) -> FieldValue<'_>;
}

impl FieldSource for Dataset {
    fn field_value(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::Name => self.name.as_ref().into(),
            Field::Categories => FieldValue::List(&self.categories),
            Field::Unit => self.unit.as_ref().into(),
            Field::Location => self.location.as_ref().into(),
            Field::ReferenceProduct => self.reference_product.as_ref().into(),
        }
    }
}

impl FieldSource for Exchange {
    fn field_value(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::Name => FieldValue::Text(&self.name),
            Field::Categories => FieldValue::List(&self.categories),
            Field::Unit => self.unit.as_ref().into(),
            Field::Location => self.location.as_ref().into(),
            Field::ReferenceProduct => self.reference_product.as_ref().into(),
        }
    }
}

/// Ordered, non-empty list of fields a fingerprint is computed over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct FieldList(Vec<Field>);

impl FieldList {
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(ImportError::Config(
                "fingerprint field list must not be empty".to_string(),
            ));
        }
        Ok(Self(fields))
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }
}

impl Default for FieldList {
    fn default() -> Self {
        Self(vec![
            Field::Name,
            Field::Categories,
            Field::Unit,
            Field::Location,
        ])
    }
}

impl TryFrom<Vec<Field>> for FieldList {
    type Error = ImportError;

    fn try_from(fields: Vec<Field>) -> Result<Self> {
        Self::new(fields)
    }
}

impl From<FieldList> for Vec<Field> {
    fn from(list: FieldList) -> Self {
        list.0
    }
}

/// Lowercase hex SHA-256 over the canonicalized field values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn push_normalized(buf: &mut String, value: &str) {
    buf.push_str(&value.trim().to_lowercase());
}

/// Canonical text a fingerprint is hashed from.
pub fn canonical_text<R: FieldSource + ?Sized>(record: &R, fields: &FieldList) -> String {
    let mut buf = String::new();
    for (i, field) in fields.fields().iter().enumerate() {
        if i > 0 {
            buf.push(FIELD_SEPARATOR);
        }
        match record.field_value(*field) {
            FieldValue::Text(s) => push_normalized(&mut buf, s),
            FieldValue::List(items) => {
                for (j, item) in items.iter().enumerate() {
                    if j > 0 {
                        buf.push(LIST_SEPARATOR);
                    }
                    push_normalized(&mut buf, item);
                }
            }
            FieldValue::Missing => {}
        }
    }
    buf
}

/// Fingerprint `record` over `fields`.
pub fn activity_hash<R: FieldSource + ?Sized>(record: &R, fields: &FieldList) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(canonical_text(record, fields).as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExchangeType;
    use proptest::prelude::*;

    fn steel() -> Dataset {
        Dataset::new("db")
            .with_name("Steel, low-alloyed")
            .with_unit("kilogram")
            .with_location("RER")
    }

    #[test]
    fn test_known_value_is_stable() {
        let fp = activity_hash(&steel(), &FieldList::default());
        assert_eq!(
            fp.as_str(),
            "db012677152124670a3000b6a48c088eb2f0a7a72eea0449712a320f1e6e6b4f"
        );
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let shouty = Dataset::new("other")
            .with_name("  STEEL, LOW-ALLOYED ")
            .with_unit("Kilogram")
            .with_location(" rer");
        assert_eq!(
            activity_hash(&steel(), &FieldList::default()),
            activity_hash(&shouty, &FieldList::default())
        );
    }

    #[test]
    fn test_field_boundaries_are_preserved() {
        let a = Dataset::new("db").with_name("ab").with_unit("c");
        let b = Dataset::new("db").with_name("a").with_unit("bc");
        let fields = FieldList::new(vec![Field::Name, Field::Unit]).unwrap();
        assert_ne!(activity_hash(&a, &fields), activity_hash(&b, &fields));
    }

    #[test]
    fn test_dataset_and_exchange_agree() {
        let exc = Exchange::new("steel, low-alloyed", ExchangeType::Technosphere, 2.0)
            .with_unit("KILOGRAM")
            .with_location("RER");
        assert_eq!(
            activity_hash(&steel(), &FieldList::default()),
            activity_hash(&exc, &FieldList::default())
        );
    }

    #[test]
    fn test_field_list_changes_fingerprint() {
        let fields = FieldList::new(vec![Field::Name]).unwrap();
        assert_ne!(
            activity_hash(&steel(), &FieldList::default()),
            activity_hash(&steel(), &fields)
        );
    }

    #[test]
    fn test_empty_field_list_is_rejected() {
        assert!(FieldList::new(Vec::new()).is_err());
        assert!(serde_json::from_str::<FieldList>("[]").is_err());
    }

    #[test]
    fn test_field_list_deserializes_domain_names() {
        let fields: FieldList =
            serde_json::from_str(r#"["name", "reference product", "location"]"#).unwrap();
        assert_eq!(
            fields.fields(),
            &[Field::Name, Field::ReferenceProduct, Field::Location]
        );
    }

    proptest! {
        #[test]
        fn prop_fingerprint_is_deterministic(
            name in ".*",
            unit in ".*",
            cats in proptest::collection::vec(".*", 0..4),
        ) {
            let fields = FieldList::default();
            let a = Dataset::new("db")
                .with_name(name.clone())
                .with_unit(unit.clone())
                .with_categories(cats.clone());
            let b = Dataset::new("elsewhere")
                .with_name(name)
                .with_unit(unit)
                .with_categories(cats);
            prop_assert_eq!(activity_hash(&a, &fields), activity_hash(&b, &fields));
        }

        #[test]
        fn prop_fingerprint_ignores_ascii_case_and_padding(name in "[a-zA-Z ,]{0,24}") {
            let a = Dataset::new("db").with_name(name.clone());
            let b = Dataset::new("db").with_name(format!("  {} ", name.to_uppercase()));
            let fields = FieldList::default();
            prop_assert_eq!(activity_hash(&a, &fields), activity_hash(&b, &fields));
        }
    }
}
