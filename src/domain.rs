use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered collection of datasets as produced by an extractor and rewritten by strategies.
pub type DatasetCollection = Vec<Dataset>;

/// Canonical identity of a linkable activity or flow: `(database, code)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityKey {
    pub database: String,
    pub code: String,
}

impl ActivityKey {
    pub fn new(database: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            code: code.into(),
        }
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.database, self.code)
    }
}

/// Kind of node a dataset represents in its database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Process,
    Emission,
    #[serde(rename = "natural resource")]
    NaturalResource,
    Product,
}

/// Closed set of exchange types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    Technosphere,
    Biosphere,
    Production,
    Substitution,
}

impl ExchangeType {
    /// Exchange types resolved against process datasets.
    pub const TECHNOSPHERE: [ExchangeType; 3] = [
        ExchangeType::Technosphere,
        ExchangeType::Substitution,
        ExchangeType::Production,
    ];
}

/// A product output declared by a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub unit: String,
    pub amount: f64,
}

impl Product {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            amount,
        }
    }
}

/// Allocation of a set of exchanges to one co-product, as extracted from Ecospold1 data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Extractor-local id of the co-product (a production exchange)
    pub reference: u64,
    /// Allocation factor in percent
    pub fraction: f64,
    /// Extractor-local ids of the exchanges allocated with this fraction
    pub exchanges: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub name: String,
    #[serde(rename = "type")]
    pub exchange_type: ExchangeType,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(
        rename = "reference product",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_product: Option<String>,
    /// Canonical activity this exchange resolves to; absent until linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<ActivityKey>,
    #[serde(rename = "local id", default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<u64>,
}

impl Exchange {
    pub fn new(name: impl Into<String>, exchange_type: ExchangeType, amount: f64) -> Self {
        Self {
            name: name.into(),
            exchange_type,
            amount,
            unit: None,
            categories: Vec::new(),
            location: None,
            reference_product: None,
            input: None,
            local_id: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_local_id(mut self, id: u64) -> Self {
        self.local_id = Some(id);
        self
    }

    pub fn is_linked(&self) -> bool {
        self.input.is_some()
    }
}

/// A process record: products, exchanges and the descriptive fields used for linking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(
        rename = "reference product",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_product: Option<String>,
    #[serde(
        rename = "production amount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub production_amount: Option<f64>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<Allocation>,
}

impl Dataset {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            code: None,
            node_type: NodeType::Process,
            name: None,
            unit: None,
            location: None,
            categories: Vec::new(),
            reference_product: None,
            production_amount: None,
            products: Vec::new(),
            exchanges: Vec::new(),
            allocations: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = node_type;
        self
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }

    pub fn with_exchange(mut self, exchange: Exchange) -> Self {
        self.exchanges.push(exchange);
        self
    }

    /// The canonical identity, available once both `database` and `code` are set.
    pub fn key(&self) -> Option<ActivityKey> {
        match &self.code {
            Some(code) if !self.database.is_empty() => {
                Some(ActivityKey::new(self.database.clone(), code.clone()))
            }
            _ => None,
        }
    }

    pub fn is_multi_output(&self) -> bool {
        self.products.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dataset_uses_domain_field_names() {
        let value = json!({
            "database": "es1",
            "code": "42",
            "name": "steel production",
            "reference product": "steel",
            "production amount": 1.0,
            "products": [{"name": "steel", "unit": "kilogram", "amount": 1.0}],
            "exchanges": [
                {"name": "coal", "type": "technosphere", "amount": 0.4, "unit": "kilogram"},
                {"name": "Carbon dioxide", "type": "biosphere", "amount": 2.1, "categories": ["air"]}
            ]
        });

        let ds: Dataset = serde_json::from_value(value).unwrap();
        assert_eq!(ds.node_type, NodeType::Process);
        assert_eq!(ds.reference_product.as_deref(), Some("steel"));
        assert_eq!(ds.production_amount, Some(1.0));
        assert_eq!(ds.exchanges[1].exchange_type, ExchangeType::Biosphere);
        assert_eq!(ds.key(), Some(ActivityKey::new("es1", "42")));

        let out = serde_json::to_value(&ds).unwrap();
        assert_eq!(out["exchanges"][0]["type"], "technosphere");
        assert!(out["exchanges"][0].get("input").is_none());
    }

    #[test]
    fn test_key_requires_database_and_code() {
        assert_eq!(Dataset::new("db").key(), None);
        assert_eq!(Dataset::new("").with_code("c").key(), None);
        assert_eq!(
            Dataset::new("db").with_code("c").key(),
            Some(ActivityKey::new("db", "c"))
        );
    }

    #[test]
    fn test_natural_resource_node_type_spelling() {
        let ds: Dataset =
            serde_json::from_value(json!({"database": "biosphere3", "type": "natural resource"}))
                .unwrap();
        assert_eq!(ds.node_type, NodeType::NaturalResource);
    }
}
