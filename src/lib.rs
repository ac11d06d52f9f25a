pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod importer;
pub mod logging;
pub mod pipeline;
pub mod storage;

pub use config::Config;
pub use domain::{ActivityKey, Dataset, DatasetCollection, Exchange, ExchangeType};
pub use error::{ErrorKind, ImportError, Result};
pub use importer::{ImportStatistics, ImporterVariant, LciImporter};
