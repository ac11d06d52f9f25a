// Fingerprinting, linking and the strategy pipeline

pub mod fingerprint;
pub mod linking;
pub mod orchestrator;
pub mod pipeline_config;
pub mod strategies;

// Re-export key types for convenience
pub use fingerprint::{activity_hash, Field, FieldList, Fingerprint};
pub use linking::{link_iterable_by_fields, CandidatePool, LinkOptions, LinkReport, LinkTarget};
pub use orchestrator::{Pipeline, PipelineExecutionResult};
pub use pipeline_config::{PipelineConfig, StrategyConfig};
pub use strategies::{Strategy, StrategyOutcome};
