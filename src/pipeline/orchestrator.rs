use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::pipeline_config::check_single_output_order;
use super::strategies::{Strategy, StrategyOutcome};
use crate::domain::DatasetCollection;
use crate::error::Result;

/// An immutable, ordered sequence of strategies.
///
/// Variants are derived with [`Pipeline::prepend`] and [`Pipeline::then`], which return new
/// pipelines and leave the original untouched.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    steps: Vec<Arc<dyn Strategy>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Arc<dyn Strategy>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// A new pipeline running `step` ahead of this one
    pub fn prepend(&self, name: impl Into<String>, step: Arc<dyn Strategy>) -> Self {
        let steps = std::iter::once(step)
            .chain(self.steps.iter().cloned())
            .collect();
        Self::new(name, steps)
    }

    /// A new pipeline running `step` after this one
    pub fn then(&self, step: Arc<dyn Strategy>) -> Self {
        let steps = self
            .steps
            .iter()
            .cloned()
            .chain(std::iter::once(step))
            .collect();
        Self::new(self.name.clone(), steps)
    }

    pub fn validate(&self) -> Result<()> {
        check_single_output_order(
            self.steps
                .iter()
                .map(|s| (s.name(), s.splits_datasets(), s.requires_single_output())),
        )
    }

    /// Run every step in order.
    ///
    /// The first failing step aborts the run; `data` then holds the collection as produced by
    /// the last successful step.
    pub fn apply(&self, data: &mut DatasetCollection) -> Result<PipelineExecutionResult> {
        info!(
            "Starting pipeline '{}' with {} steps on {} datasets",
            self.name,
            self.steps.len(),
            data.len()
        );
        self.validate()?;

        let mut execution_result = PipelineExecutionResult::new(self.name.clone());

        for (step_index, step) in self.steps.iter().enumerate() {
            info!(
                "Executing step {}/{}: {}",
                step_index + 1,
                self.steps.len(),
                step.name()
            );
            let start = Instant::now();

            match step.apply(data) {
                Ok(outcome) => {
                    info!(
                        "Step '{}' completed in {:.2?}: {}",
                        step.name(),
                        start.elapsed(),
                        outcome.message
                    );
                    execution_result.add_step_result(step.name(), outcome);
                }
                Err(e) => {
                    error!(
                        "Step '{}' failed, aborting pipeline '{}': {}",
                        step.name(),
                        self.name,
                        e
                    );
                    return Err(e);
                }
            }
        }

        execution_result.complete(data.len());
        info!(
            "Pipeline '{}' completed: {} datasets after {} steps",
            self.name,
            data.len(),
            execution_result.step_results.len()
        );
        Ok(execution_result)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Result of executing a complete pipeline
#[derive(Debug, Clone)]
pub struct PipelineExecutionResult {
    pub pipeline_name: String,
    pub total_datasets: usize,
    pub step_results: Vec<(String, StrategyOutcome)>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineExecutionResult {
    pub fn new(pipeline_name: String) -> Self {
        Self {
            pipeline_name,
            total_datasets: 0,
            step_results: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn add_step_result(&mut self, step_name: &str, result: StrategyOutcome) {
        self.step_results.push((step_name.to_string(), result));
    }

    pub fn complete(&mut self, total_datasets: usize) {
        self.total_datasets = total_datasets;
        self.completed_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dataset, Product};
    use crate::error::{ErrorKind, ImportError};
    use crate::pipeline::strategies::{
        AllocateMultioutput, AssignOnlyProductAsProduction, FnStrategy,
    };

    fn rename(to: &'static str) -> Arc<dyn Strategy> {
        Arc::new(FnStrategy::new("rename", move |data: &mut DatasetCollection| {
            for ds in data.iter_mut() {
                ds.name = Some(to.to_string());
            }
            Ok(data.len())
        }))
    }

    fn failing() -> Arc<dyn Strategy> {
        Arc::new(FnStrategy::new("failing", |_: &mut DatasetCollection| {
            Err(ImportError::Config("boom".to_string()))
        }))
    }

    #[test]
    fn test_steps_run_in_order() {
        let pipeline = Pipeline::new("p", vec![rename("first"), rename("second")]);
        let mut data = vec![Dataset::new("db")];

        let result = pipeline.apply(&mut data).unwrap();

        assert_eq!(data[0].name.as_deref(), Some("second"));
        assert_eq!(result.step_results.len(), 2);
        assert_eq!(result.total_datasets, 1);
        let elapsed = result.duration().map(|d| d.num_milliseconds());
        assert!(matches!(elapsed, Some(ms) if ms >= 0));
    }

    #[test]
    fn test_failure_aborts_remaining_steps() {
        let pipeline = Pipeline::new("p", vec![rename("first"), failing(), rename("never")]);
        let mut data = vec![Dataset::new("db")];

        let err = pipeline.apply(&mut data).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(data[0].name.as_deref(), Some("first"));
    }

    #[test]
    fn test_prepend_builds_new_pipeline() {
        let base = Pipeline::new("base", vec![rename("base")]);
        let first = base.prepend("variant", rename("variant"));
        let second = base.prepend("variant", rename("variant"));

        assert_eq!(base.len(), 1);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(base.then(rename("tail")).len(), 2);
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn test_misordered_allocation_rejected_before_any_step() {
        let pipeline = Pipeline::new(
            "p",
            vec![
                rename("touched"),
                Arc::new(AssignOnlyProductAsProduction) as Arc<dyn Strategy>,
                Arc::new(AllocateMultioutput) as Arc<dyn Strategy>,
            ],
        );
        let mut data = vec![Dataset::new("db").with_product(Product::new("a", "kg", 1.0))];
        let before = data.clone();

        assert!(pipeline.apply(&mut data).is_err());
        assert_eq!(data, before);
    }
}
