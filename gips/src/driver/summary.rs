//! Run summaries.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use super::Plan;
use crate::datasource::{ProductName, Sensor, TileId};
use crate::layout::format_date;
use crate::pool::{FailureReason, TaskOutcome};

/// Unit counts for one product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductCounts {
    pub succeeded: usize,
    pub skipped_current: usize,
    pub unresolved: usize,
    pub failed: usize,
}

/// A task that did not produce its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub tile: TileId,
    pub date: NaiveDate,
    pub product: ProductName,
    pub sensor: Sensor,
    pub reason: FailureReason,
}

/// What a run did, per product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub products: BTreeMap<ProductName, ProductCounts>,
    pub failures: Vec<TaskFailure>,
}

impl RunSummary {
    /// Summarize a plan and the outcomes of its tasks.
    pub fn from_run(plan: &Plan, outcomes: &[TaskOutcome]) -> Self {
        let mut summary = Self::default();

        for unit in &plan.skipped_current {
            summary.entry(&unit.product).skipped_current += 1;
        }
        for gap in &plan.unresolvable {
            summary.entry(&gap.product).unresolved += 1;
        }
        for outcome in outcomes {
            let Some(task) = plan.task(outcome.task()) else {
                continue;
            };
            match outcome {
                TaskOutcome::Succeeded { .. } => summary.entry(&task.product).succeeded += 1,
                TaskOutcome::Failed { reason, .. } => {
                    summary.entry(&task.product).failed += 1;
                    summary.failures.push(TaskFailure {
                        tile: task.tile.clone(),
                        date: task.date,
                        product: task.product.clone(),
                        sensor: task.sensor.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }
        summary
    }

    fn entry(&mut self, product: &ProductName) -> &mut ProductCounts {
        self.products.entry(product.clone()).or_default()
    }

    /// Counts of one product (zero when it took no part in the run).
    pub fn counts(&self, product: &ProductName) -> ProductCounts {
        self.products.get(product).copied().unwrap_or_default()
    }

    pub fn total_failed(&self) -> usize {
        self.products.values().map(|c| c.failed).sum()
    }

    pub fn total_succeeded(&self) -> usize {
        self.products.values().map(|c| c.succeeded).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .products
            .keys()
            .map(|p| p.as_str().len())
            .max()
            .unwrap_or(0)
            .max("product".len());

        writeln!(
            f,
            "{:<width$}  {:>9}  {:>16}  {:>10}  {:>6}",
            "product", "succeeded", "skipped(current)", "unresolved", "failed"
        )?;
        for (product, c) in &self.products {
            writeln!(
                f,
                "{:<width$}  {:>9}  {:>16}  {:>10}  {:>6}",
                product.as_str(),
                c.succeeded,
                c.skipped_current,
                c.unresolved,
                c.failed
            )?;
        }
        if !self.failures.is_empty() {
            writeln!(f, "failures:")?;
            for failure in &self.failures {
                writeln!(
                    f,
                    "  {} {} {} ({}): {}",
                    failure.tile,
                    format_date(failure.date),
                    failure.product,
                    failure.sensor,
                    failure.reason
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{GapReason, GenerationTask, ProductUnit, UnresolvableGap};
    use std::path::PathBuf;

    fn task(id: usize, tile: &str, product: &str) -> GenerationTask {
        GenerationTask {
            id,
            tile: TileId::new(tile).unwrap(),
            date: NaiveDate::from_yo_opt(2014, 123).unwrap(),
            product: ProductName::new(product).unwrap(),
            sensor: Sensor::new("LC8").unwrap(),
            inputs: Vec::new(),
            output: PathBuf::from(format!("{tile}-{product}.tif")),
            stage: 0,
            prerequisites: Vec::new(),
        }
    }

    #[test]
    fn test_counts_and_display() {
        let ndvi = ProductName::new("ndvi").unwrap();
        let date = NaiveDate::from_yo_opt(2014, 123).unwrap();
        let plan = Plan {
            tasks: vec![task(0, "T1", "ndvi"), task(1, "T2", "ndvi")],
            skipped_current: vec![ProductUnit {
                tile: TileId::new("T3").unwrap(),
                date,
                product: ndvi.clone(),
            }],
            unresolvable: vec![UnresolvableGap {
                tile: TileId::new("T4").unwrap(),
                date,
                product: ndvi.clone(),
                reason: GapReason::MissingAsset,
            }],
        };
        let outcomes = vec![
            TaskOutcome::Succeeded {
                task: 0,
                output: PathBuf::from("T1-ndvi.tif"),
            },
            TaskOutcome::Failed {
                task: 1,
                reason: FailureReason::Generator("bad input".to_string()),
            },
        ];

        let summary = RunSummary::from_run(&plan, &outcomes);
        assert_eq!(
            summary.counts(&ndvi),
            ProductCounts {
                succeeded: 1,
                skipped_current: 1,
                unresolved: 1,
                failed: 1
            }
        );
        assert_eq!(summary.total_failed(), 1);

        let text = summary.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "product  succeeded  skipped(current)  unresolved  failed"
        );
        assert_eq!(
            lines[1],
            "ndvi             1                 1           1       1"
        );
        assert_eq!(lines[2], "failures:");
        assert_eq!(lines[3], "  T2 2014123 ndvi (LC8): generator failed: bad input");
    }
}
