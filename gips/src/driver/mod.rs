//! Product driver: dependency resolution, planning and the run loop.
//!
//! ```text
//! Inventory ──► plan_all ──► Plan ──► ProcessingPool::execute ──► outcomes
//!     ▲                                                              │
//!     └──────────────────── Inventory::refresh ◄─────────────────────┘
//! ```
//!
//! [`ProductDriver::run`] performs one pass of that loop and reports the
//! result as a [`RunSummary`]. Structural problems (unknown products,
//! dependency cycles, an unreadable repository) abort before any task runs;
//! everything else is recorded per unit.

mod graph;
mod plan;
mod summary;

pub use graph::DependencyGraph;
pub use plan::{
    plan, plan_all, GapReason, GenerationTask, Plan, ProductUnit, TaskId, UnresolvableGap,
};
pub use summary::{ProductCounts, RunSummary, TaskFailure};

use tracing::info;

use crate::datasource::ProductName;
use crate::error::GipsResult;
use crate::inventory::Inventory;
use crate::pool::{GeneratorRegistry, ProcessingPool, TaskOutcome};

/// Everything one driver run produced.
#[derive(Debug)]
pub struct DriverRun {
    pub plan: Plan,
    /// One outcome per planned task, in task order.
    pub outcomes: Vec<TaskOutcome>,
    pub summary: RunSummary,
    /// The inventory rescanned after execution.
    pub inventory: Inventory,
}

/// Plans and executes product generation.
pub struct ProductDriver {
    pool: ProcessingPool,
    generators: GeneratorRegistry,
}

impl ProductDriver {
    pub fn new(pool: ProcessingPool, generators: GeneratorRegistry) -> Self {
        Self { pool, generators }
    }

    pub fn pool(&self) -> &ProcessingPool {
        &self.pool
    }

    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    /// Bring `products` up to date for every unit of `inventory`.
    ///
    /// # Arguments
    ///
    /// * `inventory` - Tiles and dates to process, scanned beforehand
    /// * `products` - Requested products; prerequisites are added automatically
    /// * `overwrite` - Regenerate requested products even when current
    ///
    /// # Errors
    ///
    /// Fails before any work when a product is unknown or the dependency
    /// closure is cyclic, and after execution if the repository cannot be
    /// rescanned. Task failures are reported in the summary, not as errors.
    pub fn run(
        &self,
        inventory: &Inventory,
        products: &[ProductName],
        overwrite: bool,
    ) -> GipsResult<DriverRun> {
        let plan = plan_all(inventory, products, overwrite)?;

        let (outcomes, inventory) = if plan.is_empty() {
            (Vec::new(), inventory.clone())
        } else {
            let outcomes = self
                .pool
                .execute(&plan.tasks, &self.generators, inventory.layout());
            (outcomes, inventory.refresh()?)
        };

        let summary = RunSummary::from_run(&plan, &outcomes);
        info!(
            datasource = %inventory.source().name,
            succeeded = summary.total_succeeded(),
            failed = summary.total_failed(),
            skipped_current = plan.skipped_current.len(),
            unresolved = plan.unresolvable.len(),
            "Run complete"
        );

        Ok(DriverRun {
            plan,
            outcomes,
            summary,
            inventory,
        })
    }
}
