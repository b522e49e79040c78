//! Planning: turning an inventory into generation tasks.
//!
//! For every unit of the inventory and every requested product:
//!
//! 1. `Current` and not overwriting: skipped.
//! 2. `MissingNoAsset`: recorded as an [`UnresolvableGap`].
//! 3. Otherwise the first sensor, in preference order, that can produce the
//!    product is chosen. Dependencies of the chosen sensor are reused when
//!    current and planned otherwise; shared dependencies are planned once per
//!    unit. No sensor qualifies: recorded as an [`UnresolvableGap`].
//!
//! `overwrite` forces only the requested products; current dependencies are
//! always reused.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::DependencyGraph;
use crate::datasource::{ProductName, Requirement, Sensor, TileId};
use crate::error::GipsResult;
use crate::inventory::{Inventory, Status, UnitAssessment};
use crate::layout::{format_date, ProductKey};

/// Identifier of a task within one plan.
pub type TaskId = usize;

/// One product file to generate.
///
/// Carries everything a generator needs; it holds no reference to the
/// inventory it was planned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    pub id: TaskId,
    pub tile: TileId,
    pub date: NaiveDate,
    pub product: ProductName,
    pub sensor: Sensor,
    /// Absolute paths of every input, in requirement order.
    pub inputs: Vec<PathBuf>,
    /// Absolute canonical path of the product file.
    pub output: PathBuf,
    /// Dependency depth; tasks of lower stages run first.
    pub stage: usize,
    /// Tasks of the same unit that must succeed first.
    pub prerequisites: Vec<TaskId>,
}

impl GenerationTask {
    pub fn key(&self) -> ProductKey {
        ProductKey {
            tile: self.tile.clone(),
            date: self.date,
            sensor: self.sensor.clone(),
            product: self.product.clone(),
        }
    }
}

impl fmt::Display for GenerationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} {} ({})",
            self.id,
            self.tile,
            format_date(self.date),
            self.product,
            self.sensor
        )
    }
}

/// A (tile, date, product) reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductUnit {
    pub tile: TileId,
    pub date: NaiveDate,
    pub product: ProductName,
}

/// Why a unit cannot be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GapReason {
    /// No supported sensor has the required assets.
    MissingAsset,
    /// Assets exist, but no sensor satisfies every requirement.
    NoQualifyingSensor,
}

impl fmt::Display for GapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapReason::MissingAsset => write!(f, "missing asset"),
            GapReason::NoQualifyingSensor => write!(f, "no qualifying sensor"),
        }
    }
}

/// A requested unit the plan cannot produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvableGap {
    pub tile: TileId,
    pub date: NaiveDate,
    pub product: ProductName,
    pub reason: GapReason,
}

/// Work derived from an inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Tasks indexed by their id.
    pub tasks: Vec<GenerationTask>,
    pub skipped_current: Vec<ProductUnit>,
    pub unresolvable: Vec<UnresolvableGap>,
}

impl Plan {
    /// Whether there is nothing to generate.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: TaskId) -> Option<&GenerationTask> {
        self.tasks.get(id)
    }

    /// Tasks grouped by stage, lowest first.
    pub fn stages(&self) -> BTreeMap<usize, Vec<&GenerationTask>> {
        let mut stages: BTreeMap<usize, Vec<&GenerationTask>> = BTreeMap::new();
        for task in &self.tasks {
            stages.entry(task.stage).or_default().push(task);
        }
        stages
    }

    /// Tasks of one product.
    pub fn tasks_for<'a>(
        &'a self,
        product: &'a ProductName,
    ) -> impl Iterator<Item = &'a GenerationTask> + 'a {
        self.tasks.iter().filter(move |t| &t.product == product)
    }
}

/// Plan one product.
pub fn plan(inventory: &Inventory, product: &ProductName, overwrite: bool) -> GipsResult<Plan> {
    plan_all(inventory, std::slice::from_ref(product), overwrite)
}

/// Plan several products, sharing dependency tasks between them.
///
/// # Errors
///
/// Fails before any planning if a product is unknown or the dependency
/// closure contains a cycle.
pub fn plan_all(inventory: &Inventory, products: &[ProductName], overwrite: bool) -> GipsResult<Plan> {
    let graph = DependencyGraph::resolve_all(inventory.source(), products)?;
    let requested: BTreeSet<&ProductName> = products.iter().collect();
    let targets: Vec<&ProductName> = graph.order().iter().filter(|p| requested.contains(p)).collect();

    let mut plan = Plan::default();
    for (tile, date) in inventory.units() {
        let assessment = inventory.assess(tile, date, &graph);
        let mut unit = UnitPlanner {
            inventory,
            graph: &graph,
            assessment: &assessment,
            scheduled: BTreeMap::new(),
            plan: &mut plan,
        };

        for target in &targets {
            let Some(state) = assessment.get(target) else {
                continue;
            };
            let gap = |reason| UnresolvableGap {
                tile: tile.clone(),
                date,
                product: (*target).clone(),
                reason,
            };

            match state.status {
                Status::Current if !overwrite => unit.plan.skipped_current.push(ProductUnit {
                    tile: tile.clone(),
                    date,
                    product: (*target).clone(),
                }),
                Status::MissingNoAsset => unit.plan.unresolvable.push(gap(GapReason::MissingAsset)),
                _ => match state.sensors.iter().find(|s| s.producible) {
                    Some(choice) => {
                        unit.schedule(target, &choice.sensor);
                    }
                    None => unit.plan.unresolvable.push(gap(GapReason::NoQualifyingSensor)),
                },
            }
        }
    }

    info!(
        products = %targets.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(","),
        tasks = plan.tasks.len(),
        skipped_current = plan.skipped_current.len(),
        unresolvable = plan.unresolvable.len(),
        overwrite,
        "Plan ready"
    );
    Ok(plan)
}

/// Schedules tasks for one unit, once per (product, sensor).
struct UnitPlanner<'a> {
    inventory: &'a Inventory,
    graph: &'a DependencyGraph,
    assessment: &'a UnitAssessment,
    scheduled: BTreeMap<(ProductName, Sensor), TaskId>,
    plan: &'a mut Plan,
}

impl UnitPlanner<'_> {
    fn schedule(&mut self, product: &ProductName, sensor: &Sensor) -> TaskId {
        let slot = (product.clone(), sensor.clone());
        if let Some(id) = self.scheduled.get(&slot) {
            return *id;
        }

        let (inventory, assessment) = (self.inventory, self.assessment);
        let (tile, date) = (&assessment.tile, assessment.date);
        let mut inputs = Vec::new();
        let mut prerequisites = Vec::new();

        if let Some(spec) = inventory.source().product(product) {
            for requirement in &spec.requires {
                match requirement {
                    Requirement::Asset(asset_type) => {
                        if let Some(asset) = inventory.assets().find(tile, date, sensor, asset_type)
                        {
                            inputs.push(asset.path.clone());
                        }
                    }
                    Requirement::Product(dependency) => {
                        let reusable = assessment
                            .get(dependency)
                            .and_then(|s| s.sensor(sensor))
                            .filter(|s| s.current)
                            .and_then(|s| s.existing.as_ref());
                        let planned = self.scheduled.contains_key(&(dependency.clone(), sensor.clone()));

                        match reusable {
                            Some(existing) if !planned => inputs.push(existing.path.clone()),
                            _ => {
                                let id = self.schedule(dependency, sensor);
                                prerequisites.push(id);
                                inputs.push(self.plan.tasks[id].output.clone());
                            }
                        }
                    }
                }
            }
        }

        let key = ProductKey {
            tile: tile.clone(),
            date,
            sensor: sensor.clone(),
            product: product.clone(),
        };
        let id = self.plan.tasks.len();
        let task = GenerationTask {
            id,
            tile: key.tile.clone(),
            date,
            product: product.clone(),
            sensor: sensor.clone(),
            inputs,
            output: inventory.layout().product_path(&key),
            stage: self.graph.stage(product),
            prerequisites,
        };
        debug!(task = %task, stage = task.stage, "Planned");

        self.plan.tasks.push(task);
        self.scheduled.insert(slot, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{catalog, DataSource};
    use crate::driver::graph::tests::{chain_source, name};
    use crate::inventory::{SpatialSelector, TemporalSelector};
    use crate::layout::Layout;
    use crate::GipsError;
    use filetime::FileTime;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, mtime: i64) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"data").unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    fn d(doy: u32) -> NaiveDate {
        NaiveDate::from_yo_opt(2014, doy).unwrap()
    }

    fn inventory(dir: &TempDir, source: DataSource, tiles: &[&str]) -> Inventory {
        let source = Arc::new(source);
        let layout = Arc::new(Layout::new(dir.path(), &source).unwrap());
        fs::create_dir_all(layout.root()).unwrap();
        Inventory::build(
            source,
            layout,
            SpatialSelector::tiles(tiles.iter().map(|t| TileId::new(*t).unwrap())),
            TemporalSelector::range(d(1), d(365)),
        )
        .unwrap()
    }

    fn landsat_root(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("landsat")
    }

    #[test]
    fn test_plans_dependency_before_product() {
        let dir = TempDir::new().unwrap();
        touch(&landsat_root(&dir), "tiles/023034/2014123/LC80230342014123LGN00.tar.gz", 100);
        let inv = inventory(&dir, catalog::landsat(), &["023034"]);

        let plan = plan(&inv, &name("ndvi"), false).unwrap();
        assert_eq!(plan.tasks.len(), 2);
        let (ref_task, ndvi_task) = (&plan.tasks[0], &plan.tasks[1]);
        assert_eq!(ref_task.product.as_str(), "ref");
        assert_eq!(ref_task.stage, 0);
        assert_eq!(ndvi_task.stage, 1);
        assert_eq!(ndvi_task.prerequisites, vec![ref_task.id]);
        assert_eq!(ndvi_task.inputs, vec![ref_task.output.clone()]);
        assert!(ndvi_task.output.ends_with("tiles/023034/2014123/2014123_LC8_ndvi.tif"));
        assert!(ref_task.inputs[0].ends_with("LC80230342014123LGN00.tar.gz"));
    }

    #[test]
    fn test_current_dependency_reused() {
        let dir = TempDir::new().unwrap();
        let root = landsat_root(&dir);
        touch(&root, "tiles/023034/2014123/LC80230342014123LGN00.tar.gz", 100);
        touch(&root, "tiles/023034/2014123/2014123_LC8_ref.tif", 200);
        let inv = inventory(&dir, catalog::landsat(), &["023034"]);

        let plan = plan(&inv, &name("ndvi"), false).unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert!(plan.tasks[0].prerequisites.is_empty());
        assert!(plan.tasks[0].inputs[0].ends_with("2014123_LC8_ref.tif"));
    }

    #[test]
    fn test_current_skipped_unless_overwrite() {
        let dir = TempDir::new().unwrap();
        let root = landsat_root(&dir);
        touch(&root, "tiles/023034/2014123/LC80230342014123LGN00.tar.gz", 100);
        touch(&root, "tiles/023034/2014123/2014123_LC8_ref.tif", 200);
        touch(&root, "tiles/023034/2014123/2014123_LC8_ndvi.tif", 300);
        let inv = inventory(&dir, catalog::landsat(), &["023034"]);

        let plan1 = plan(&inv, &name("ndvi"), false).unwrap();
        assert!(plan1.is_empty());
        assert_eq!(plan1.skipped_current.len(), 1);

        // Overwrite forces ndvi only; the current ref is reused.
        let plan2 = plan(&inv, &name("ndvi"), true).unwrap();
        assert_eq!(plan2.tasks.len(), 1);
        assert_eq!(plan2.tasks[0].product.as_str(), "ndvi");
    }

    #[test]
    fn test_stale_dependency_replanned() {
        let dir = TempDir::new().unwrap();
        let root = landsat_root(&dir);
        touch(&root, "tiles/023034/2014123/LC80230342014123LGN00.tar.gz", 500);
        touch(&root, "tiles/023034/2014123/2014123_LC8_ref.tif", 200);
        touch(&root, "tiles/023034/2014123/2014123_LC8_ndvi.tif", 300);
        let inv = inventory(&dir, catalog::landsat(), &["023034"]);

        let plan = plan(&inv, &name("ndvi"), false).unwrap();
        let products: Vec<&str> = plan.tasks.iter().map(|t| t.product.as_str()).collect();
        assert_eq!(products, vec!["ref", "ndvi"]);
    }

    #[test]
    fn test_sensor_fallback() {
        let dir = TempDir::new().unwrap();
        touch(&landsat_root(&dir), "tiles/023034/2014123/LE70230342014123LGN00.tar.gz", 100);
        let inv = inventory(&dir, catalog::landsat(), &["023034"]);

        let plan = plan(&inv, &name("ref"), false).unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].sensor.as_str(), "LE7");
    }

    #[test]
    fn test_gap_for_missing_asset() {
        let dir = TempDir::new().unwrap();
        let root = landsat_root(&dir);
        touch(&root, "tiles/023034/2014123/LC80230342014123LGN00.tar.gz", 100);
        let inv = inventory(&dir, catalog::landsat(), &["023034", "023035"]);

        let plan = plan(&inv, &name("ref"), false).unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(
            plan.unresolvable,
            vec![UnresolvableGap {
                tile: TileId::new("023035").unwrap(),
                date: d(123),
                product: name("ref"),
                reason: GapReason::MissingAsset,
            }]
        );
    }

    #[test]
    fn test_overwrite_without_inputs_is_gap() {
        // A ref file with no asset left on disk: usable as input, impossible to remake.
        let dir = TempDir::new().unwrap();
        let root = landsat_root(&dir);
        touch(&root, "tiles/023034/2014123/2014123_LC8_ref.tif", 100);
        touch(&root, "tiles/023034/2014123/2014123_LC8_ndvi.tif", 50);
        let inv = inventory(&dir, catalog::landsat(), &["023034"]);

        let plan = plan(&inv, &name("ndvi"), false).unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert!(plan.unresolvable.is_empty());

        let plan = plan_all(&inv, &[name("ref")], true).unwrap();
        assert_eq!(plan.unresolvable[0].reason, GapReason::NoQualifyingSensor);
    }

    #[test]
    fn test_plan_all_shares_dependencies() {
        let dir = TempDir::new().unwrap();
        touch(&landsat_root(&dir), "tiles/023034/2014123/LC80230342014123LGN00.tar.gz", 100);
        let inv = inventory(&dir, catalog::landsat(), &["023034"]);

        let plan = plan_all(&inv, &[name("ndvi"), name("evi")], false).unwrap();
        let refs = plan.tasks_for(&name("ref")).count();
        assert_eq!(refs, 1);
        assert_eq!(plan.tasks.len(), 3);
        assert_eq!(plan.stages().len(), 2);
    }

    #[test]
    fn test_requested_dependency_links_dependents() {
        let dir = TempDir::new().unwrap();
        let root = landsat_root(&dir);
        touch(&root, "tiles/023034/2014123/LC80230342014123LGN00.tar.gz", 100);
        touch(&root, "tiles/023034/2014123/2014123_LC8_ref.tif", 200);
        let inv = inventory(&dir, catalog::landsat(), &["023034"]);

        // Overwriting ref as well as ndvi: ndvi must wait for the new ref.
        let plan = plan_all(&inv, &[name("ndvi"), name("ref")], true).unwrap();
        assert_eq!(plan.tasks.len(), 2);
        let ndvi_name = name("ndvi");
        let ndvi = plan.tasks_for(&ndvi_name).next().unwrap();
        assert_eq!(ndvi.prerequisites.len(), 1);
    }

    #[test]
    fn test_cycle_fails_before_planning() {
        let dir = TempDir::new().unwrap();
        let inv = inventory(&dir, chain_source(&[("p", &["q"]), ("q", &["p"])]), &["A"]);
        assert!(matches!(
            plan(&inv, &name("p"), false),
            Err(GipsError::CyclicDependency { .. })
        ));
    }
}
