//! Builds project outputs from an inventory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::{
    directory_name, MissingTile, Mode, OmissionReason, OmittedDate, Project,
    ProjectOutput, ProjectRequest, TilePriority,
};
use crate::config::ProjectSettings;
use crate::datasource::{ProductName, Sensor, TileId};
use crate::error::{GipsError, GipsResult};
use crate::geometry::BBox;
use crate::index::Product;
use crate::inventory::Inventory;
use crate::layout::format_date;
use crate::raster::{
    merge_into, stack, GridRaster, Interpolation, RasterBackend, RasterError, TargetGrid,
};

/// A merged raster for one date with its provenance.
struct Layer {
    raster: GridRaster,
    sensors: BTreeSet<Sensor>,
    tiles: Vec<TileId>,
}

/// State shared by one `assemble` call.
struct Assembly<'a> {
    inventory: &'a Inventory,
    request: &'a ProjectRequest,
    /// Contributing tiles in merge order, with their bounds.
    tiles: Vec<(TileId, BBox)>,
    grid: TargetGrid,
    resolution: (f64, f64),
    directory: PathBuf,
    missing: Vec<MissingTile>,
    omitted: Vec<OmittedDate>,
    outputs: Vec<ProjectOutput>,
}

/// Warps and merges finished products into project directories.
pub struct ProjectAssembler {
    backend: Arc<dyn RasterBackend>,
    root: PathBuf,
    priority: TilePriority,
}

impl ProjectAssembler {
    pub fn new(backend: Arc<dyn RasterBackend>, root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            root: root.into(),
            priority: TilePriority::default(),
        }
    }

    pub fn from_settings(backend: Arc<dyn RasterBackend>, settings: &ProjectSettings) -> Self {
        Self::new(backend, &settings.root).with_priority(settings.tile_priority.clone())
    }

    pub fn with_priority(mut self, priority: TilePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn priority(&self) -> &TilePriority {
        &self.priority
    }

    /// Assemble `request` from the product files in `inventory`.
    ///
    /// # Errors
    ///
    /// - [`GipsError::InvalidRequest`] for no products or a footprint without tiles
    /// - [`GipsError::UnknownProduct`] / [`GipsError::UnknownTile`] for undefined names
    /// - [`GipsError::Raster`] when an output cannot be written
    ///
    /// A tile product that cannot be read or warped is reported in
    /// [`Project::missing`] and skipped; the other tiles still assemble.
    pub fn assemble(&self, inventory: &Inventory, request: &ProjectRequest) -> GipsResult<Project> {
        let source = inventory.source();
        if request.products.is_empty() {
            return Err(GipsError::InvalidRequest("no products requested".to_string()));
        }
        for product in &request.products {
            if source.product(product).is_none() {
                return Err(GipsError::UnknownProduct {
                    datasource: source.name.clone(),
                    product: product.clone(),
                });
            }
        }

        let bounds = request.footprint.tiles(&source.grid)?;
        let extent = request.footprint.extent(&bounds).filter(|_| !bounds.is_empty());
        let Some(extent) = extent else {
            return Err(GipsError::InvalidRequest(format!(
                "footprint '{}' covers no tiles",
                request.footprint.id()
            )));
        };

        let resolution = request.resolution.unwrap_or(source.default_resolution);
        let srs = request.srs.clone().unwrap_or_else(|| source.grid.srs.clone());
        let grid = TargetGrid::from_extent(srs, &extent, resolution)?;

        let order = self.priority.merge_order(bounds.keys().cloned(), |tile| {
            bounds.get(tile).map_or(0.0, |b| request.footprint.coverage(b))
        });
        let tiles = order
            .into_iter()
            .filter_map(|tile| bounds.get(&tile).copied().map(|b| (tile, b)))
            .collect();

        let directory = self.root.join(directory_name(
            request.footprint.id(),
            resolution,
            &source.name,
        ));

        let mut assembly = Assembly {
            inventory,
            request,
            tiles,
            grid,
            resolution,
            directory,
            missing: Vec::new(),
            omitted: Vec::new(),
            outputs: Vec::new(),
        };

        let mut dates: Vec<NaiveDate> = match &request.dates {
            Some(dates) => dates.clone(),
            None => inventory.dates().iter().copied().collect(),
        };
        dates.sort();
        dates.dedup();

        for product in &request.products {
            match request.mode {
                Mode::Mosaic => self.assemble_mosaics(&mut assembly, product, &dates)?,
                Mode::Tiles => self.assemble_tiles(&mut assembly, product, &dates)?,
                Mode::Stack => self.assemble_stack(&mut assembly, product, &dates)?,
            }
        }

        info!(
            directory = %assembly.directory.display(),
            mode = ?request.mode,
            outputs = assembly.outputs.len(),
            missing = assembly.missing.len(),
            omitted = assembly.omitted.len(),
            "Project assembled"
        );

        Ok(Project {
            directory: assembly.directory,
            grid: assembly.grid,
            outputs: assembly.outputs,
            missing: assembly.missing,
            omitted: assembly.omitted,
        })
    }

    fn assemble_mosaics(
        &self,
        assembly: &mut Assembly<'_>,
        product: &ProductName,
        dates: &[NaiveDate],
    ) -> GipsResult<()> {
        for &date in dates {
            let Some(layer) = self.mosaic(assembly, product, date)? else {
                continue;
            };
            let sensors: Vec<Sensor> = layer.sensors.into_iter().collect();
            let path = assembly
                .directory
                .join(output_filename(date, &sensors, product));
            self.backend.write(&layer.raster, &path)?;
            debug!(path = %path.display(), tiles = layer.tiles.len(), "Wrote mosaic");
            assembly.outputs.push(ProjectOutput {
                product: product.clone(),
                tile: None,
                dates: vec![date],
                sensors,
                path,
            });
        }
        Ok(())
    }

    fn assemble_tiles(
        &self,
        assembly: &mut Assembly<'_>,
        product: &ProductName,
        dates: &[NaiveDate],
    ) -> GipsResult<()> {
        for &date in dates {
            let mut written = 0;
            for (tile, bounds) in assembly.tiles.clone() {
                let Some(file) = product_file(assembly.inventory, &tile, date, product) else {
                    record_missing(assembly, &tile, date, product);
                    continue;
                };
                let grid = TargetGrid::from_extent(
                    assembly.grid.srs.clone(),
                    &bounds,
                    assembly.resolution,
                )?;
                let mut warped = match self.load(&file.path, &grid, assembly.request.interpolation) {
                    Ok(warped) => warped,
                    Err(e) => {
                        unreadable(assembly, &tile, date, product, &file.path, &e);
                        continue;
                    }
                };
                describe(&mut warped, product, &[date], &[tile.clone()]);

                let sensors = vec![file.sensor().clone()];
                let path = assembly
                    .directory
                    .join(tile.as_str())
                    .join(output_filename(date, &sensors, product));
                self.backend.write(&warped, &path)?;
                written += 1;
                assembly.outputs.push(ProjectOutput {
                    product: product.clone(),
                    tile: Some(tile),
                    dates: vec![date],
                    sensors,
                    path,
                });
            }
            if written == 0 {
                record_omitted(assembly, date, product);
            }
        }
        Ok(())
    }

    fn assemble_stack(
        &self,
        assembly: &mut Assembly<'_>,
        product: &ProductName,
        dates: &[NaiveDate],
    ) -> GipsResult<()> {
        let mut layers = Vec::new();
        let mut stacked = Vec::new();
        let mut sensors = BTreeSet::new();
        let mut tiles = BTreeSet::new();
        for &date in dates {
            let Some(mut layer) = self.mosaic(assembly, product, date)? else {
                continue;
            };
            let token = format_date(date);
            let count = layer.raster.band_count();
            layer.raster.band_descriptions = (1..=count)
                .map(|band| {
                    if count == 1 {
                        token.clone()
                    } else {
                        format!("{token}_b{band}")
                    }
                })
                .collect();
            sensors.extend(layer.sensors);
            tiles.extend(layer.tiles);
            stacked.push(date);
            layers.push(layer.raster);
        }

        let (Some(&first), Some(&last)) = (stacked.first(), stacked.last()) else {
            warn!(product = %product, "No dates to stack");
            return Ok(());
        };

        let mut raster = stack(layers)?;
        let tiles: Vec<TileId> = tiles.into_iter().collect();
        describe(&mut raster, product, &stacked, &tiles);
        let path = assembly.directory.join(format!(
            "{}_{}_{}_stack.tif",
            format_date(first),
            format_date(last),
            product
        ));
        self.backend.write(&raster, &path)?;
        debug!(path = %path.display(), bands = raster.band_count(), "Wrote stack");
        assembly.outputs.push(ProjectOutput {
            product: product.clone(),
            tile: None,
            dates: stacked,
            sensors: sensors.into_iter().collect(),
            path,
        });
        Ok(())
    }

    /// Read a tile product and warp it onto `grid`.
    fn load(
        &self,
        path: &Path,
        grid: &TargetGrid,
        interpolation: Interpolation,
    ) -> Result<GridRaster, RasterError> {
        let raster = self.backend.read(path)?;
        self.backend.warp(&raster, grid, interpolation)
    }

    /// Merge every available tile for one date, in priority order.
    fn mosaic(
        &self,
        assembly: &mut Assembly<'_>,
        product: &ProductName,
        date: NaiveDate,
    ) -> GipsResult<Option<Layer>> {
        let mut layer: Option<Layer> = None;
        for (tile, _) in assembly.tiles.clone() {
            let Some(file) = product_file(assembly.inventory, &tile, date, product) else {
                record_missing(assembly, &tile, date, product);
                continue;
            };
            let warped = match self.load(&file.path, &assembly.grid, assembly.request.interpolation) {
                Ok(warped) => warped,
                Err(e) => {
                    unreadable(assembly, &tile, date, product, &file.path, &e);
                    continue;
                }
            };

            let layer = layer.get_or_insert_with(|| Layer {
                raster: GridRaster::filled(&assembly.grid, warped.band_count(), warped.nodata),
                sensors: BTreeSet::new(),
                tiles: Vec::new(),
            });
            let written = match merge_into(&mut layer.raster, &warped) {
                Ok(written) => written,
                Err(e) => {
                    unreadable(assembly, &tile, date, product, &file.path, &e);
                    continue;
                }
            };
            debug!(tile = %tile, date = %date, product = %product, pixels = written, "Merged tile");
            layer.sensors.insert(file.sensor().clone());
            layer.tiles.push(tile);
        }

        match layer {
            Some(mut layer) => {
                let count = layer.raster.band_count();
                layer.raster.band_descriptions = vec![product.to_string(); count];
                describe(&mut layer.raster, product, &[date], &layer.tiles);
                Ok(Some(layer))
            }
            None => {
                record_omitted(assembly, date, product);
                Ok(None)
            }
        }
    }
}

/// The product file a project uses for a tile: a complete file, preferring
/// the product's sensor order.
fn product_file<'a>(
    inventory: &'a Inventory,
    tile: &TileId,
    date: NaiveDate,
    product: &ProductName,
) -> Option<&'a Product> {
    let products = inventory.products();
    let preference = inventory
        .source()
        .product(product)
        .map(|spec| spec.sensors.as_slice())
        .unwrap_or(&[]);
    preference
        .iter()
        .filter_map(|sensor| products.find(tile, date, product, sensor))
        .chain(products.versions(tile, date, product))
        .find(|p| p.is_complete())
}

fn unreadable(
    assembly: &mut Assembly<'_>,
    tile: &TileId,
    date: NaiveDate,
    product: &ProductName,
    path: &Path,
    error: &RasterError,
) {
    warn!(path = %path.display(), error = %error, "Skipping unreadable tile product");
    record_missing(assembly, tile, date, product);
}

fn record_missing(assembly: &mut Assembly<'_>, tile: &TileId, date: NaiveDate, product: &ProductName) {
    warn!(tile = %tile, date = %date, product = %product, "Tile missing from project");
    assembly.missing.push(MissingTile {
        tile: tile.clone(),
        date,
        product: product.clone(),
    });
}

fn record_omitted(assembly: &mut Assembly<'_>, date: NaiveDate, product: &ProductName) {
    warn!(date = %date, product = %product, "All tiles missing, date omitted");
    assembly.omitted.push(OmittedDate {
        date,
        product: product.clone(),
        reason: OmissionReason::AllTilesMissingForDate,
    });
}

/// `<YYYYDDD>_<sensors>_<product>.tif`, sensors joined by `+`.
fn output_filename(date: NaiveDate, sensors: &[Sensor], product: &ProductName) -> String {
    let sensors: Vec<&str> = sensors.iter().map(Sensor::as_str).collect();
    format!("{}_{}_{}.tif", format_date(date), sensors.join("+"), product)
}

fn describe(raster: &mut GridRaster, product: &ProductName, dates: &[NaiveDate], tiles: &[TileId]) {
    let join = |items: Vec<String>| items.join(",");
    raster
        .metadata
        .insert("product".to_string(), product.to_string());
    raster.metadata.insert(
        "dates".to_string(),
        join(dates.iter().map(|d| format_date(*d)).collect()),
    );
    raster.metadata.insert(
        "tiles".to_string(),
        join(tiles.iter().map(TileId::to_string).collect()),
    );
}
