//! Generator trait for product algorithms.
//!
//! Pixel-level product algorithms live outside the engine. The pool hands
//! each one a [`GenerationRequest`] describing a single product file and
//! expects the path of the written file back.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::datasource::{ProductName, Sensor, TileId};
use crate::driver::GenerationTask;
use crate::raster::RasterError;

/// Inputs and destination of one product file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub tile: TileId,
    pub date: NaiveDate,
    pub sensor: Sensor,
    pub product: ProductName,
    /// Absolute input paths, in requirement order.
    pub inputs: Vec<PathBuf>,
    /// Where the product must be written.
    pub output: PathBuf,
}

impl From<&GenerationTask> for GenerationRequest {
    fn from(task: &GenerationTask) -> Self {
        Self {
            tile: task.tile.clone(),
            date: task.date,
            sensor: task.sensor.clone(),
            product: task.product.clone(),
            inputs: task.inputs.clone(),
            output: task.output.clone(),
        }
    }
}

/// Errors a generator may report.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for product generation functions.
///
/// Implementations must be thread-safe (`Send + Sync`) and idempotent:
/// running twice with the same request overwrites the same file. Closures
/// with the right signature implement the trait.
pub trait Generator: Send + Sync {
    /// Write the requested product and return its path.
    fn generate(&self, request: &GenerationRequest) -> Result<PathBuf, GenerationError>;
}

impl<F> Generator for F
where
    F: Fn(&GenerationRequest) -> Result<PathBuf, GenerationError> + Send + Sync,
{
    fn generate(&self, request: &GenerationRequest) -> Result<PathBuf, GenerationError> {
        self(request)
    }
}

/// Generators by product name, with an optional fallback.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<ProductName, Arc<dyn Generator>>,
    fallback: Option<Arc<dyn Generator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the generator of one product, replacing any previous one.
    pub fn with(mut self, product: ProductName, generator: impl Generator + 'static) -> Self {
        self.generators.insert(product, Arc::new(generator));
        self
    }

    /// Generator used for products without their own.
    pub fn with_fallback(mut self, generator: impl Generator + 'static) -> Self {
        self.fallback = Some(Arc::new(generator));
        self
    }

    pub fn get(&self, product: &ProductName) -> Option<&Arc<dyn Generator>> {
        self.generators.get(product).or(self.fallback.as_ref())
    }

    pub fn products(&self) -> impl Iterator<Item = &ProductName> {
        self.generators.keys()
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("products", &self.generators.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
