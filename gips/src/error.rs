//! Engine-level errors.
//!
//! Only structural problems are represented here: they abort the whole
//! operation. Failures local to one tile/date/product unit are recorded in
//! plan and run reports instead (see [`crate::driver::UnresolvableGap`] and
//! [`crate::pool::FailureReason`]).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::datasource::{DataSourceError, ProductName, RegistryError, TileId};
use crate::layout::LayoutError;
use crate::pool::PoolError;
use crate::raster::RasterError;

/// Result type for engine operations.
pub type GipsResult<T> = Result<T, GipsError>;

/// Fatal engine errors.
#[derive(Debug, Error)]
pub enum GipsError {
    /// The data source's storage root cannot be listed.
    #[error("repository root {path} is unreadable: {source}")]
    RepositoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The product dependency table contains a cycle.
    #[error("cyclic product dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<ProductName> },

    /// The data source does not define the product.
    #[error("data source '{datasource}' has no product '{product}'")]
    UnknownProduct {
        datasource: String,
        product: ProductName,
    },

    /// No data source with that name is registered.
    #[error("unknown data source '{0}'")]
    UnknownDataSource(String),

    /// The tile is not part of the data source grid.
    #[error("tile '{0}' is not in the data source grid")]
    UnknownTile(TileId),

    /// A request was rejected before any work started.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    /// The worker pool could not be created.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Filesystem failure outside repository scanning.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn format_cycle(cycle: &[ProductName]) -> String {
    cycle
        .iter()
        .map(ProductName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
