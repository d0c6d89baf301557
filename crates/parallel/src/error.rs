//! Error types for tiled evaluation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("tile {x},{y}: {source}")]
    Tile {
        x: i64,
        y: i64,
        #[source]
        source: bandcalc_equation::EquationError,
    },

    #[error("cannot build thread pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Raster(#[from] bandcalc_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
