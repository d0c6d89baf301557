//! Tile data structures and operations

mod rect;
mod scalar;
mod tile;

pub use rect::IRect;
pub use scalar::{Sample, ScalarType};
pub use tile::{is_null_value, Tile, TileStatistics, TileStatus};
