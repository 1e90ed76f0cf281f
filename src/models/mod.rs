//! Data models for note harvesting.

pub mod cell;
pub mod note;

pub use cell::{bootstrap_grid, Cell};
pub use note::{normalize, NormalizeError, NoteFeature, NoteProperties, PointGeometry, RawNote};
