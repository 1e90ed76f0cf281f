//! Notegrid - exhaustive harvesting of OpenStreetMap notes for one country
//!
//! The notes API caps each bounding-box query at a fixed page size and has no
//! pagination. This library covers a country with a grid of cells and keeps
//! splitting full cells into quadrants until every note has been fetched.

pub mod api;
pub mod boundary;
pub mod config;
pub mod crawler;
pub mod models;
pub mod output;

pub use api::{NoteSource, NotesApiClient};
pub use boundary::Region;
pub use crawler::{Harvest, HarvestError, Harvester};
pub use models::{Cell, NoteFeature};
