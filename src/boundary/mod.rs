//! Country boundary: loading and the containment region.
//!
//! The region is used twice: coarsely to skip cells that never touch the
//! country, and exactly to drop notes that fall outside it.

mod loader;
mod region;

pub use loader::{load_region, region_from_reader, BoundaryError};
pub use region::Region;
