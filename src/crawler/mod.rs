//! Adaptive spatial crawl of the notes API.
//!
//! The API has no pagination, only a page cap. The crawler covers the region
//! with a coarse grid and splits every cell whose page comes back full into
//! four quadrants, recursively, until each cell fits in a single page. Cells
//! run as independent tasks; the [`Harvester`] owns the task set and keeps
//! waiting while splits keep adding to it.

mod cell;
mod orchestrator;
mod store;

use thiserror::Error;

use crate::api::FetchError;
use crate::models::{Cell, NormalizeError};

pub use orchestrator::{Harvest, HarvestStats, Harvester};
pub use store::ResultStore;

/// Fatal harvest errors. Any of them aborts the whole run.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("fetching cell {cell} failed")]
    Fetch {
        cell: Cell,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("cell {cell} still overflows at depth {max_depth}")]
    DepthExceeded { cell: Cell, max_depth: u32 },
    #[error("cell task failed")]
    TaskFailed(#[from] tokio::task::JoinError),
}
