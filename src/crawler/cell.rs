//! Processing of a single cell: prune, fetch, then split or commit.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{HarvestError, ResultStore};
use crate::api::{NotePage, NoteSource};
use crate::boundary::Region;
use crate::models::{normalize, Cell};

/// What became of a processed cell
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CellOutcome {
    /// Cell does not touch the region, nothing fetched
    Pruned,
    /// Page limit hit; these children replace the cell
    Split([Cell; 4]),
    /// Notes committed to the store
    Leaf { retained: usize },
    /// Run was cancelled before the fetch finished
    Cancelled,
}

/// Everything a cell task shares with its siblings
#[derive(Clone)]
pub(crate) struct CellContext {
    pub source: Arc<dyn NoteSource>,
    pub region: Arc<Region>,
    pub store: ResultStore,
    pub limiter: Option<Arc<Semaphore>>,
    pub max_depth: Option<u32>,
    pub cancel: CancellationToken,
}

impl CellContext {
    pub async fn process(&self, cell: Cell) -> Result<CellOutcome, HarvestError> {
        if !self.region.intersects(&cell) {
            debug!("Cell {}: outside region, skipped", cell);
            return Ok(CellOutcome::Pruned);
        }

        let Some(page) = self.fetch(&cell).await? else {
            return Ok(CellOutcome::Cancelled);
        };

        if page.capped {
            let children = cell.quadrants();
            if let Some(max_depth) = self.max_depth {
                if cell.depth >= max_depth {
                    return Err(HarvestError::DepthExceeded { cell, max_depth });
                }
            }
            debug!(
                "Cell {}: page limit reached, splitting into cells of size {}",
                cell,
                cell.size / 2.0
            );
            return Ok(CellOutcome::Split(children));
        }

        let mut features = Vec::with_capacity(page.notes.len());
        for note in page.notes {
            if !note.has_comments() || !self.region.contains(&note.geometry.point()) {
                continue;
            }
            if let Some(feature) = normalize(note)? {
                features.push(feature);
            }
        }

        let retained = features.len();
        self.store.extend(features);
        info!("Cell {}: retrieved {} notes", cell, retained);

        Ok(CellOutcome::Leaf { retained })
    }

    /// `None` when the run is cancelled first
    async fn fetch(&self, cell: &Cell) -> Result<Option<NotePage>, HarvestError> {
        let request = async {
            // Held until the response body is read
            let _permit = match &self.limiter {
                Some(limiter) => limiter.acquire().await.ok(),
                None => None,
            };
            self.source.fetch(cell).await
        };

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Ok(None),
            page = request => page
                .map(Some)
                .map_err(|source| HarvestError::Fetch { cell: *cell, source }),
        }
    }
}
