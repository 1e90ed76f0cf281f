//! Drives the whole cell tree to completion.

use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::cell::{CellContext, CellOutcome};
use super::{HarvestError, ResultStore};
use crate::api::NoteSource;
use crate::boundary::Region;
use crate::config::GridConfig;
use crate::models::{bootstrap_grid, Cell, NoteFeature};

/// Counters describing how a harvest unfolded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestStats {
    pub bootstrap_cells: usize,
    pub pruned_cells: usize,
    pub split_cells: usize,
    pub leaf_cells: usize,
    /// Deepest subdivision level that was fetched
    pub max_depth: u32,
}

impl HarvestStats {
    /// Cells that issued an API request
    pub fn requests(&self) -> usize {
        self.split_cells + self.leaf_cells
    }
}

/// Result of a completed harvest
#[derive(Debug)]
pub struct Harvest {
    /// Notes inside the region, sorted by id
    pub features: Vec<NoteFeature>,
    pub stats: HarvestStats,
}

/// Adaptive quadtree harvester.
///
/// Starts from a coarse grid over the region's bounding box and splits any
/// cell whose page comes back full, until every cell fits in one page.
pub struct Harvester {
    source: Arc<dyn NoteSource>,
    region: Arc<Region>,
    initial_cell_size: f64,
    max_depth: Option<u32>,
    limiter: Option<Arc<Semaphore>>,
    progress: ProgressBar,
}

impl Harvester {
    pub fn new(source: Arc<dyn NoteSource>, region: Arc<Region>, grid: &GridConfig) -> Self {
        Self {
            source,
            region,
            initial_cell_size: grid.initial_cell_size,
            max_depth: grid.max_depth,
            limiter: grid
                .concurrency_limit()
                .map(|permits| Arc::new(Semaphore::new(permits))),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report cell completion on this bar; its length grows as cells split
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run until the cell tree drains. The first error aborts the whole run.
    pub async fn run(&self) -> Result<Harvest, HarvestError> {
        let cells = bootstrap_grid(self.region.bounds(), self.initial_cell_size);
        info!(
            "Bootstrapping with {} cells of size {}",
            cells.len(),
            self.initial_cell_size
        );

        let ctx = CellContext {
            source: Arc::clone(&self.source),
            region: Arc::clone(&self.region),
            store: ResultStore::new(),
            limiter: self.limiter.clone(),
            max_depth: self.max_depth,
            cancel: CancellationToken::new(),
        };

        let mut stats = HarvestStats {
            bootstrap_cells: cells.len(),
            ..Default::default()
        };
        self.progress.set_length(cells.len() as u64);

        let mut tasks = JoinSet::new();
        for cell in cells {
            spawn_cell(&mut tasks, &ctx, cell);
        }

        while let Some(joined) = tasks.join_next().await {
            self.progress.inc(1);

            let (cell, outcome) = match joined {
                Ok((cell, Ok(outcome))) => (cell, outcome),
                Ok((_, Err(err))) => return Err(self.abort(&mut tasks, &ctx, err).await),
                Err(join_err) => {
                    let err = HarvestError::TaskFailed(join_err);
                    return Err(self.abort(&mut tasks, &ctx, err).await);
                }
            };

            match outcome {
                CellOutcome::Pruned => stats.pruned_cells += 1,
                CellOutcome::Split(children) => {
                    stats.split_cells += 1;
                    stats.max_depth = stats.max_depth.max(cell.depth);
                    self.progress.inc_length(children.len() as u64);
                    for child in children {
                        spawn_cell(&mut tasks, &ctx, child);
                    }
                }
                CellOutcome::Leaf { .. } => {
                    stats.leaf_cells += 1;
                    stats.max_depth = stats.max_depth.max(cell.depth);
                }
                CellOutcome::Cancelled => {}
            }
        }

        self.progress.finish_with_message("Harvest complete");

        let features = ctx.store.take_sorted();
        info!(
            "Harvest complete: {} notes from {} requests ({} pruned, {} split, depth {})",
            features.len(),
            stats.requests(),
            stats.pruned_cells,
            stats.split_cells,
            stats.max_depth
        );

        Ok(Harvest { features, stats })
    }

    /// Cancel every outstanding cell and wait for them to stop
    async fn abort(
        &self,
        tasks: &mut JoinSet<(Cell, Result<CellOutcome, HarvestError>)>,
        ctx: &CellContext,
        err: HarvestError,
    ) -> HarvestError {
        error!("Harvest aborted: {}", err);
        ctx.cancel.cancel();
        tasks.abort_all();

        let mut stopped = 0;
        while tasks.join_next().await.is_some() {
            stopped += 1;
        }
        debug!("Stopped {} outstanding cells", stopped);

        self.progress.abandon_with_message("Harvest failed");
        err
    }
}

fn spawn_cell(
    tasks: &mut JoinSet<(Cell, Result<CellOutcome, HarvestError>)>,
    ctx: &CellContext,
    cell: Cell,
) {
    let ctx = ctx.clone();
    tasks.spawn(async move {
        let outcome = ctx.process(cell).await;
        (cell, outcome)
    });
}
