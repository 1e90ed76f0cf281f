//! Notes harvest CLI.
//!
//! Loads a country boundary, crawls the notes API over it and writes every
//! open note inside the country to one GeoJSON file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use notegrid::boundary::load_region;
use notegrid::config::HarvestConfig;
use notegrid::output::save_features;
use notegrid::{Harvester, NotesApiClient};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(about = "Harvest all open OSM notes inside a country")]
struct Args {
    /// GeoJSON feature collection of country boundaries (optionally .gz)
    #[arg(short, long, default_value = "osm-countries-0-001.geojson")]
    boundary_file: PathBuf,

    /// ISO3166-1 code of the country to harvest
    #[arg(short, long, default_value = "PL")]
    country: String,

    /// Directory for the output file
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Optional TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// OSM API root
    #[arg(long)]
    api_url: Option<String>,

    /// Page size requested from the API
    #[arg(long)]
    page_limit: Option<usize>,

    /// Edge length of bootstrap cells, in degrees
    #[arg(long)]
    initial_cell_size: Option<f64>,

    /// Fail instead of splitting cells deeper than this
    #[arg(long)]
    max_depth: Option<u32>,

    /// Cap on simultaneous API requests (0 = unbounded)
    #[arg(long)]
    max_concurrent_requests: Option<usize>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Args {
    /// Command-line values win over the config file
    fn apply(&self, config: &mut HarvestConfig) {
        if let Some(url) = &self.api_url {
            config.api.base_url = url.clone();
        }
        if let Some(limit) = self.page_limit {
            config.api.page_limit = limit;
        }
        if let Some(size) = self.initial_cell_size {
            config.grid.initial_cell_size = size;
        }
        if let Some(depth) = self.max_depth {
            config.grid.max_depth = Some(depth);
        }
        if let Some(n) = self.max_concurrent_requests {
            config.grid.max_concurrent_requests = n;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    run(&args).await
}

async fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => HarvestConfig::load_from_file(path)?,
        None => HarvestConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    info!("Notegrid Harvest");
    info!("API: {}", config.api.base_url);

    let region = load_region(&args.boundary_file, &args.country)
        .context("Failed to load country boundary")?;
    let client = NotesApiClient::new(&config.api).context("Failed to create API client")?;

    let progress = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cells ({per_sec})",
                )?
                .progress_chars("#>-"),
        );
        pb
    };

    let start = Instant::now();
    let harvest = Harvester::new(Arc::new(client), Arc::new(region), &config.grid)
        .with_progress(progress)
        .run()
        .await
        .context("Harvest failed")?;

    let count = harvest.features.len();
    let path = save_features(&args.output_dir, harvest.features)?;

    info!(
        "Saved {} notes for {} to {} in {:.1}s ({} requests, {} split, {} pruned, max depth {})",
        count,
        args.country,
        path.display(),
        start.elapsed().as_secs_f64(),
        harvest.stats.requests(),
        harvest.stats.split_cells,
        harvest.stats.pruned_cells,
        harvest.stats.max_depth
    );

    Ok(())
}
