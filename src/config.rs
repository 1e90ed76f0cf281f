//! Harvest configuration, loaded from an optional TOML file.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::api::{API_LIMIT, DEFAULT_API_URL};

/// Edge length of the bootstrap grid cells, in degrees
pub const INIT_CELL_SIZE: f64 = 4.0;

/// Smallest accepted bootstrap cell, in degrees
pub const MIN_INIT_CELL_SIZE: f64 = 0.1;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HarvestConfig {
    pub api: ApiConfig,
    pub grid: GridConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub page_limit: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GridConfig {
    pub initial_cell_size: f64,
    /// Cap on simultaneous API requests, 0 for unbounded
    pub max_concurrent_requests: usize,
    /// Deepest subdivision allowed before the run fails; unlimited if unset
    pub max_depth: Option<u32>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            page_limit: API_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: concat!("notegrid/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            initial_cell_size: INIT_CELL_SIZE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_depth: None,
        }
    }
}

impl GridConfig {
    pub fn concurrency_limit(&self) -> Option<usize> {
        (self.max_concurrent_requests > 0).then_some(self.max_concurrent_requests)
    }
}

impl HarvestConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: HarvestConfig =
            toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.api.page_limit > 0, "api.page_limit must be positive");
        ensure!(
            self.grid.initial_cell_size.is_finite()
                && self.grid.initial_cell_size >= MIN_INIT_CELL_SIZE,
            "grid.initial_cell_size must be at least {} degrees, got {}",
            MIN_INIT_CELL_SIZE,
            self.grid.initial_cell_size
        );
        Ok(())
    }
}
