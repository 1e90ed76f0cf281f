//! Notes API access.
//!
//! [`NoteSource`] is the single query the crawler needs: all open notes in a
//! bounding box, capped at a page limit. [`NotesApiClient`] implements it
//! against the OSM API.

mod client;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::{Cell, RawNote};

pub use client::NotesApiClient;

/// Default OSM API root
pub const DEFAULT_API_URL: &str = "https://api.openstreetmap.org/api/0.6/";

/// Maximum page size accepted by `notes.json`
pub const API_LIMIT: usize = 10_000;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid API URL")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed")]
    Transport(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode API response")]
    Decode(#[source] reqwest::Error),
}

/// One bounded-area result page
#[derive(Debug, Clone)]
pub struct NotePage {
    pub notes: Vec<RawNote>,
    /// The page is full, so the cell may hold more notes than were returned
    pub capped: bool,
}

impl NotePage {
    pub fn new(notes: Vec<RawNote>, page_limit: usize) -> Self {
        let capped = notes.len() == page_limit;
        Self { notes, capped }
    }
}

#[async_trait]
pub trait NoteSource: Send + Sync {
    /// Fetch open notes inside the cell's bounding box
    async fn fetch(&self, cell: &Cell) -> Result<NotePage, FetchError>;
}
