//! GeoJSON output of a finished harvest.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::models::NoteFeature;

#[derive(Serialize)]
struct FeatureCollection<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    features: &'a [NoteFeature],
}

/// `notes_YYYY-MM-DD_HH-MM-SS.geojson`
pub fn output_filename(at: DateTime<Local>) -> String {
    format!("notes_{}.geojson", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Write the features as one FeatureCollection into `dir`, sorted by note id.
///
/// The file only appears once fully written.
pub fn save_features(dir: &Path, mut features: Vec<NoteFeature>) -> Result<PathBuf> {
    features.sort_unstable_by_key(NoteFeature::id);

    let path = dir.join(output_filename(Local::now()));
    let temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    let mut writer = BufWriter::new(temp);
    serde_json::to_writer(
        &mut writer,
        &FeatureCollection {
            kind: "FeatureCollection",
            features: &features,
        },
    )
    .context("Failed to serialize notes")?;
    writer.flush()?;

    let temp = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush output")?;
    temp.persist(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Saved {} notes to {}", features.len(), path.display());
    Ok(path)
}
