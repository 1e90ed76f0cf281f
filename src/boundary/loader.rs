//! Country boundary loading from a GeoJSON feature collection.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use geo::{LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::Region;

/// Tag holding the two-letter country code
const COUNTRY_CODE_TAG: &str = "ISO3166-1";

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("failed to read boundary file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse boundary GeoJSON")]
    Parse(#[from] serde_json::Error),
    #[error("no boundary with ISO3166-1={0}")]
    CountryNotFound(String),
    #[error("boundary {0} has no polygon geometry")]
    UnsupportedGeometry(String),
    #[error("boundary {0} has an empty geometry")]
    EmptyGeometry(String),
}

#[derive(Debug, Deserialize)]
struct BoundaryCollection {
    features: Vec<BoundaryFeature>,
}

#[derive(Debug, Deserialize)]
struct BoundaryFeature {
    #[serde(default)]
    properties: BoundaryProperties,
    /// Parsed lazily, only for the selected country
    #[serde(default)]
    geometry: Value,
}

#[derive(Debug, Default, Deserialize)]
struct BoundaryProperties {
    #[serde(default)]
    tags: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AreaGeometry {
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

/// Load the region for `country_code` from a GeoJSON file (plain or `.gz`).
pub fn load_region(path: &Path, country_code: &str) -> Result<Region, BoundaryError> {
    info!(
        "Loading boundary {} from {}",
        country_code,
        path.display()
    );

    let file = File::open(path).map_err(|source| BoundaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    region_from_reader(BufReader::new(reader), country_code)
}

/// Select a country out of a boundary feature collection
pub fn region_from_reader<R: Read>(reader: R, country_code: &str) -> Result<Region, BoundaryError> {
    let collection: BoundaryCollection = serde_json::from_reader(reader)?;
    debug!("Boundary file has {} features", collection.features.len());

    let feature = collection
        .features
        .into_iter()
        .find(|f| {
            f.properties
                .tags
                .get(COUNTRY_CODE_TAG)
                .and_then(Value::as_str)
                .is_some_and(|code| code.eq_ignore_ascii_case(country_code))
        })
        .ok_or_else(|| BoundaryError::CountryNotFound(country_code.to_string()))?;

    let geometry: AreaGeometry = serde_json::from_value(feature.geometry)
        .map_err(|_| BoundaryError::UnsupportedGeometry(country_code.to_string()))?;

    let multi = match geometry {
        AreaGeometry::Polygon { coordinates } => MultiPolygon::new(vec![to_polygon(coordinates)]),
        AreaGeometry::MultiPolygon { coordinates } => {
            MultiPolygon::new(coordinates.into_iter().map(to_polygon).collect())
        }
    };

    let region =
        Region::new(multi).ok_or_else(|| BoundaryError::EmptyGeometry(country_code.to_string()))?;

    let bounds = region.bounds();
    info!(
        "Boundary {} loaded: {} polygons, bbox ({}, {}) - ({}, {})",
        country_code,
        region.geometry().0.len(),
        bounds.min().x,
        bounds.min().y,
        bounds.max().x,
        bounds.max().y
    );

    Ok(region)
}

/// First ring is the exterior, the rest are holes
fn to_polygon(rings: Vec<Vec<[f64; 2]>>) -> Polygon<f64> {
    let mut rings = rings
        .into_iter()
        .map(|ring| LineString::from(ring.into_iter().map(|[x, y]| (x, y)).collect::<Vec<_>>()));

    let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
    Polygon::new(exterior, rings.collect())
}
