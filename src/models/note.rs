//! OSM note documents: the raw API shape and the normalized output record.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use geo::Point;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Author recorded for comments made without an account
pub const ANONYMOUS_USER: &str = "anonymous";

/// Properties only meaningful to the API transport, never written out
const TRANSPORT_FIELDS: [&str; 3] = ["url", "comment_url", "close_url"];

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\S+").unwrap());

/// GeoJSON point geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PointGeometry {
    Point { coordinates: [f64; 2] },
}

impl PointGeometry {
    pub fn new(lon: f64, lat: f64) -> Self {
        PointGeometry::Point {
            coordinates: [lon, lat],
        }
    }

    pub fn point(&self) -> Point<f64> {
        match self {
            PointGeometry::Point { coordinates } => Point::new(coordinates[0], coordinates[1]),
        }
    }
}

/// One note feature as returned by `notes.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawNote {
    pub geometry: PointGeometry,
    pub properties: RawNoteProperties,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawNoteProperties {
    pub id: u64,
    /// Thread of comments, oldest first
    #[serde(default)]
    pub comments: Vec<RawComment>,
    /// Everything else (status, date_created, urls, ...)
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawComment {
    /// Only the first comment's date is ever read
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl RawNote {
    pub fn id(&self) -> u64 {
        self.properties.id
    }

    pub fn has_comments(&self) -> bool {
        !self.properties.comments.is_empty()
    }
}

/// Canonical output record, serialized as a GeoJSON feature
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct NoteFeature {
    pub geometry: PointGeometry,
    pub properties: NoteProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteProperties {
    pub id: u64,
    pub user: String,
    pub text: String,
    /// Space-separated hashtags found in `text`
    pub tags: String,
    pub year: i32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NoteFeature {
    pub fn id(&self) -> u64 {
        self.properties.id
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("note {id}: cannot parse year from date {date:?}")]
    MalformedDate { id: u64, date: String },
}

/// Turn a raw note into its output record.
///
/// Derived fields come from the first comment only. Returns `Ok(None)` for
/// notes without comments.
pub fn normalize(raw: RawNote) -> Result<Option<NoteFeature>, NormalizeError> {
    let RawNote {
        geometry,
        properties,
    } = raw;
    let RawNoteProperties {
        id,
        comments,
        other: mut extra,
    } = properties;

    let Some(first) = comments.into_iter().next() else {
        return Ok(None);
    };

    let year = first
        .date
        .as_deref()
        .and_then(parse_year)
        .ok_or_else(|| NormalizeError::MalformedDate {
            id,
            date: first.date.clone().unwrap_or_default(),
        })?;

    for field in TRANSPORT_FIELDS {
        extra.remove(field);
    }
    for field in ["user", "text", "tags", "year"] {
        extra.remove(field);
    }

    Ok(Some(NoteFeature {
        geometry,
        properties: NoteProperties {
            id,
            user: first.user.unwrap_or_else(|| ANONYMOUS_USER.to_string()),
            tags: extract_tags(&first.text),
            text: first.text,
            year,
            extra,
        },
    }))
}

/// Distinct `#tag` tokens, joined by single spaces in lexicographic order
pub fn extract_tags(text: &str) -> String {
    let tags: BTreeSet<&str> = HASHTAG.find_iter(text).map(|m| m.as_str()).collect();
    tags.into_iter().collect::<Vec<_>>().join(" ")
}

fn parse_year(date: &str) -> Option<i32> {
    date.get(..4)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawNote {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [21.01, 52.23]},
            "properties": {
                "id": 4242,
                "url": "https://api.openstreetmap.org/api/0.6/notes/4242.json",
                "comment_url": "https://api.openstreetmap.org/api/0.6/notes/4242/comment.json",
                "close_url": "https://api.openstreetmap.org/api/0.6/notes/4242/close.json",
                "date_created": "2021-06-01 10:00:00 UTC",
                "status": "open",
                "comments": [
                    {
                        "date": "2021-06-01 10:00:00 UTC",
                        "uid": 7,
                        "user": "mapper",
                        "action": "opened",
                        "text": "Missing shop #StreetComplete #survey #StreetComplete"
                    },
                    {
                        "date": "2022-01-01 10:00:00 UTC",
                        "user": "other",
                        "action": "commented",
                        "text": "still there #later"
                    }
                ]
            }
        })
    }

    #[test]
    fn test_normalize_first_comment_fields() {
        let feature = normalize(raw(sample())).unwrap().unwrap();

        assert_eq!(feature.id(), 4242);
        assert_eq!(feature.properties.user, "mapper");
        assert_eq!(
            feature.properties.text,
            "Missing shop #StreetComplete #survey #StreetComplete"
        );
        assert_eq!(feature.properties.tags, "#StreetComplete #survey");
        assert_eq!(feature.properties.year, 2021);
        assert_eq!(feature.geometry, PointGeometry::new(21.01, 52.23));
    }

    #[test]
    fn test_normalize_drops_transport_fields() {
        let feature = normalize(raw(sample())).unwrap().unwrap();
        let out = serde_json::to_value(&feature).unwrap();
        let props = out["properties"].as_object().unwrap();

        assert_eq!(out["type"], "Feature");
        assert_eq!(out["geometry"]["type"], "Point");
        for field in ["url", "comment_url", "close_url", "comments"] {
            assert!(!props.contains_key(field), "{field} should be dropped");
        }
        assert_eq!(props["status"], "open");
        assert_eq!(props["date_created"], "2021-06-01 10:00:00 UTC");
        assert_eq!(props["id"], 4242);
    }

    #[test]
    fn test_normalize_anonymous_user() {
        let mut value = sample();
        value["properties"]["comments"][0]
            .as_object_mut()
            .unwrap()
            .remove("user");

        let feature = normalize(raw(value)).unwrap().unwrap();
        assert_eq!(feature.properties.user, ANONYMOUS_USER);
    }

    #[test]
    fn test_normalize_skips_empty_comments() {
        let mut value = sample();
        value["properties"]["comments"] = json!([]);

        assert!(normalize(raw(value)).unwrap().is_none());
    }

    #[test]
    fn test_normalize_malformed_date() {
        let mut value = sample();
        value["properties"]["comments"][0]["date"] = json!("n/a");

        let err = normalize(raw(value)).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedDate { id: 4242, .. }));
    }

    #[test]
    fn test_normalize_missing_first_date() {
        let mut value = sample();
        value["properties"]["comments"][0]
            .as_object_mut()
            .unwrap()
            .remove("date");

        let err = normalize(raw(value)).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedDate { id: 4242, ref date } if date.is_empty()));
    }

    #[test]
    fn test_later_comment_without_date_is_ignored() {
        let mut value = sample();
        value["properties"]["comments"][1]
            .as_object_mut()
            .unwrap()
            .remove("date");

        let feature = normalize(raw(value)).unwrap().unwrap();
        assert_eq!(feature.properties.year, 2021);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let note = raw(sample());
        let first = normalize(note.clone()).unwrap();
        let second = normalize(note).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_tags() {
        assert_eq!(extract_tags("no tags here"), "");
        assert_eq!(extract_tags("#b text #a\n#b"), "#a #b");
        assert_eq!(extract_tags("lone # sign"), "");
    }
}
