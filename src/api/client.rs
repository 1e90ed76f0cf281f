//! `notes.json` client over a shared reqwest connection pool.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{FetchError, NotePage, NoteSource};
use crate::config::ApiConfig;
use crate::models::{Cell, RawNote};

#[derive(Debug, Deserialize)]
struct NoteCollection {
    features: Vec<RawNote>,
}

/// OSM notes API client.
///
/// Cheap to share: one instance serves every cell task.
#[derive(Clone)]
pub struct NotesApiClient {
    client: Client,
    notes_url: Url,
    page_limit: usize,
}

impl NotesApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let notes_url = Url::parse(&base)?.join("notes.json")?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            notes_url,
            page_limit: config.page_limit,
        })
    }

    pub fn page_limit(&self) -> usize {
        self.page_limit
    }
}

#[async_trait]
impl NoteSource for NotesApiClient {
    async fn fetch(&self, cell: &Cell) -> Result<NotePage, FetchError> {
        let response = self
            .client
            .get(self.notes_url.clone())
            .query(&[
                ("bbox", cell.bbox_param()),
                ("limit", self.page_limit.to_string()),
                ("closed", "0".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let collection: NoteCollection = response.json().await.map_err(FetchError::Decode)?;
        debug!(
            "Cell {}: API returned {} notes",
            cell,
            collection.features.len()
        );

        Ok(NotePage::new(collection.features, self.page_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer, page_limit: usize) -> NotesApiClient {
        let config = ApiConfig {
            base_url: format!("{}/api/0.6", server.uri()),
            page_limit,
            ..Default::default()
        };
        NotesApiClient::new(&config).unwrap()
    }

    fn mock_notes(count: u64) -> serde_json::Value {
        let features: Vec<_> = (1..=count)
            .map(|id| {
                json!({
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [15.0, 50.0]},
                    "properties": {
                        "id": id,
                        "status": "open",
                        "comments": [{"date": "2020-01-01 00:00:00 UTC", "text": "hi"}]
                    }
                })
            })
            .collect();
        json!({"type": "FeatureCollection", "features": features})
    }

    #[tokio::test]
    async fn test_fetch_sends_cell_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/0.6/notes.json"))
            .and(query_param("bbox", "14,49,16,51"))
            .and(query_param("limit", "3"))
            .and(query_param("closed", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_notes(2)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, 3);
        let page = client.fetch(&Cell::new(14.0, 49.0, 2.0)).await.unwrap();

        assert_eq!(page.notes.len(), 2);
        assert_eq!(page.notes[0].id(), 1);
        assert!(!page.capped);
    }

    #[tokio::test]
    async fn test_fetch_full_page_is_capped() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/0.6/notes.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_notes(3)))
            .mount(&server)
            .await;

        let client = test_client(&server, 3);
        let page = client.fetch(&Cell::new(14.0, 49.0, 2.0)).await.unwrap();

        assert_eq!(page.notes.len(), 3);
        assert!(page.capped);
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/0.6/notes.json"))
            .respond_with(ResponseTemplate::new(509).set_body_string("Bandwidth limit exceeded"))
            .mount(&server)
            .await;

        let client = test_client(&server, 3);
        let err = client.fetch(&Cell::new(14.0, 49.0, 2.0)).await.unwrap_err();

        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, StatusCode::from_u16(509).unwrap());
                assert_eq!(body, "Bandwidth limit exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/0.6/notes.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = test_client(&server, 3);
        let err = client.fetch(&Cell::new(14.0, 49.0, 2.0)).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_tolerates_undated_comments() {
        let server = MockServer::start().await;

        let body = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [15.0, 50.0]},
                "properties": {
                    "id": 7,
                    "comments": [
                        {"date": "2020-01-01 00:00:00 UTC", "text": "opened"},
                        {"user": "mapper", "text": "no date on this one"}
                    ]
                }
            }]
        });
        Mock::given(method("GET"))
            .and(path("/api/0.6/notes.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = test_client(&server, 3);
        let page = client.fetch(&Cell::new(14.0, 49.0, 2.0)).await.unwrap();

        assert_eq!(page.notes.len(), 1);
        assert_eq!(page.notes[0].properties.comments[1].date, None);
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ApiConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            NotesApiClient::new(&config),
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
