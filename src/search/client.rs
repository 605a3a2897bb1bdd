use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::core::error::{AppError, AppResult};

/// Search is optional; every caller matches on this before indexing or querying.
pub enum Search {
    Enabled(SearchClient),
    Disabled,
}

impl Search {
    pub fn from_url(url: Option<&str>) -> Result<Self> {
        match url {
            Some(url) => {
                info!("Full-text search enabled at {}", url);
                Ok(Search::Enabled(SearchClient::new(url)?))
            }
            None => {
                info!("Full-text search disabled");
                Ok(Search::Disabled)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: Total,
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Total {
    value: i64,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
}

pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
}

impl SearchClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn add_to_index(&self, index: &str, id: i64, document: &Value) -> AppResult<()> {
        let url = format!("{}/{}/_doc/{}", self.base_url, index, id);
        let response = self
            .http
            .put(&url)
            .json(document)
            .send()
            .await
            .map_err(|e| AppError::Search(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Search(format!(
                "indexing {}/{} returned {}",
                index,
                id,
                response.status()
            )));
        }
        Ok(())
    }

    /// Missing documents are not an error.
    pub async fn remove_from_index(&self, index: &str, id: i64) -> AppResult<()> {
        let url = format!("{}/{}/_doc/{}", self.base_url, index, id);
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| AppError::Search(e.to_string()))?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::Search(format!(
                "removing {}/{} returned {}",
                index, id, status
            )));
        }
        Ok(())
    }

    /// Returns matching ids in relevance order and the total hit count.
    pub async fn query_index(
        &self,
        index: &str,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> AppResult<(Vec<i64>, i64)> {
        let url = format!("{}/{}/_search", self.base_url, index);
        let body = json!({
            "query": { "multi_match": { "query": query, "fields": ["*"] } },
            "from": u64::from(page.saturating_sub(1)) * u64::from(per_page),
            "size": per_page,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Search(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Search(format!(
                "querying {} returned {}",
                index,
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Search(e.to_string()))?;

        let ids = parsed
            .hits
            .hits
            .iter()
            .filter_map(|hit| match hit.id.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("Ignoring non-numeric search hit id {}", hit.id);
                    None
                }
            })
            .collect();

        Ok((ids, parsed.hits.total.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn search_is_disabled_without_url() {
        assert!(matches!(Search::from_url(None).unwrap(), Search::Disabled));
        assert!(matches!(
            Search::from_url(Some("http://localhost:9200")).unwrap(),
            Search::Enabled(_)
        ));
    }

    #[tokio::test]
    async fn query_returns_ids_and_total() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/post/_search")
            .match_body(Matcher::PartialJson(json!({ "from": 5, "size": 5 })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"hits":{"total":{"value":7},"hits":[{"_id":"3"},{"_id":"11"}]}}"#)
            .create_async()
            .await;

        let client = SearchClient::new(&server.url()).unwrap();
        let (ids, total) = client.query_index("post", "hello", 2, 5).await.unwrap();

        assert_eq!(ids, vec![3, 11]);
        assert_eq!(total, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn huge_page_numbers_do_not_overflow_the_offset() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/post/_search")
            .match_body(Matcher::PartialJson(
                json!({ "from": (u64::from(u32::MAX) - 1) * 5, "size": 5 }),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"hits":{"total":{"value":0},"hits":[]}}"#)
            .create_async()
            .await;

        let client = SearchClient::new(&server.url()).unwrap();
        let (ids, total) = client.query_index("post", "x", u32::MAX, 5).await.unwrap();

        assert!(ids.is_empty());
        assert_eq!(total, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn removing_missing_document_is_ok() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/post/_doc/9")
            .with_status(404)
            .create_async()
            .await;

        let client = SearchClient::new(&server.url()).unwrap();
        assert!(client.remove_from_index("post", 9).await.is_ok());
    }

    #[tokio::test]
    async fn indexing_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/post/_doc/1")
            .with_status(500)
            .create_async()
            .await;

        let client = SearchClient::new(&server.url()).unwrap();
        let err = client
            .add_to_index("post", 1, &json!({ "body": "hi" }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Search(_)));
    }
}
