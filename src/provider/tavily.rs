use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SearchHit, Searcher};
use crate::error::ProviderError;

const API_URL: &str = "https://api.tavily.com/search";

/// Web search through the Tavily API.
pub struct TavilySearcher {
    api_key: String,
    client: reqwest::Client,
}

impl TavilySearcher {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Searcher for TavilySearcher {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let body = ApiRequest {
            query,
            max_results,
            search_depth: "basic",
        };

        let resp = self
            .client
            .post(API_URL)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let api_resp: ApiResponse = resp.json().await?;
        debug!(query, hits = api_resp.results.len(), "search complete");

        Ok(api_resp
            .results
            .into_iter()
            .take(max_results)
            .map(SearchHit::from)
            .collect())
    }
}

// --- API types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    results: Vec<ApiResult>,
}

#[derive(Deserialize)]
struct ApiResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl From<ApiResult> for SearchHit {
    fn from(r: ApiResult) -> Self {
        SearchHit {
            title: r.title,
            url: r.url,
            content: r.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_search_response() {
        let json = r#"{
            "query": "node.js origins",
            "results": [
                {"title": "Node.js", "url": "https://en.wikipedia.org/wiki/Node.js", "content": "Node.js was written by Ryan Dahl in 2009.", "score": 0.98}
            ],
            "response_time": 1.2
        }"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        let hits: Vec<SearchHit> = resp.results.into_iter().map(SearchHit::from).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Node.js");
        assert!(hits[0].content.contains("Ryan Dahl"));
    }

    #[test]
    fn parse_response_without_results() {
        let resp: ApiResponse = serde_json::from_str(r#"{"query": "x"}"#).unwrap();
        assert!(resp.results.is_empty());
    }

    #[test]
    fn request_serializes_bound() {
        let body = ApiRequest {
            query: "q",
            max_results: 1,
            search_depth: "basic",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_results"], 1);
        assert_eq!(json["query"], "q");
    }
}
