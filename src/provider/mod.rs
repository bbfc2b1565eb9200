//! External capability providers: text generation and web search.
//!
//! The engine only sees the [`Generator`] and [`Searcher`] traits. Handles
//! are shared read-only across runs, so implementations must be `Send + Sync`
//! and keep no per-run state.

pub mod anthropic;
pub mod human;
pub mod mock;
pub mod tavily;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Token usage from one or more generation calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Accumulate another usage into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// Total tokens (input + output).
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A complete generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// One increment of a streamed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Text(String),
    Usage(TokenUsage),
}

pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<Delta, ProviderError>> + Send>>;

/// A text-generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, ProviderError>;

    /// Stream the generation as ordered fragments. The default yields the
    /// whole text as one fragment.
    async fn stream(&self, system: &str, user: &str) -> Result<DeltaStream, ProviderError> {
        let generation = self.generate(system, user).await?;
        let mut deltas = vec![Ok(Delta::Text(generation.text))];
        if let Some(usage) = generation.usage {
            deltas.push(Ok(Delta::Usage(usage)));
        }
        Ok(Box::pin(futures::stream::iter(deltas)))
    }

    fn model(&self) -> &str;
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

impl SearchHit {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }
}

/// A web-search service. An empty result list is a valid answer.
#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<SearchHit>, ProviderError>;
}

/// A searcher that never finds anything. Used when no search backend is
/// configured.
pub struct NoSearch;

#[async_trait]
impl Searcher for NoSearch {
    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct Fixed;

    #[async_trait]
    impl Generator for Fixed {
        async fn generate(&self, _system: &str, _user: &str) -> Result<Generation, ProviderError> {
            Ok(Generation {
                text: "hello".to_string(),
                usage: Some(TokenUsage {
                    input_tokens: 3,
                    output_tokens: 1,
                }),
            })
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage.add(TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        });
        usage.add(TokenUsage {
            input_tokens: 1,
            output_tokens: 2,
        });
        assert_eq!(usage.input_tokens, 11);
        assert_eq!(usage.output_tokens, 7);
        assert_eq!(usage.total(), 18);
    }

    #[tokio::test]
    async fn default_stream_yields_whole_text_then_usage() {
        let deltas: Vec<_> = Fixed.stream("s", "u").await.unwrap().collect().await;
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].as_ref().unwrap(), &Delta::Text("hello".to_string()));
        assert!(matches!(deltas[1], Ok(Delta::Usage(u)) if u.total() == 4));
    }

    #[tokio::test]
    async fn no_search_returns_empty() {
        let hits = NoSearch.search("anything", 3).await.unwrap();
        assert!(hits.is_empty());
    }
}
