use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{Delta, DeltaStream, Generation, Generator, SearchHit, Searcher, TokenUsage};
use crate::error::ProviderError;

/// A recorded generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateCall {
    pub system: String,
    pub user: String,
}

/// A scripted generator for tests. Returns pre-defined replies in order and
/// records every request.
pub struct MockGenerator {
    replies: Vec<Generation>,
    index: AtomicUsize,
    calls: Mutex<Vec<GenerateCall>>,
    delay: Option<Duration>,
}

impl MockGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_generations(replies.into_iter().map(Generation::text).collect())
    }

    pub fn with_generations(replies: Vec<Generation>) -> Self {
        Self {
            replies,
            index: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    async fn next_reply(&self, system: &str, user: &str) -> Result<Generation, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(GenerateCall {
                system: system.to_string(),
                user: user.to_string(),
            });
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .get(i)
            .cloned()
            .ok_or(ProviderError::Exhausted(i + 1))
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, ProviderError> {
        self.next_reply(system, user).await
    }

    /// Streams the scripted reply word by word.
    async fn stream(&self, system: &str, user: &str) -> Result<DeltaStream, ProviderError> {
        let generation = self.next_reply(system, user).await?;
        let mut deltas: Vec<Result<Delta, ProviderError>> = generation
            .text
            .split_inclusive(' ')
            .map(|word| Ok(Delta::Text(word.to_string())))
            .collect();
        if let Some(usage) = generation.usage {
            deltas.push(Ok(Delta::Usage(usage)));
        }
        Ok(Box::pin(futures::stream::iter(deltas)))
    }

    fn model(&self) -> &str {
        "mock"
    }
}

/// Convenience for scripting a reply with token usage.
pub fn reply_with_usage(text: &str, input_tokens: u64, output_tokens: u64) -> Generation {
    Generation {
        text: text.to_string(),
        usage: Some(TokenUsage {
            input_tokens,
            output_tokens,
        }),
    }
}

/// A recorded search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: String,
    pub max_results: usize,
}

/// A scripted searcher for tests. Each call consumes one result list.
pub struct MockSearcher {
    results: Vec<Vec<SearchHit>>,
    index: AtomicUsize,
    calls: Mutex<Vec<SearchCall>>,
}

impl MockSearcher {
    pub fn new(results: Vec<Vec<SearchHit>>) -> Self {
        Self {
            results,
            index: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Searcher for MockSearcher {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SearchCall {
                query: query.to_string(),
                max_results,
            });
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        let hits = self
            .results
            .get(i)
            .cloned()
            .ok_or(ProviderError::Exhausted(i + 1))?;
        Ok(hits.into_iter().take(max_results).collect())
    }
}
