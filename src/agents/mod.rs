//! The workflow nodes: intake, planner, router and the capability workers.
//!
//! Every node reads an immutable [`WorkflowState`](crate::state::WorkflowState)
//! and returns a delta. Provider calls go through [`NodeContext`], which
//! applies the per-call timeout, forwards streamed chunks to the event bus
//! tagged with the node, and tallies token usage.

pub mod coder;
pub mod intake;
pub mod planner;
pub mod reporter;
pub mod researcher;
pub mod router;

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::StreamExt;

use crate::engine::Node;
use crate::engine::workflow::{Providers, WorkflowConfig};
use crate::error::{ProviderError, Result, WorkflowError};
use crate::events::{Event, EventBus};
use crate::plan::Plan;
use crate::provider::{Delta, Generator, SearchHit, TokenUsage};
use crate::state::WorkflowState;

/// Per-node execution context handed out by the engine.
pub struct NodeContext<'a> {
    node: Node,
    providers: &'a Providers,
    events: &'a EventBus,
    config: &'a WorkflowConfig,
    usage: Mutex<TokenUsage>,
}

impl<'a> NodeContext<'a> {
    pub fn new(
        node: Node,
        providers: &'a Providers,
        events: &'a EventBus,
        config: &'a WorkflowConfig,
    ) -> Self {
        Self {
            node,
            providers,
            events,
            config,
            usage: Mutex::new(TokenUsage::default()),
        }
    }

    pub fn node(&self) -> Node {
        self.node
    }

    pub fn providers(&self) -> &'a Providers {
        self.providers
    }

    pub fn config(&self) -> &'a WorkflowConfig {
        self.config
    }

    /// Tokens spent by this node so far.
    pub fn usage(&self) -> TokenUsage {
        *self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit a chunk of output attributed to this node.
    pub fn emit_chunk(&self, text: impl Into<String>) {
        self.events.emit(Event::Chunk {
            node: self.node,
            text: text.into(),
        });
    }

    /// One generation call with the engine's generator.
    pub async fn generate(&self, system: &str, user: &str) -> Result<String> {
        self.generate_with(self.providers.generator.as_ref(), system, user)
            .await
    }

    /// One generation call. Streams chunks to the event bus when streaming
    /// is enabled. Empty output is an error.
    pub async fn generate_with(
        &self,
        generator: &dyn Generator,
        system: &str,
        user: &str,
    ) -> Result<String> {
        let call = async {
            let mut text = String::new();
            if self.config.stream {
                let mut stream = generator.stream(system, user).await?;
                while let Some(delta) = stream.next().await {
                    match delta? {
                        Delta::Text(chunk) => {
                            text.push_str(&chunk);
                            self.emit_chunk(chunk);
                        }
                        Delta::Usage(usage) => self.record(usage),
                    }
                }
            } else {
                let generation = generator.generate(system, user).await?;
                if let Some(usage) = generation.usage {
                    self.record(usage);
                }
                self.emit_chunk(generation.text.clone());
                text = generation.text;
            }
            Ok::<_, ProviderError>(text)
        };

        let text = self
            .within_timeout(call)
            .await?
            .map_err(|e| WorkflowError::provider(self.node, e))?;

        if text.trim().is_empty() {
            return Err(WorkflowError::provider(self.node, ProviderError::EmptyResponse));
        }
        Ok(text)
    }

    /// One search call, bounded to `max_results` hits.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let hits = self
            .within_timeout(self.providers.searcher.search(query, max_results))
            .await?
            .map_err(|e| WorkflowError::provider(self.node, e))?;
        Ok(hits.into_iter().take(max_results).collect())
    }

    fn record(&self, usage: TokenUsage) {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(usage);
    }

    async fn within_timeout<T>(&self, call: impl Future<Output = T>) -> Result<T> {
        let after = self.config.call_timeout;
        tokio::time::timeout(after, call)
            .await
            .map_err(|_| WorkflowError::Timeout {
                what: format!("{} provider call", self.node),
                after,
            })
    }
}

/// The plan a worker is about to advance, or `EmptyPlanAdvance` when there
/// is nothing pending.
pub(crate) fn pending_plan(state: &WorkflowState, node: Node) -> Result<&Plan> {
    state
        .plan()
        .filter(|plan| !plan.is_complete())
        .ok_or(WorkflowError::EmptyPlanAdvance { node })
}

/// Copy of `plan` with its current step completed.
pub(crate) fn advance(plan: &Plan, node: Node) -> Result<Plan> {
    let mut next = plan.clone();
    next.complete_current()
        .map_err(|_| WorkflowError::EmptyPlanAdvance { node })?;
    Ok(next)
}
