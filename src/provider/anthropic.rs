use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Delta, DeltaStream, Generation, Generator, TokenUsage};
use crate::consts::DEFAULT_MODEL;
use crate::error::ProviderError;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

/// A generator backed by the Anthropic Messages API.
pub struct AnthropicGenerator {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicGenerator {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn send(
        &self,
        system: &str,
        user: &str,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let messages = [Message {
            role: "user",
            content: user,
        }];
        let body = ApiRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: &messages,
            stream,
        };

        let resp = self
            .client
            .post(API_URL)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, ProviderError> {
        let resp = self.send(system, user, false).await?;
        let api_resp: ApiResponse = resp.json().await?;

        let text: String = api_resp
            .content
            .iter()
            .filter_map(|block| {
                if block.content_type == "text" {
                    block.text.as_deref()
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let usage = api_resp.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        });
        debug!(model = %self.model, ?usage, "generation complete");

        Ok(Generation { text, usage })
    }

    async fn stream(&self, system: &str, user: &str) -> Result<DeltaStream, ProviderError> {
        let resp = self.send(system, user, true).await?;
        let state = (
            Box::pin(resp.bytes_stream()),
            SseDecoder::default(),
            VecDeque::new(),
            false,
        );

        let stream = futures::stream::unfold(state, |state| async move {
            let (mut body, mut decoder, mut queue, mut finished) = state;
            loop {
                if let Some(item) = queue.pop_front() {
                    return Some((item, (body, decoder, queue, finished)));
                }
                if finished {
                    return None;
                }
                match body.next().await {
                    Some(Ok(bytes)) => queue.extend(decoder.push(&bytes)),
                    Some(Err(e)) => {
                        finished = true;
                        queue.push_back(Err(ProviderError::Http(e)));
                    }
                    None => {
                        finished = true;
                        queue.extend(decoder.finish());
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Incremental decoder for the Messages API server-sent events.
#[derive(Default)]
struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<Delta, ProviderError>> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut out = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let event: String = self.buffer.drain(..end + 2).collect();
            out.extend(decode_event(&event));
        }
        out
    }

    fn finish(&mut self) -> Vec<Result<Delta, ProviderError>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_event(&rest).into_iter().collect()
    }
}

fn decode_event(event: &str) -> Option<Result<Delta, ProviderError>> {
    let data: String = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();
    if data.is_empty() {
        return None;
    }

    let parsed: StreamEvent = match serde_json::from_str(&data) {
        Ok(parsed) => parsed,
        Err(e) => return Some(Err(ProviderError::Decode(format!("{e}: {data}")))),
    };

    match parsed {
        StreamEvent::ContentBlockDelta { delta } => match delta {
            BlockDelta::TextDelta { text } => Some(Ok(Delta::Text(text))),
            BlockDelta::Other => None,
        },
        StreamEvent::MessageStart { message } => message.usage.map(|u| {
            Ok(Delta::Usage(TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }))
        }),
        StreamEvent::MessageDelta { usage } => usage.map(|u| {
            Ok(Delta::Usage(TokenUsage {
                input_tokens: 0,
                output_tokens: u.output_tokens,
            }))
        }),
        StreamEvent::Error { error } => Some(Err(ProviderError::Api {
            status: 0,
            body: error.to_string(),
        })),
        StreamEvent::Other => None,
    }
}

// --- API types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message<'a>],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart { message: StartMessage },
    ContentBlockDelta { delta: BlockDelta },
    MessageDelta { usage: Option<Usage> },
    Error { error: serde_json::Value },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct StartMessage {
    usage: Option<Usage>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}
