use async_trait::async_trait;

use crate::error::CoreResult;
use crate::http_client::{ByteStream, HttpClient, RequestCtx};
use crate::model::AgentChatRequest;
use crate::provider::AgentUpstream;

/// Streaming client for the agent's OpenAI-style chat endpoint.
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: HttpClient,
    base: String,
    name: String, // usually "agent"
}

impl AgentClient {
    pub fn new(http: HttpClient, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            name: "agent".into(),
        }
    }

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str) -> Self {
        AgentClient::new(HttpClient::new_default().unwrap(), server_base)
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.base)
    }
}

#[async_trait]
impl AgentUpstream for AgentClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open_chat_stream(
        &self,
        req: &AgentChatRequest,
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<ByteStream> {
        tracing::debug!(
            upstream = %self.name,
            messages = req.messages.len(),
            "opening agent chat stream"
        );
        self.http.post_stream(&self.name, &self.url(), req, ctx).await
    }
}
