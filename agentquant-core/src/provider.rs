use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreResult;
use crate::http_client::{ByteStream, RequestCtx};
use crate::model::AgentChatRequest;

/// The agent behind `/v1/chat/completions`.
#[async_trait]
pub trait AgentUpstream: Send + Sync {
    fn name(&self) -> &str;

    /// Open the streaming chat call. Resolves once the upstream has answered
    /// with a success status and a body; the stream then yields raw chunks.
    async fn open_chat_stream(
        &self,
        req: &AgentChatRequest,
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<ByteStream>;
}

/// The backtesting backend holding price bars and task results.
#[async_trait]
pub trait BackendApi: Send + Sync {
    fn name(&self) -> &str;

    /// `{data: [bar]}` with `time` in seconds added to each bar.
    async fn price_bars(&self, storage_key: &str, ctx: &RequestCtx<'_>) -> CoreResult<Value>;

    /// Task result with dates, statuses and signal types normalized.
    async fn task_result(&self, task_id: &str, ctx: &RequestCtx<'_>) -> CoreResult<Value>;
}
