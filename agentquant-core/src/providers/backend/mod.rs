use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreResult;
use crate::http_client::{HttpClient, RequestCtx};
use crate::provider::BackendApi;
use crate::results::{transform_price_bars, transform_task_result};

/// Client for the backtesting backend's data and result endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: HttpClient,
    base: String,
    name: String, // usually "backend"
}

impl BackendClient {
    pub fn new(http: HttpClient, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            name: "backend".into(),
        }
    }

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str) -> Self {
        BackendClient::new(HttpClient::new_default().unwrap(), server_base)
    }
}

#[async_trait]
impl BackendApi for BackendClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn price_bars(&self, storage_key: &str, ctx: &RequestCtx<'_>) -> CoreResult<Value> {
        let url = format!("{}/data/{}", self.base, storage_key);
        let raw: Value = self.http.get_json(&self.name, &url, ctx).await?;
        transform_price_bars(raw)
    }

    async fn task_result(&self, task_id: &str, ctx: &RequestCtx<'_>) -> CoreResult<Value> {
        let url = format!("{}/result/{}", self.base, task_id);
        let raw: Value = self.http.get_json(&self.name, &url, ctx).await?;
        transform_task_result(raw)
    }
}
