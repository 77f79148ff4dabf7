use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::Instrument;

use crate::config::HttpCfg;
use crate::error::{CoreResult, GatewayError};

/// Request context carries the correlation id forwarded upstream.
#[derive(Clone, Copy, Default)]
pub struct RequestCtx<'a> {
    pub request_id: Option<&'a str>,
}

impl<'a> RequestCtx<'a> {
    pub fn with_request_id(request_id: &'a str) -> Self {
        Self {
            request_id: Some(request_id),
        }
    }
}

/// Raw upstream body chunks, boundaries exactly as they came off the wire.
pub type ByteStream = Pin<Box<dyn Stream<Item = CoreResult<Bytes>> + Send>>;

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn from_cfg(cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.request_timeout_ms));
        if let Some(n) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| GatewayError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            user_agent: concat!("agentquant/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    pub fn new_default() -> CoreResult<Self> {
        Self::from_cfg(&HttpCfg::default())
    }

    /// POST JSON and hand back the response body as a byte stream.
    ///
    /// Fails before any bytes are yielded when the upstream is unreachable,
    /// answers with a non-success status, or has no body.
    pub async fn post_stream<T: Serialize + ?Sized>(
        &self,
        service: &str,
        url: &str,
        body: &T,
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<ByteStream> {
        let start = Instant::now();
        let mut req = self
            .inner
            .post(url)
            .json(body)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/event-stream");
        if let Some(rid) = ctx.request_id {
            req = req.header("X-Request-Id", rid);
        }

        let resp = req
            .send()
            .instrument(tracing::debug_span!("upstream.request", upstream = service, url))
            .await
            .map_err(|e| {
                tracing::warn!(upstream = service, error = %e, "upstream request failed");
                GatewayError::Unavailable {
                    service: service.into(),
                }
            })?;

        let status = resp.status();
        tracing::debug!(
            upstream = service,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "upstream stream opened"
        );
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_http_error(service, status, &text));
        }
        if status == StatusCode::NO_CONTENT || resp.content_length() == Some(0) {
            return Err(GatewayError::EmptyBody {
                service: service.into(),
            });
        }

        let owned = service.to_string();
        let stream = resp.bytes_stream().map_err(move |e| {
            tracing::debug!(upstream = %owned, error = %e, "upstream body read failed");
            GatewayError::Unavailable {
                service: owned.clone(),
            }
        });
        Ok(Box::pin(stream))
    }

    pub async fn get_json<R: DeserializeOwned>(
        &self,
        service: &str,
        url: &str,
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<R> {
        let start = Instant::now();
        let mut req = self.inner.get(url).header("User-Agent", &self.user_agent);
        if let Some(rid) = ctx.request_id {
            req = req.header("X-Request-Id", rid);
        }

        let resp = req
            .send()
            .instrument(tracing::debug_span!("upstream.request", upstream = service, url))
            .await
            .map_err(|e| {
                tracing::warn!(upstream = service, error = %e, "upstream request failed");
                GatewayError::Unavailable {
                    service: service.into(),
                }
            })?;

        let status = resp.status();
        tracing::debug!(
            upstream = service,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "upstream responded"
        );
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_http_error(service, status, &text));
        }

        resp.json::<R>().await.map_err(|e| GatewayError::Decode {
            service: service.into(),
            message: format!("json decode error: {e}"),
        })
    }
}

fn map_http_error(service: &str, status: StatusCode, body: &str) -> GatewayError {
    GatewayError::UpstreamStatus {
        service: service.to_string(),
        status: status.as_u16(),
        message: truncate(body, 300),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => {
            let mut t = s[..cut].to_string();
            t.push_str("...");
            t
        }
        None => s.to_string(),
    }
}
