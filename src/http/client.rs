use std::time::{Duration, Instant};

use crate::Result;
use crate::http::request::Request;
use crate::http::response::Response;
use tracing::debug;

/// 发送请求的抽象，执行器只依赖这个接口
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// 基于 reqwest 的默认实现
#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            inner: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

impl Transport for Client {
    async fn send(&self, request: Request) -> Result<Response> {
        let headers = request.header_map()?;
        debug!("{} {}", request.method, request.url);

        let mut req = self
            .inner
            .request(request.method.to_reqwest(), request.url)
            .headers(headers);

        if let Some(body) = request.body {
            req = req.body(body);
        }

        let start = Instant::now();
        let response = req.send().await?;
        let duration = start.elapsed();

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await?;

        Response::new(status, headers, body, duration)
    }
}
