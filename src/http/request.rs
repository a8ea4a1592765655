use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::http::types::{Method, parse_target};
use crate::{RestflowError, Result};

/// 变量已解析完毕、可直接发送的请求
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: url::Url,
    /// 保持原始顺序，允许重复
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Request {
    pub fn new(method: Method, target: &str) -> Result<Self> {
        Ok(Self {
            method,
            url: parse_target(target)?,
            headers: Vec::new(),
            body: None,
        })
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// 转为 reqwest 的 HeaderMap，非法名称或值返回错误
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (key, value) in &self.headers {
            let name: HeaderName = key
                .parse()
                .map_err(|_| RestflowError::ParseError(format!("Invalid header name: {}", key)))?;
            let value: HeaderValue = value.parse().map_err(|_| {
                RestflowError::ParseError(format!("Invalid value for header {}: {}", key, value))
            })?;
            map.append(name, value);
        }
        Ok(map)
    }
}
