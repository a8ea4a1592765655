//! 命名响应交叉引用
//!
//! `@name login` 标记的请求完成后，其响应记录在 [`NamedResponseStore`] 中，
//! 后续请求可以通过 `{{login.response.<path>}}` 引用：
//!
//! - `status` / `statusText`
//! - `headers` / `headers.<Name>`（名称大小写不敏感）
//! - `body` / `body.$.jsonpath` / `body.user.items[0].id`

use crate::utils::jsonpath;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// 响应体：记录时解析一次 JSON，失败则保留原始文本
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(raw.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// 转为 JSON 值（文本包装为字符串）
    pub fn to_value(&self) -> Value {
        match self {
            ResponseBody::Json(value) => value.clone(),
            ResponseBody::Text(text) => Value::String(text.clone()),
        }
    }

    /// 整个响应体的文本形式
    pub fn render(&self) -> String {
        match self {
            ResponseBody::Json(value) => jsonpath::render(value),
            ResponseBody::Text(text) => text.clone(),
        }
    }
}

/// 一次已完成的命名请求的响应快照
#[derive(Debug, Clone, PartialEq)]
pub struct NamedResponseRecord {
    pub status: u16,
    pub status_text: String,
    /// 保持原始大小写与顺序
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl NamedResponseRecord {
    pub fn new(
        status: u16,
        status_text: impl Into<String>,
        headers: Vec<(String, String)>,
        raw_body: &str,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers,
            body: ResponseBody::parse(raw_body),
        }
    }

    /// 按名称查找 header（大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 所有 header 组成的 JSON 对象
    pub fn headers_json(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.headers {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        Value::Object(map)
    }

    /// Content-Type 拆分为 (mime type, charset)
    pub fn content_type(&self) -> Option<(String, Option<String>)> {
        let raw = self.header("content-type")?;
        let mut parts = raw.split(';');
        let mime = parts.next().unwrap_or_default().trim().to_string();
        let charset = parts.find_map(|p| {
            let (key, value) = p.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_string())
        });
        Some((mime, charset))
    }

    /// 按 `response.` 之后的路径取值
    pub fn lookup(&self, path: &str) -> Option<String> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        match (head, rest) {
            ("status", None) => Some(self.status.to_string()),
            ("statusText", None) => Some(self.status_text.clone()),
            ("headers", None) => Some(self.headers_json().to_string()),
            ("headers", Some(name)) => self.header(name).map(str::to_string),
            ("body", None) => Some(self.body.render()),
            ("body", Some(sub)) => self.lookup_body(sub),
            _ => None,
        }
    }

    fn lookup_body(&self, sub: &str) -> Option<String> {
        let json = self.body.as_json()?;
        let found = if sub.starts_with("$.") || sub == "$" {
            jsonpath::first(json, sub)
        } else {
            jsonpath::lookup(json, sub)
        };
        found.map(jsonpath::render)
    }
}

/// 命名响应表：requestId → 最近一次响应
#[derive(Debug, Clone, Default)]
pub struct NamedResponseStore {
    records: HashMap<String, NamedResponseRecord>,
}

impl NamedResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录（或覆盖）命名响应
    pub fn record(&mut self, request_id: impl Into<String>, record: NamedResponseRecord) {
        self.records.insert(request_id.into(), record);
    }

    pub fn get(&self, request_id: &str) -> Option<&NamedResponseRecord> {
        self.records.get(request_id)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 解析 `requestId.response.<path>` 表达式
    ///
    /// 格式不符、没有对应记录或路径不存在时返回 None。
    pub fn resolve(&self, expression: &str) -> Option<String> {
        let (request_id, path) = expression.split_once(".response.")?;
        let record = self.records.get(request_id)?;
        let value = record.lookup(path);
        if value.is_none() {
            debug!("Response reference '{}' did not match", expression);
        }
        value
    }
}
