use crate::assertion::types::{AssertError, AssertValue, ValuePath};
use crate::http::Response;
use crate::utils::jsonpath;
use crate::variable::response::ResponseBody;

/// 从响应中提取值
pub fn extract_value(response: &Response, path: &ValuePath) -> Result<AssertValue, AssertError> {
    match path {
        ValuePath::Status => Ok(AssertValue::Number(response.status.code() as f64)),

        ValuePath::Header(name) => response
            .header(name)
            .map(|value| AssertValue::String(value.to_string()))
            .ok_or_else(|| AssertError::PathNotFound(format!("Header '{}' not found", name))),

        ValuePath::Body(path) => extract_from_body(&response.body, path),

        ValuePath::ResponseTime => Ok(AssertValue::Number(response.duration.as_millis() as f64)),
    }
}

/// 路径是否存在（对象与数组也算存在）
pub fn path_exists(response: &Response, path: &ValuePath) -> bool {
    match path {
        ValuePath::Status | ValuePath::ResponseTime => true,
        ValuePath::Header(name) => response.header(name).is_some(),
        ValuePath::Body(path) if path.is_empty() => true,
        ValuePath::Body(path) => ResponseBody::parse(&response.body)
            .as_json()
            .and_then(|json| find_in_json(json, path))
            .is_some(),
    }
}

fn find_in_json<'a>(json: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    if path.starts_with('$') {
        jsonpath::first(json, path)
    } else {
        jsonpath::lookup(json, path)
    }
}

/// 从响应体中提取值
///
/// 空路径返回整个 body 的文本；`$.` 开头按 JSONPath 取第一个匹配。
fn extract_from_body(body: &str, path: &str) -> Result<AssertValue, AssertError> {
    let parsed = ResponseBody::parse(body);

    if path.is_empty() {
        return Ok(AssertValue::String(parsed.render()));
    }

    let json = parsed.as_json().ok_or_else(|| {
        AssertError::ExtractionError(format!("Response body is not JSON, cannot read body.{}", path))
    })?;

    let value = find_in_json(json, path)
        .ok_or_else(|| AssertError::PathNotFound(format!("Path 'body.{}' not found", path)))?;
    json_value_to_assert_value(value)
}

/// 将 serde_json::Value 转换为 AssertValue
fn json_value_to_assert_value(value: &serde_json::Value) -> Result<AssertValue, AssertError> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(AssertValue::Number).ok_or_else(|| {
            AssertError::ExtractionError("Number cannot be represented as f64".to_string())
        }),
        serde_json::Value::String(s) => Ok(AssertValue::String(s.clone())),
        serde_json::Value::Bool(b) => Ok(AssertValue::Bool(*b)),
        serde_json::Value::Null => Ok(AssertValue::Null),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(
            AssertError::ExtractionError("Cannot compare arrays or objects directly".to_string()),
        ),
    }
}
