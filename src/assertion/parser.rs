use crate::assertion::types::{AssertError, AssertExpr, AssertValue, CompareOp, ValuePath};
use once_cell::sync::Lazy;
use regex::Regex;

static COMPARE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+)\s+(==|!=|>=|<=|>|<|contains)\s+(.+)$")
        .expect("assertion regex must compile")
});

static EXISTS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+exists$").expect("exists regex must compile"));

/// 解析断言表达式
///
/// 支持的格式：
/// - `status == 200`
/// - `headers.content-type contains "json"`
/// - `body.user.id > 0`
/// - `body.$.items[0].id == 1`
/// - `response.time < 1000`
/// - `body.token exists`
///
/// 左值中不能有空白，运算符两侧必须有空白。
pub fn parse_assertion(input: &str) -> Result<AssertExpr, AssertError> {
    let input = input.trim();

    if let Some(caps) = EXISTS_REGEX.captures(input) {
        let path = parse_value_path(&caps[1])?;
        return Ok(AssertExpr::Exists { path });
    }

    let caps = COMPARE_REGEX.captures(input).ok_or_else(|| {
        AssertError::InvalidSyntax(format!("No valid operator found in assertion: {}", input))
    })?;

    let op: CompareOp = caps[2].parse()?;
    let left = parse_value_path(&caps[1])?;
    let right = parse_assert_value(&caps[3]);

    Ok(AssertExpr::Compare { left, op, right })
}

/// 解析值路径
fn parse_value_path(input: &str) -> Result<ValuePath, AssertError> {
    match input {
        "status" => return Ok(ValuePath::Status),
        "response.time" => return Ok(ValuePath::ResponseTime),
        "body" => return Ok(ValuePath::Body(String::new())),
        _ => {}
    }

    if let Some(rest) = input.strip_prefix("headers.") {
        if !rest.is_empty() {
            return Ok(ValuePath::Header(rest.to_string()));
        }
    }

    if let Some(rest) = input.strip_prefix("body.") {
        if !rest.is_empty() {
            return Ok(ValuePath::Body(rest.to_string()));
        }
    }

    Err(AssertError::InvalidSyntax(format!(
        "Invalid value path: {}. Must start with 'status', 'headers.', 'body', or 'response.time'",
        input
    )))
}

/// 解析断言值（右值）
fn parse_assert_value(input: &str) -> AssertValue {
    let input = input.trim();

    match input {
        "null" => return AssertValue::Null,
        "true" => return AssertValue::Bool(true),
        "false" => return AssertValue::Bool(false),
        _ => {}
    }

    // 字符串（带引号）
    if input.len() >= 2
        && ((input.starts_with('"') && input.ends_with('"'))
            || (input.starts_with('\'') && input.ends_with('\'')))
    {
        return AssertValue::String(input[1..input.len() - 1].to_string());
    }

    if let Ok(n) = input.parse::<f64>() {
        return AssertValue::Number(n);
    }

    // 未带引号的字符串（用于 contains 等）
    AssertValue::String(input.to_string())
}
