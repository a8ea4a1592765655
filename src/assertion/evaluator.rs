use crate::assertion::extractor::{extract_value, path_exists};
use crate::assertion::parser::parse_assertion;
use crate::assertion::types::{AssertExpr, AssertionResult};
use crate::http::Response;
use tracing::debug;

/// 对响应求值一条断言
pub fn evaluate_assertion(assertion: &AssertExpr, response: &Response) -> AssertionResult {
    let raw = assertion.to_string();

    let (left, op, right) = match assertion {
        AssertExpr::Exists { path } => {
            return if path_exists(response, path) {
                AssertionResult::success(raw, "present".to_string(), "exists".to_string())
            } else {
                let message = format!("{} is missing", path);
                AssertionResult::failure(raw, "missing".to_string(), "exists".to_string(), message)
            };
        }
        AssertExpr::Compare { left, op, right } => (left, *op, right),
    };

    let actual = match extract_value(response, left) {
        Ok(value) => value,
        Err(e) => return AssertionResult::error(raw, e),
    };
    let expected = format!("{} {}", op, right);

    match op.apply(&actual, right) {
        Ok(true) => AssertionResult::success(raw, actual.to_string(), expected),
        Ok(false) => {
            let message = format!("{} was {}, expected {}", left, actual, expected);
            AssertionResult::failure(raw, actual.to_string(), expected, message)
        }
        Err(e) => AssertionResult::error(raw, e),
    }
}

/// 逐行求值测试块
///
/// 空行与 `#`、`//` 注释行跳过；无法解析的行记为失败结果。
pub fn evaluate_lines<'a, I>(lines: I, response: &Response) -> Vec<AssertionResult>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"))
        .map(|line| match parse_assertion(line) {
            Ok(expr) => evaluate_assertion(&expr, response),
            Err(e) => {
                debug!("无法解析断言 '{}': {}", line, e);
                AssertionResult::error(line.to_string(), e)
            }
        })
        .collect()
}
