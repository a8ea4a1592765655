//! 精简的 JSONPath 求值器
//!
//! 支持的语法：
//! - `$` 根节点
//! - `.name` / `['name']` 字段访问
//! - `[0]` / `[-1]` 数组下标（负数从末尾计数）
//! - `.*` / `[*]` 通配
//! - `..name` 递归下降
//!
//! 同时提供不带 `$` 的普通路径访问（`data.items[0].id`），
//! 供命名响应引用与断言使用。

use serde_json::Value;

/// 路径段
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
    /// `..name` 或 `..*`（None 表示通配）
    Descend(Option<String>),
}

/// 对 JSON 值执行 JSONPath 表达式，返回所有匹配项
///
/// 表达式非法时返回 None；合法但没有匹配时返回空列表。
pub fn select<'a>(value: &'a Value, path: &str) -> Option<Vec<&'a Value>> {
    let rest = path.trim().strip_prefix('$')?;
    let segments = parse_segments(rest)?;
    Some(apply(value, &segments))
}

/// 返回第一个匹配项
pub fn first<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    select(value, path)?.into_iter().next()
}

/// 普通路径访问：`user.name`、`items[0].id`、`[1]`
///
/// 不支持通配与递归下降，路径不存在时返回 None。
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return Some(value);
    }
    let rest = if path.starts_with('[') {
        path.to_string()
    } else {
        format!(".{}", path)
    };
    let segments = parse_segments(&rest)?;
    if segments
        .iter()
        .any(|s| matches!(s, Segment::Wildcard | Segment::Descend(_)))
    {
        return None;
    }
    apply(value, &segments).into_iter().next()
}

/// 将 JSON 值渲染为可拼接的文本
///
/// 字符串输出原始内容（不带引号），其余类型输出 JSON 文本。
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn apply<'a>(root: &'a Value, segments: &[Segment]) -> Vec<&'a Value> {
    let mut current = vec![root];

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match segment {
                Segment::Field(name) => {
                    if let Some(v) = value.get(name.as_str()) {
                        next.push(v);
                    }
                }
                Segment::Index(index) => {
                    if let Some(v) = index_array(value, *index) {
                        next.push(v);
                    }
                }
                Segment::Wildcard => push_children(value, &mut next),
                Segment::Descend(name) => {
                    let mut all = Vec::new();
                    collect_descendants(value, &mut all);
                    for candidate in all {
                        match name {
                            Some(name) => {
                                if let Some(v) = candidate.as_object().and_then(|o| o.get(name))
                                {
                                    next.push(v);
                                }
                            }
                            None => push_children(candidate, &mut next),
                        }
                    }
                }
            }
        }
        current = next;
    }

    current
}

fn index_array(value: &Value, index: i64) -> Option<&Value> {
    let items = value.as_array()?;
    let resolved = if index < 0 {
        items.len().checked_sub(index.unsigned_abs() as usize)?
    } else {
        index as usize
    };
    items.get(resolved)
}

fn push_children<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => out.extend(items.iter()),
        Value::Object(map) => out.extend(map.values()),
        _ => {}
    }
}

fn collect_descendants<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(value);
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_descendants(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_descendants(v, out)),
        _ => {}
    }
}

/// 解析 `$` 之后的部分
fn parse_segments(input: &str) -> Option<Vec<Segment>> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                if chars.get(i + 1) == Some(&'.') {
                    i += 2;
                    if chars.get(i) == Some(&'*') {
                        segments.push(Segment::Descend(None));
                        i += 1;
                    } else {
                        let (name, next) = read_name(&chars, i);
                        if name.is_empty() {
                            return None;
                        }
                        segments.push(Segment::Descend(Some(name)));
                        i = next;
                    }
                } else if chars.get(i + 1) == Some(&'*') {
                    segments.push(Segment::Wildcard);
                    i += 2;
                } else {
                    let (name, next) = read_name(&chars, i + 1);
                    if name.is_empty() {
                        return None;
                    }
                    segments.push(Segment::Field(name));
                    i = next;
                }
            }
            '[' => {
                let close = chars[i..].iter().position(|&c| c == ']')? + i;
                let inner: String = chars[i + 1..close].iter().collect();
                segments.push(parse_bracket(inner.trim())?);
                i = close + 1;
            }
            _ => return None,
        }
    }

    Some(segments)
}

fn read_name(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    let quoted = (inner.starts_with('\'') && inner.ends_with('\''))
        || (inner.starts_with('"') && inner.ends_with('"'));
    if quoted && inner.len() >= 2 {
        return Some(Segment::Field(inner[1..inner.len() - 1].to_string()));
    }
    inner.parse::<i64>().ok().map(Segment::Index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "data": {
                "token": "abc",
                "items": [
                    {"id": 1, "name": "first"},
                    {"id": 2, "name": "second"}
                ]
            },
            "meta.key": true
        })
    }

    #[test]
    fn test_first_simple_field() {
        let value = sample();
        assert_eq!(first(&value, "$.data.token"), Some(&json!("abc")));
    }

    #[test]
    fn test_array_index_and_negative_index() {
        let value = sample();
        assert_eq!(first(&value, "$.data.items[0].id"), Some(&json!(1)));
        assert_eq!(first(&value, "$.data.items[-1].name"), Some(&json!("second")));
        assert_eq!(first(&value, "$.data.items[5]"), None);
    }

    #[test]
    fn test_wildcard_and_descend() {
        let value = sample();
        let ids = select(&value, "$.data.items[*].id").unwrap();
        assert_eq!(ids, vec![&json!(1), &json!(2)]);

        let names = select(&value, "$..name").unwrap();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_quoted_field() {
        let value = sample();
        assert_eq!(first(&value, "$['meta.key']"), Some(&json!(true)));
    }

    #[test]
    fn test_invalid_expression() {
        let value = sample();
        assert!(select(&value, "data.token").is_none());
        assert!(select(&value, "$.data[").is_none());
    }

    #[test]
    fn test_root_only() {
        let value = json!([1, 2]);
        assert_eq!(first(&value, "$"), Some(&value));
    }

    #[test]
    fn test_lookup_plain_path() {
        let value = sample();
        assert_eq!(lookup(&value, "data.items[1].id"), Some(&json!(2)));
        assert_eq!(lookup(&value, "data.missing"), None);
        assert_eq!(lookup(&json!([10, 20]), "[1]"), Some(&json!(20)));
        assert_eq!(lookup(&value, "data.items[*]"), None);
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&json!("text")), "text");
        assert_eq!(render(&json!(42)), "42");
        assert_eq!(render(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(render(&Value::Null), "null");
    }
}
