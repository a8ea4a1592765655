//! 请求行与 header 行的识别和拆分

use crate::http::Method;

/// 解析出的请求行
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
}

/// `<VERB> <target> [HTTP/x.y]`，动词大小写敏感
///
/// 不是请求行时返回 None。
pub fn parse_request_line(line: &str) -> Option<RequestLine> {
    let mut tokens = line.split_whitespace();
    let method = tokens.next()?.parse::<Method>().ok()?;
    let target = tokens.next()?.trim().to_string();
    Some(RequestLine { method, target })
}

pub fn is_request_line(line: &str) -> bool {
    parse_request_line(line).is_some()
}

/// 含冒号、不是请求行、也不以 `@` 开头
pub fn is_header_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.contains(':') && !trimmed.starts_with('@') && !is_request_line(trimmed)
}

/// 在第一个冒号处拆分，键为空时返回 None
pub fn parse_header(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

/// 紧跟请求行的 `?a=1` / `&b=2` 查询续行
pub fn is_query_continuation(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('?') || trimmed.starts_with('&')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line() {
        let line = parse_request_line("GET http://h/p").unwrap();
        assert_eq!(line.method, Method::Get);
        assert_eq!(line.target, "http://h/p");
    }

    #[test]
    fn test_request_line_discards_version() {
        let line = parse_request_line("POST   {{base}}/users   HTTP/1.1").unwrap();
        assert_eq!(line.method, Method::Post);
        assert_eq!(line.target, "{{base}}/users");
    }

    #[test]
    fn test_lowercase_verb_is_not_a_request_line() {
        assert!(parse_request_line("get http://h/p").is_none());
        assert!(parse_request_line("Get http://h/p").is_none());
    }

    #[test]
    fn test_verb_without_target() {
        assert!(parse_request_line("GET").is_none());
        assert!(parse_request_line("").is_none());
    }

    #[test]
    fn test_header_split_on_first_colon() {
        assert_eq!(
            parse_header("Location: http://h:8080/p"),
            Some(("Location", "http://h:8080/p"))
        );
        assert_eq!(parse_header("X-Empty:"), Some(("X-Empty", "")));
        assert_eq!(parse_header(": value"), None);
    }

    #[test]
    fn test_header_classification() {
        assert!(is_header_line("Content-Type: application/json"));
        assert!(!is_header_line("GET http://h:8080/p"));
        assert!(!is_header_line("@host = http://h:1"));
        assert!(!is_header_line("no colon here"));
    }

    #[test]
    fn test_query_continuation() {
        assert!(is_query_continuation("  ?page=1"));
        assert!(is_query_continuation("&size=10"));
        assert!(!is_query_continuation("page=1"));
    }
}
