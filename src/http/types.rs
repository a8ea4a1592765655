use std::fmt;
use std::str::FromStr;

use crate::{RestflowError, Result};
use serde::{Deserialize, Serialize};

/// 请求行中允许出现的 HTTP 方法（大小写敏感）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
}

impl FromStr for Method {
    type Err = RestflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "CONNECT" => Ok(Method::Connect),
            "TRACE" => Ok(Method::Trace),
            _ => Err(RestflowError::ParseError(format!(
                "Invalid HTTP method: {}",
                s
            ))),
        }
    }
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Connect => reqwest::Method::CONNECT,
            Method::Trace => reqwest::Method::TRACE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 默认 host，当目标中未指定 host 时使用
const DEFAULT_HOST: &str = "localhost";
/// 默认 scheme，当目标中未指定 scheme 时使用
const DEFAULT_SCHEME: &str = "http";

/// 补全简写的请求目标并解析为 URL
///
/// - `:3000/path` → `http://localhost:3000/path`
/// - `example.com/api` → `http://example.com/api`
/// - `https://:8080` → `https://localhost:8080`
pub fn parse_target(target: &str) -> Result<url::Url> {
    let input = target.trim();
    if input.is_empty() {
        return Err(RestflowError::InvalidUrl("empty target".to_string()));
    }

    let normalized = if input.starts_with(':') {
        format!("{}://{}{}", DEFAULT_SCHEME, DEFAULT_HOST, input)
    } else if let Some(pos) = input.find("://") {
        let after_scheme = &input[pos + 3..];
        if after_scheme.starts_with(':') {
            format!("{}://{}{}", &input[..pos], DEFAULT_HOST, after_scheme)
        } else {
            input.to_string()
        }
    } else {
        format!("{}://{}", DEFAULT_SCHEME, input)
    };

    url::Url::parse(&normalized)
        .map_err(|e| RestflowError::InvalidUrl(format!("{}: {}", target.trim(), e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(u16);

impl Status {
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Self(code))
        } else {
            Err(RestflowError::ParseError(format!(
                "Invalid HTTP status code: {}",
                code
            )))
        }
    }

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.0)
    }

    pub fn is_client_error(&self) -> bool {
        (400..=499).contains(&self.0)
    }

    pub fn is_server_error(&self) -> bool {
        (500..=599).contains(&self.0)
    }

    /// 标准原因短语，未知状态码返回空串
    pub fn reason_phrase(&self) -> &'static str {
        reqwest::StatusCode::from_u16(self.0)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_case_sensitive() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("TRACE".parse::<Method>().unwrap(), Method::Trace);
        assert!("get".parse::<Method>().is_err());
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn test_method_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Method::Patch).unwrap(), "\"PATCH\"");
    }

    #[test]
    fn test_parse_full_target() {
        let url = parse_target("https://api.example.com:8443/v1/users?id=1").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("api.example.com"));
        assert_eq!(url.port(), Some(8443));
        assert_eq!(url.query(), Some("id=1"));
    }

    #[test]
    fn test_parse_target_shorthands() {
        assert_eq!(
            parse_target(":8080/path").unwrap().as_str(),
            "http://localhost:8080/path"
        );
        assert_eq!(
            parse_target("example.com/api/users").unwrap().as_str(),
            "http://example.com/api/users"
        );
        assert_eq!(
            parse_target("https://:8443").unwrap().as_str(),
            "https://localhost:8443/"
        );
    }

    #[test]
    fn test_parse_target_rejects_empty() {
        assert!(parse_target("").is_err());
        assert!(parse_target("   ").is_err());
    }

    #[test]
    fn test_status() {
        let status = Status::new(404).unwrap();
        assert!(status.is_client_error());
        assert_eq!(status.reason_phrase(), "Not Found");
        assert!(Status::new(99).is_err());
        assert_eq!(Status::new(599).unwrap().reason_phrase(), "");
    }
}
