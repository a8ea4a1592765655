//! `@` 变量指令解析

use crate::parser::types::VariableDirective;
use thiserror::Error;

/// 路径提取的前缀
pub const PATH_MARKER: &str = "$.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectiveError {
    #[error("directive '{0}' has no '=' assignment")]
    MissingAssignment(String),

    #[error("directive '{0}' has an empty key")]
    EmptyKey(String),

    #[error("@name directive without a request id")]
    EmptyName,
}

pub fn is_directive(line: &str) -> bool {
    line.trim_start().starts_with('@')
}

/// 解析一行指令；不是指令行时返回 None
///
/// - `@name <id>`（大小写不敏感）→ 名称绑定
/// - `@key = $.path` → 路径提取
/// - `@key = value` → 静态赋值（值原样返回，由调用方解析变量）
pub fn parse_directive(line: &str) -> Option<Result<VariableDirective, DirectiveError>> {
    let rest = line.trim_start().strip_prefix('@')?.trim();
    Some(parse_body(rest))
}

fn parse_body(rest: &str) -> Result<VariableDirective, DirectiveError> {
    if let Some(id) = strip_name_keyword(rest) {
        let id = id.trim_start().trim_start_matches('=').trim();
        if id.is_empty() {
            return Err(DirectiveError::EmptyName);
        }
        return Ok(VariableDirective::NameBinding {
            request_id: id.to_string(),
        });
    }

    let (key, value) = rest
        .split_once('=')
        .ok_or_else(|| DirectiveError::MissingAssignment(rest.to_string()))?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return Err(DirectiveError::EmptyKey(rest.to_string()));
    }

    if value.starts_with(PATH_MARKER) {
        Ok(VariableDirective::PathExtraction {
            key: key.to_string(),
            path: value.to_string(),
        })
    } else {
        Ok(VariableDirective::StaticAssignment {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// `name ` 前缀（大小写不敏感），返回其后的内容
fn strip_name_keyword(rest: &str) -> Option<&str> {
    let head = rest.get(..5)?;
    head.eq_ignore_ascii_case("name ").then(|| &rest[5..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_binding() {
        assert_eq!(
            parse_directive("@name login"),
            Some(Ok(VariableDirective::NameBinding {
                request_id: "login".to_string()
            }))
        );
        assert_eq!(
            parse_directive("  @NAME   = createUser"),
            Some(Ok(VariableDirective::NameBinding {
                request_id: "createUser".to_string()
            }))
        );
    }

    #[test]
    fn test_name_binding_with_equals() {
        assert_eq!(
            parse_directive("@name = login"),
            Some(Ok(VariableDirective::NameBinding {
                request_id: "login".to_string()
            }))
        );
    }

    #[test]
    fn test_static_assignment() {
        assert_eq!(
            parse_directive("@base_url = http://localhost:8080?a=b"),
            Some(Ok(VariableDirective::StaticAssignment {
                key: "base_url".to_string(),
                value: "http://localhost:8080?a=b".to_string(),
            }))
        );
    }

    #[test]
    fn test_path_extraction() {
        assert_eq!(
            parse_directive("@token = $.data.token"),
            Some(Ok(VariableDirective::PathExtraction {
                key: "token".to_string(),
                path: "$.data.token".to_string(),
            }))
        );
    }

    #[test]
    fn test_invalid_directives() {
        assert_eq!(
            parse_directive("@skip"),
            Some(Err(DirectiveError::MissingAssignment("skip".to_string())))
        );
        assert_eq!(
            parse_directive("@ = value"),
            Some(Err(DirectiveError::EmptyKey("= value".to_string())))
        );
        assert_eq!(
            parse_directive("@name ="),
            Some(Err(DirectiveError::EmptyName))
        );
    }

    #[test]
    fn test_not_a_directive() {
        assert_eq!(parse_directive("GET http://a"), None);
        assert!(!is_directive("Authorization: Bearer x"));
        assert!(is_directive("   @x = 1"));
    }

    #[test]
    fn test_name_with_multibyte_prefix() {
        assert_eq!(
            parse_directive("@名字 = 值"),
            Some(Ok(VariableDirective::StaticAssignment {
                key: "名字".to_string(),
                value: "值".to_string(),
            }))
        );
    }
}
