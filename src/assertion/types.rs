use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum AssertError {
    #[error("Invalid assertion syntax: {0}")]
    InvalidSyntax(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Value extraction failed: {0}")]
    ExtractionError(String),
}

/// 测试块中的一行断言
#[derive(Debug, Clone, PartialEq)]
pub enum AssertExpr {
    /// `<path> <op> <value>`
    Compare {
        left: ValuePath,
        op: CompareOp,
        right: AssertValue,
    },
    /// `<path> exists`
    Exists { path: ValuePath },
}

impl fmt::Display for AssertExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertExpr::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            AssertExpr::Exists { path } => write!(f, "{} exists", path),
        }
    }
}

/// 断言左侧引用的响应部位
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePath {
    Status,
    /// 名称大小写不敏感
    Header(String),
    /// `$.` 开头为 JSONPath，否则为点号路径；空串表示整个 body
    Body(String),
    /// 毫秒
    ResponseTime,
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuePath::Status => f.write_str("status"),
            ValuePath::Header(name) => write!(f, "headers.{}", name),
            ValuePath::Body(path) if path.is_empty() => f.write_str("body"),
            ValuePath::Body(path) => write!(f, "body.{}", path),
            ValuePath::ResponseTime => f.write_str("response.time"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
}

impl FromStr for CompareOp {
    type Err = AssertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            ">" => Self::Greater,
            "<" => Self::Less,
            ">=" => Self::GreaterOrEqual,
            "<=" => Self::LessOrEqual,
            "contains" => Self::Contains,
            other => return Err(AssertError::InvalidOperator(other.to_string())),
        })
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Contains => "contains",
        })
    }
}

impl CompareOp {
    /// 用实际值对期望值求值
    ///
    /// 相等判断不要求类型一致，类型不同即不相等；
    /// 大小比较只接受数字（含数字形式的字符串），`contains` 只接受字符串。
    pub fn apply(self, actual: &AssertValue, expected: &AssertValue) -> Result<bool, AssertError> {
        match self {
            Self::Equal => Ok(actual.matches(expected)),
            Self::NotEqual => Ok(!actual.matches(expected)),
            Self::Contains => match actual {
                AssertValue::String(text) => Ok(text.contains(&expected.as_text())),
                other => Err(AssertError::TypeMismatch {
                    expected: "string".to_string(),
                    actual: other.kind().to_string(),
                }),
            },
            _ => {
                let ordering = actual.order(expected)?;
                Ok(match self {
                    Self::Greater => ordering.is_gt(),
                    Self::Less => ordering.is_lt(),
                    Self::GreaterOrEqual => ordering.is_ge(),
                    _ => ordering.is_le(),
                })
            }
        }
    }
}

/// 断言两侧的标量值
#[derive(Debug, Clone, PartialEq)]
pub enum AssertValue {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
}

impl fmt::Display for AssertValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertValue::String(s) => write!(f, "\"{}\"", s),
            other => f.write_str(&other.as_text()),
        }
    }
}

impl AssertValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AssertValue::Number(_) => "number",
            AssertValue::String(_) => "string",
            AssertValue::Bool(_) => "boolean",
            AssertValue::Null => "null",
        }
    }

    /// 不带引号的文本形式
    pub fn as_text(&self) -> String {
        match self {
            AssertValue::Number(n) => n.to_string(),
            AssertValue::String(s) => s.clone(),
            AssertValue::Bool(b) => b.to_string(),
            AssertValue::Null => "null".to_string(),
        }
    }

    /// header 值总是字符串，数字形式的字符串也可以按数字比较
    fn as_number(&self) -> Option<f64> {
        match self {
            AssertValue::Number(n) => Some(*n),
            AssertValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn matches(&self, other: &AssertValue) -> bool {
        match (self, other) {
            (AssertValue::String(a), AssertValue::String(b)) => a == b,
            (AssertValue::Number(_), _) | (_, AssertValue::Number(_)) => {
                match (self.as_number(), other.as_number()) {
                    (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                    _ => false,
                }
            }
            _ => self == other,
        }
    }

    fn order(&self, other: &AssertValue) -> Result<Ordering, AssertError> {
        let mismatch = |value: &AssertValue| AssertError::TypeMismatch {
            expected: "number".to_string(),
            actual: value.kind().to_string(),
        };
        let a = self.as_number().ok_or_else(|| mismatch(self))?;
        let b = other.as_number().ok_or_else(|| mismatch(other))?;
        a.partial_cmp(&b).ok_or_else(|| mismatch(other))
    }
}

/// 单行断言的结果
#[derive(Debug, Clone, Serialize)]
pub struct AssertionResult {
    /// 断言原文
    pub raw: String,
    pub passed: bool,
    /// 无法取值时为 None
    pub actual: Option<String>,
    pub expected: String,
    pub message: Option<String>,
}

impl AssertionResult {
    pub fn success(raw: String, actual: String, expected: String) -> Self {
        Self {
            raw,
            passed: true,
            actual: Some(actual),
            expected,
            message: None,
        }
    }

    pub fn failure(raw: String, actual: String, expected: String, message: String) -> Self {
        Self {
            raw,
            passed: false,
            actual: Some(actual),
            expected,
            message: Some(message),
        }
    }

    /// 解析失败或取值失败
    pub fn error(raw: String, error: AssertError) -> Self {
        Self {
            raw,
            passed: false,
            actual: None,
            expected: String::new(),
            message: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> AssertValue {
        AssertValue::Number(n)
    }

    fn text(s: &str) -> AssertValue {
        AssertValue::String(s.to_string())
    }

    #[test]
    fn test_operator_from_str() {
        assert_eq!(">=".parse::<CompareOp>().unwrap(), CompareOp::GreaterOrEqual);
        assert_eq!("contains".parse::<CompareOp>().unwrap(), CompareOp::Contains);
        assert!(matches!(
            "=~".parse::<CompareOp>(),
            Err(AssertError::InvalidOperator(_))
        ));
    }

    #[test]
    fn test_ordering_on_numbers() {
        assert!(CompareOp::Greater.apply(&num(10.0), &num(5.0)).unwrap());
        assert!(CompareOp::LessOrEqual.apply(&num(5.0), &num(5.0)).unwrap());
        assert!(!CompareOp::Less.apply(&num(5.0), &num(5.0)).unwrap());
    }

    /// 数字形式的 header 值可以做大小比较
    #[test]
    fn test_numeric_string_orders_as_number() {
        assert!(CompareOp::Greater.apply(&text("42"), &num(10.0)).unwrap());
        assert!(CompareOp::Equal.apply(&text("42"), &num(42.0)).unwrap());
        assert!(CompareOp::Greater.apply(&text("abc"), &num(1.0)).is_err());
    }

    #[test]
    fn test_equality_across_kinds_is_false() {
        assert!(!CompareOp::Equal.apply(&text("true"), &AssertValue::Bool(true)).unwrap());
        assert!(CompareOp::NotEqual.apply(&AssertValue::Null, &num(0.0)).unwrap());
        assert!(CompareOp::Equal.apply(&AssertValue::Null, &AssertValue::Null).unwrap());
    }

    #[test]
    fn test_contains() {
        assert!(CompareOp::Contains.apply(&text("hello world"), &text("world")).unwrap());
        assert!(CompareOp::Contains.apply(&text("code 200"), &num(200.0)).unwrap());
        assert!(CompareOp::Contains.apply(&num(200.0), &text("2")).is_err());
    }

    #[test]
    fn test_ordering_rejects_booleans() {
        let err = CompareOp::Less
            .apply(&AssertValue::Bool(true), &num(1.0))
            .unwrap_err();
        assert!(err.to_string().contains("boolean"));
    }

    #[test]
    fn test_expression_display() {
        let expr = AssertExpr::Compare {
            left: ValuePath::Body("$.items[0]".to_string()),
            op: CompareOp::Equal,
            right: text("a"),
        };
        assert_eq!(expr.to_string(), "body.$.items[0] == \"a\"");
        assert_eq!(
            AssertExpr::Exists {
                path: ValuePath::Header("etag".to_string())
            }
            .to_string(),
            "headers.etag exists"
        );
        assert_eq!(ValuePath::Body(String::new()).to_string(), "body");
        assert_eq!(ValuePath::ResponseTime.to_string(), "response.time");
    }
}
