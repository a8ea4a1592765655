use crate::http::Method;
use serde::Serialize;
use std::path::PathBuf;

/// 有序的 header 列表：保留原始大小写与顺序，按名称查找时大小写不敏感
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// 第一个同名 header 的值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (String, String)> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 请求体：无 / 内联文本 / 外部文件引用，三者互斥
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RequestBody {
    #[default]
    None,
    Inline(String),
    /// 相对于 .http 文件的路径
    File(String),
}

impl RequestBody {
    pub fn is_none(&self) -> bool {
        matches!(self, RequestBody::None)
    }
}

/// 脚本引用
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScriptReference {
    /// 块内捕获的源码，可以为空
    Inline(String),
    /// 非空相对路径
    File(String),
}

/// 脚本执行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptPhase {
    /// `< {% %}`，请求发出前
    PreRequest,
    /// `> {% %}`，收到响应后
    PostResponse,
}

/// 变量指令
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableDirective {
    /// `@name <id>`
    NameBinding { request_id: String },
    /// `@key = value`，编译时已写入变量表
    StaticAssignment { key: String, value: String },
    /// `@key = $.path`，响应到达后再求值
    PathExtraction { key: String, path: String },
}

/// `####` 之后的测试块，内容交给断言模块解释
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TestBlock {
    pub title: String,
    pub lines: Vec<String>,
}

/// 编译后的单个请求
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RequestUnit {
    /// `###` 之后的显示名称
    pub name: String,

    /// 未找到请求行时为 None
    pub method: Option<Method>,

    /// 可能仍包含运行期才能解析的占位符
    pub target: String,

    pub headers: HeaderList,

    pub body: RequestBody,

    /// `@name` 绑定的请求 ID
    pub request_id: Option<String>,

    pub pre_scripts: Vec<ScriptReference>,

    pub post_scripts: Vec<ScriptReference>,

    pub directives: Vec<VariableDirective>,

    pub tests: Vec<TestBlock>,
}

impl RequestUnit {
    /// 没有请求行的单元
    pub fn is_empty(&self) -> bool {
        self.method.is_none()
    }

    /// 需要在响应到达后求值的路径提取指令
    pub fn path_extractions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.directives.iter().filter_map(|d| match d {
            VariableDirective::PathExtraction { key, path } => Some((key.as_str(), path.as_str())),
            _ => None,
        })
    }

    pub fn scripts(&self, phase: ScriptPhase) -> &[ScriptReference] {
        match phase {
            ScriptPhase::PreRequest => &self.pre_scripts,
            ScriptPhase::PostResponse => &self.post_scripts,
        }
    }
}

/// 诊断类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// `@` 行缺少 `=`，或键为空
    InvalidDirective,
    /// 多行脚本块没有闭合
    UnterminatedScript,
    /// 段落中没有请求行
    MissingRequestLine,
    /// 全局段落中无法识别的行
    IgnoredLine,
}

/// 可恢复的解析问题，不会中断整个文件的编译
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// 段落序号（从 0 开始）
    pub section: usize,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(section: usize, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            section,
            kind,
            message: message.into(),
        }
    }
}

/// 整个文件的编译结果
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParsedFile {
    pub units: Vec<RequestUnit>,

    pub diagnostics: Vec<Diagnostic>,

    /// 源文件路径（用于定位脚本与请求体文件）
    pub source_path: Option<PathBuf>,
}

impl ParsedFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_path(mut self, path: PathBuf) -> Self {
        self.source_path = Some(path);
        self
    }

    /// 源文件所在目录，相对路径以此为基准
    pub fn base_dir(&self) -> Option<&std::path::Path> {
        self.source_path.as_deref().and_then(|p| p.parent())
    }
}

/// 解析错误类型，只有无法读取文件时才会出现
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 解析结果类型别名
pub type ParseResult<T> = Result<T, ParseError>;
