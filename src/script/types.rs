use serde::Serialize;
use std::collections::BTreeMap;

/// `client.test(name, fn)` 的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubTestResult {
    pub name: String,
    pub passed: bool,
    /// 失败原因
    pub detail: Option<String>,
}

/// 一次脚本调用的结果
///
/// 子测试失败不会让调用失败；只有语法错误、未捕获异常、超时
/// 或访问不存在的能力时 `success` 才为 false。
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SandboxExecutionResult {
    pub success: bool,
    /// `client.log` 的输出，按调用顺序
    pub logs: Vec<String>,
    pub tests: Vec<SubTestResult>,
    pub failure: Option<String>,
    /// `request.variables.set` 的写入，仅请求前脚本成功时非空
    pub variable_writes: BTreeMap<String, String>,
}

impl SandboxExecutionResult {
    pub(crate) fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            failure: Some(detail.into()),
            ..Self::default()
        }
    }

    pub fn failed_tests(&self) -> impl Iterator<Item = &SubTestResult> {
        self.tests.iter().filter(|t| !t.passed)
    }

    /// 调用成功且所有子测试通过
    pub fn all_passed(&self) -> bool {
        self.success && self.tests.iter().all(|t| t.passed)
    }
}

/// `client.global` 背后的存储，由调用方持有，跨调用保留
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptGlobals {
    values: BTreeMap<String, String>,
}

impl ScriptGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
