use crate::assertion::AssertionResult;
use crate::http::Response;
use crate::parser::ScriptPhase;
use crate::script::SandboxExecutionResult;
use std::time::Duration;

/// 一次脚本调用的记录
#[derive(Debug, Clone)]
pub struct ScriptReport {
    pub phase: ScriptPhase,
    pub result: SandboxExecutionResult,
}

impl ScriptReport {
    pub fn new(phase: ScriptPhase, result: SandboxExecutionResult) -> Self {
        Self { phase, result }
    }
}

/// 单个请求的执行结果
#[derive(Debug, Clone)]
pub struct TestResult {
    /// 请求序号（从 1 开始）
    pub request_number: usize,

    /// `###` 之后的名称
    pub name: Option<String>,

    pub method: String,

    /// 解析后的请求 URL
    pub url: String,

    /// 响应状态码（如果收到响应）
    pub status: Option<u16>,

    pub duration: Duration,

    pub success: bool,

    /// 构建请求、读取文件或网络错误
    pub error: Option<String>,

    /// 完整的 HTTP 响应（用于详细输出）
    pub response: Option<Response>,

    /// 没有请求行的片段
    pub skipped: bool,

    /// 测试块中的断言结果
    pub assertions: Vec<AssertionResult>,

    /// 请求前与响应后脚本的结果，按执行顺序
    pub scripts: Vec<ScriptReport>,
}

impl TestResult {
    pub fn success(
        request_number: usize,
        name: Option<String>,
        method: String,
        url: String,
        response: Response,
    ) -> Self {
        Self {
            request_number,
            name,
            method,
            url,
            status: Some(response.status.code()),
            duration: response.duration,
            success: response.is_success(),
            error: None,
            response: Some(response),
            skipped: false,
            assertions: Vec::new(),
            scripts: Vec::new(),
        }
    }

    pub fn error(
        request_number: usize,
        name: Option<String>,
        method: String,
        url: String,
        error: String,
        duration: Duration,
    ) -> Self {
        Self {
            request_number,
            name,
            method,
            url,
            status: None,
            duration,
            success: false,
            error: Some(error),
            response: None,
            skipped: false,
            assertions: Vec::new(),
            scripts: Vec::new(),
        }
    }

    pub fn skipped(request_number: usize, name: Option<String>, url: String) -> Self {
        Self {
            request_number,
            name,
            method: String::new(),
            url,
            status: None,
            duration: Duration::ZERO,
            success: true, // 跳过的片段算作成功
            error: None,
            response: None,
            skipped: true,
            assertions: Vec::new(),
            scripts: Vec::new(),
        }
    }

    pub fn with_scripts(mut self, scripts: Vec<ScriptReport>) -> Self {
        self.scripts = scripts;
        self
    }

    /// 写入断言与脚本结果后重新计算成功标记
    ///
    /// 有断言或脚本子测试时由它们决定结果，否则看状态码。
    pub(crate) fn finalize(mut self) -> Self {
        if self.error.is_some() {
            self.success = false;
            return self;
        }

        let scripts_ok = self.scripts.iter().all(|s| s.result.all_passed());
        let assertions_ok = self.assertions.iter().all(|a| a.passed);
        let has_checks =
            !self.assertions.is_empty() || self.scripts.iter().any(|s| !s.result.tests.is_empty());
        let status_ok = self.response.as_ref().is_some_and(Response::is_success);

        self.success = scripts_ok && assertions_ok && (has_checks || status_ok);
        self
    }

    /// 所有脚本的 `client.log` 输出
    pub fn logs(&self) -> impl Iterator<Item = &str> {
        self.scripts
            .iter()
            .flat_map(|s| s.result.logs.iter().map(String::as_str))
    }
}

/// 测试摘要
#[derive(Debug, Clone)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration: Duration,
    pub total_assertions: usize,
    pub passed_assertions: usize,
    pub failed_assertions: usize,
    /// `client.test` 子测试
    pub total_script_tests: usize,
    pub failed_script_tests: usize,
}

impl TestSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let passed = results.iter().filter(|r| r.success && !r.skipped).count();
        let skipped = results.iter().filter(|r| r.skipped).count();
        let total_duration = results.iter().map(|r| r.duration).sum();

        let assertions = || results.iter().flat_map(|r| &r.assertions);
        let total_assertions = assertions().count();
        let passed_assertions = assertions().filter(|a| a.passed).count();

        let script_tests = || {
            results
                .iter()
                .flat_map(|r| &r.scripts)
                .flat_map(|s| &s.result.tests)
        };
        let total_script_tests = script_tests().count();
        let failed_script_tests = script_tests().filter(|t| !t.passed).count();

        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed - skipped,
            skipped,
            total_duration,
            total_assertions,
            passed_assertions,
            failed_assertions: total_assertions - passed_assertions,
            total_script_tests,
            failed_script_tests,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
