use crate::Result;
use crate::RestflowError;
use crate::assertion::evaluate_lines;
use crate::http::{Client, Method, Request, Transport};
use crate::parser::{ParsedFile, RequestBody, RequestUnit, ScriptPhase, ScriptReference};
use crate::runner::types::{ScriptReport, TestResult};
use crate::script::{SandboxExecutionResult, ScriptGlobals, ScriptSandbox, load_source};
use crate::utils::jsonpath;
use crate::variable::{NamedResponseRecord, VariableState};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 按顺序执行文件中的请求
///
/// 变量状态与脚本全局存储由执行器持有，跨请求保留。
pub struct TestExecutor<T: Transport = Client> {
    transport: T,
    sandbox: ScriptSandbox,
    globals: ScriptGlobals,
    state: VariableState,
}

impl TestExecutor<Client> {
    pub fn new(state: VariableState) -> Result<Self> {
        Ok(Self::with_transport(Client::new()?, state))
    }
}

impl<T: Transport> TestExecutor<T> {
    pub fn with_transport(transport: T, state: VariableState) -> Self {
        Self {
            transport,
            sandbox: ScriptSandbox::default(),
            globals: ScriptGlobals::new(),
            state,
        }
    }

    pub fn with_sandbox(mut self, sandbox: ScriptSandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn state(&self) -> &VariableState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut VariableState {
        &mut self.state
    }

    pub fn globals(&self) -> &ScriptGlobals {
        &self.globals
    }

    /// 批量执行所有请求
    pub async fn execute_all(&mut self, parsed_file: &ParsedFile) -> Vec<TestResult> {
        let base_dir = parsed_file.base_dir();
        let mut results = Vec::with_capacity(parsed_file.units.len());

        for (index, unit) in parsed_file.units.iter().enumerate() {
            let request_number = index + 1;
            info!("[{}] {}", request_number, display_name(unit));
            let result = self.execute_one(unit, request_number, base_dir).await;
            results.push(result);
        }

        results
    }

    /// 执行单个请求
    pub async fn execute_one(
        &mut self,
        unit: &RequestUnit,
        request_number: usize,
        base_dir: Option<&Path>,
    ) -> TestResult {
        let name = (!unit.name.is_empty()).then(|| unit.name.clone());

        let Some(method) = unit.method else {
            debug!("Section {} has no request line, skipping", request_number);
            return TestResult::skipped(request_number, name, unit.target.clone());
        };

        let start = Instant::now();
        let mut scripts = Vec::new();

        // 1. 请求前脚本
        for reference in unit.scripts(ScriptPhase::PreRequest) {
            let report = self.run_pre_script(reference, base_dir);
            let failed = !report.result.success;
            scripts.push(report);
            if failed {
                let url = self.state.substitute(&unit.target);
                return TestResult::error(
                    request_number,
                    name,
                    method.to_string(),
                    url,
                    "Pre-request script failed".to_string(),
                    start.elapsed(),
                )
                .with_scripts(scripts);
            }
        }

        // 2. 解析占位符并构建请求
        let url = self.state.substitute(&unit.target);
        let request = match self.build_request(unit, method, &url, base_dir) {
            Ok(request) => request,
            Err(e) => {
                return TestResult::error(
                    request_number,
                    name,
                    method.to_string(),
                    url,
                    format!("Failed to build request: {}", e),
                    start.elapsed(),
                )
                .with_scripts(scripts);
            }
        };

        // 3. 发送
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                return TestResult::error(
                    request_number,
                    name,
                    method.to_string(),
                    url,
                    format!("Request failed: {}", e),
                    start.elapsed(),
                )
                .with_scripts(scripts);
            }
        };
        debug!(
            "{} {} -> {} ({}ms)",
            method,
            url,
            response.status.code(),
            response.duration.as_millis()
        );

        // 4. 记录命名响应
        let record = response.to_record();
        if let Some(id) = &unit.request_id {
            self.state.responses.record(id.clone(), record.clone());
        }

        // 5. 路径提取
        self.apply_extractions(unit, &record);

        // 6. 测试块
        let assertions = unit
            .tests
            .iter()
            .flat_map(|block| evaluate_lines(block.lines.iter().map(String::as_str), &response))
            .collect();

        // 7. 响应后脚本
        for reference in unit.scripts(ScriptPhase::PostResponse) {
            scripts.push(self.run_post_script(reference, base_dir, &record));
        }

        let mut result = TestResult::success(request_number, name, method.to_string(), url, response)
            .with_scripts(scripts);
        result.assertions = assertions;
        result.finalize()
    }

    fn run_pre_script(
        &mut self,
        reference: &ScriptReference,
        base_dir: Option<&Path>,
    ) -> ScriptReport {
        let result = match load_source(reference, base_dir) {
            Ok(source) => {
                let variables: BTreeMap<String, String> = self.state.snapshot().into_iter().collect();
                let result = self
                    .sandbox
                    .run_pre_request(&source, &mut self.globals, &variables);
                for (key, value) in &result.variable_writes {
                    self.state.store.set(key.clone(), value.clone());
                }
                result
            }
            Err(e) => {
                warn!("{}", e);
                SandboxExecutionResult::failed(e.to_string())
            }
        };
        ScriptReport::new(ScriptPhase::PreRequest, result)
    }

    fn run_post_script(
        &mut self,
        reference: &ScriptReference,
        base_dir: Option<&Path>,
        record: &NamedResponseRecord,
    ) -> ScriptReport {
        let result = match load_source(reference, base_dir) {
            Ok(source) => self
                .sandbox
                .run_post_response(&source, &mut self.globals, record),
            Err(e) => {
                warn!("{}", e);
                SandboxExecutionResult::failed(e.to_string())
            }
        };
        ScriptReport::new(ScriptPhase::PostResponse, result)
    }

    fn build_request(
        &self,
        unit: &RequestUnit,
        method: Method,
        url: &str,
        base_dir: Option<&Path>,
    ) -> Result<Request> {
        let mut request = Request::new(method, url)?;

        for (key, value) in unit.headers.iter() {
            request = request.with_header(key, &self.state.substitute(value));
        }

        match &unit.body {
            RequestBody::None => {}
            RequestBody::Inline(text) => {
                request = request.with_body(self.state.substitute(text));
            }
            RequestBody::File(path) => {
                let full = match base_dir {
                    Some(dir) => dir.join(path),
                    None => Path::new(path).to_path_buf(),
                };
                let content = std::fs::read_to_string(&full).map_err(|e| {
                    RestflowError::Other(format!(
                        "Failed to read body file {}: {}",
                        full.display(),
                        e
                    ))
                })?;
                request = request.with_body(content);
            }
        }

        Ok(request)
    }

    /// `@key = $.path` 写入静态变量表
    fn apply_extractions(&mut self, unit: &RequestUnit, record: &NamedResponseRecord) {
        for (key, path) in unit.path_extractions() {
            let value = record
                .body
                .as_json()
                .and_then(|json| jsonpath::first(json, path));
            match value {
                Some(value) => {
                    let rendered = jsonpath::render(value);
                    debug!("Extracted {} = {}", key, rendered);
                    self.state.store.set(key, rendered);
                }
                None => warn!("Path '{}' for '{}' matched nothing in the response", path, key),
            }
        }
    }
}

fn display_name(unit: &RequestUnit) -> String {
    match unit.method {
        Some(method) if unit.name.is_empty() => format!("{} {}", method, unit.target),
        Some(method) => format!("{} ({} {})", unit.name, method, unit.target),
        None => unit.name.clone(),
    }
}

/// 不发起网络请求的传输层，供测试使用
#[cfg(test)]
pub(crate) struct StaticTransport {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub sent: std::sync::Mutex<Vec<Request>>,
}

#[cfg(test)]
impl Transport for StaticTransport {
    async fn send(&self, request: Request) -> Result<crate::http::Response> {
        self.sent.lock().unwrap().push(request);
        crate::http::Response::new(
            self.status,
            self.headers.clone(),
            self.body.clone(),
            std::time::Duration::from_millis(5),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_content;

    fn transport(body: &str) -> StaticTransport {
        StaticTransport {
            status: 200,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string(),
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_extraction_feeds_next_request() {
        let mut state = VariableState::new();
        let parsed = parse_content(
            "### login\n@token = $.token\nPOST http://localhost/login\n\n###\nGET http://localhost/me\nAuthorization: Bearer {{token}}\n",
            &mut state,
        );

        let mut executor = TestExecutor::with_transport(transport(r#"{"token":"abc"}"#), state);
        let results = executor.execute_all(&parsed).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        let sent = executor.transport.sent.lock().unwrap();
        assert_eq!(
            sent[1].headers,
            vec![("Authorization".to_string(), "Bearer abc".to_string())]
        );
    }

    #[tokio::test]
    async fn test_pre_script_variables_and_named_response() {
        let mut state = VariableState::new();
        let parsed = parse_content(
            "###\n@name first\nGET http://localhost/a\n\n###\n< {%\nrequest.variables.set('who', 'ann');\n%}\nPOST http://localhost/b?s={{first.response.status}}\n\n{\"who\": \"{{who}}\"}\n",
            &mut state,
        );

        let mut executor = TestExecutor::with_transport(transport("{}"), state);
        let results = executor.execute_all(&parsed).await;

        assert!(results[1].scripts[0].result.success);
        let sent = executor.transport.sent.lock().unwrap();
        assert_eq!(sent[1].url.as_str(), "http://localhost/b?s=200");
        assert_eq!(sent[1].body.as_deref(), Some(r#"{"who": "ann"}"#));
        assert!(executor.state().responses.get("first").is_some());
    }

    #[tokio::test]
    async fn test_failed_pre_script_skips_send() {
        let mut state = VariableState::new();
        let parsed = parse_content(
            "###\n< {%\nrequire('fs');\n%}\nGET http://localhost/a\n",
            &mut state,
        );

        let mut executor = TestExecutor::with_transport(transport("{}"), state);
        let results = executor.execute_all(&parsed).await;

        assert!(!results[0].success);
        assert!(results[0].error.is_some());
        assert!(executor.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_assertions_and_post_script() {
        let mut state = VariableState::new();
        let parsed = parse_content(
            "###\nGET http://localhost/a\n\n> {%\nclient.global.set('seen', String(response.body.id));\nclient.test('id', () => client.assert(response.body.id === 3));\n%}\n\n#### checks\nstatus == 200\nbody.id == 4\n",
            &mut state,
        );

        let mut executor = TestExecutor::with_transport(transport(r#"{"id": 3}"#), state);
        let results = executor.execute_all(&parsed).await;

        let result = &results[0];
        assert_eq!(result.assertions.len(), 2);
        assert!(result.assertions[0].passed);
        assert!(!result.assertions[1].passed);
        assert!(result.scripts[0].result.all_passed());
        assert!(!result.success);
        assert_eq!(executor.globals().get("seen"), Some("3"));
    }
}
