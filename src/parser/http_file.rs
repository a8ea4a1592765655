use crate::parser::directive::{self, parse_directive};
use crate::parser::request_line::{
    is_header_line, is_query_continuation, parse_header, parse_request_line,
};
use crate::parser::script_block::{self, body_file_reference};
use crate::parser::sections::{self, Section, SectionKind, is_test_delimiter};
use crate::parser::test_block::{DefaultTestBlockParser, TestBlockParser};
use crate::parser::types::{
    Diagnostic, DiagnosticKind, ParseResult, ParsedFile, RequestBody, RequestUnit, ScriptPhase,
    VariableDirective,
};
use crate::variable::resolver::VariableState;
use std::path::Path;
use tracing::{debug, warn};

/// 请求区扫描状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    AwaitingMethod,
    /// `true` 表示还没有出现任何 header，允许查询续行
    InHeaders(bool),
    InBody,
}

/// HTTP 文件编译器
pub struct HttpFileParser {
    test_parser: Box<dyn TestBlockParser>,
}

impl Default for HttpFileParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFileParser {
    pub fn new() -> Self {
        Self {
            test_parser: Box::new(DefaultTestBlockParser),
        }
    }

    /// 替换测试区解析器
    pub fn with_test_parser(parser: impl TestBlockParser + 'static) -> Self {
        Self {
            test_parser: Box::new(parser),
        }
    }

    /// 从文件路径解析
    pub fn parse_file<P: AsRef<Path>>(
        &self,
        path: P,
        state: &mut VariableState,
    ) -> ParseResult<ParsedFile> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let parsed = self.parse_content(&content, state);
        Ok(parsed.with_source_path(path.as_ref().to_path_buf()))
    }

    /// 从字符串内容解析
    ///
    /// 静态赋值会立即写入 `state.store`，后续段落可以引用。
    /// 没有请求行的段落被丢弃并记录诊断，不会中断整个文件。
    pub fn parse_content(&self, content: &str, state: &mut VariableState) -> ParsedFile {
        let mut file = ParsedFile::new();

        for section in sections::split_sections(content) {
            match section.kind {
                SectionKind::Globals => {
                    Self::apply_globals(&section, state, &mut file.diagnostics);
                }
                SectionKind::Request => {
                    let unit = self.compile_section(&section, state, &mut file.diagnostics);
                    if unit.is_empty() {
                        file.diagnostics.push(Diagnostic::new(
                            section.index,
                            DiagnosticKind::MissingRequestLine,
                            format!("section '{}' has no request line", unit.name),
                        ));
                    } else {
                        file.units.push(unit);
                    }
                }
            }
        }

        for diagnostic in &file.diagnostics {
            warn!(
                "Section {}: {:?}: {}",
                diagnostic.section, diagnostic.kind, diagnostic.message
            );
        }
        debug!("Compiled {} request(s)", file.units.len());

        file
    }

    /// 编译单个请求段落
    pub fn compile_section(
        &self,
        section: &Section,
        state: &mut VariableState,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> RequestUnit {
        let mut unit = RequestUnit::default();
        let index = section.index;

        // 1. 名称
        let mut lines = section.text.lines().peekable();
        let first = lines.peek().copied().map(str::trim_start);
        if let Some(name) = first.and_then(|l| l.strip_prefix("###")) {
            unit.name = name.trim().to_string();
            lines.next();
        }
        let rest: Vec<&str> = lines.collect();

        // 2-3. 脚本
        let scan = script_block::scan(&rest.join("\n"));
        for block in scan.blocks {
            match block.phase {
                ScriptPhase::PreRequest => unit.pre_scripts.push(block.reference),
                ScriptPhase::PostResponse => unit.post_scripts.push(block.reference),
            }
        }
        for line in &scan.unterminated {
            diagnostics.push(Diagnostic::new(
                index,
                DiagnosticKind::UnterminatedScript,
                format!("script block opened at line {} is never closed", line + 1),
            ));
        }

        // 4. 请求区 / 测试区
        let clean: Vec<&str> = scan.remaining.lines().collect();
        let split = clean
            .iter()
            .position(|l| is_test_delimiter(l))
            .unwrap_or(clean.len());
        let (request_zone, test_zone) = clean.split_at(split);

        // 5. 请求区
        let mut body_lines: Vec<&str> = Vec::new();
        let mut scan_state = ScanState::AwaitingMethod;

        for &line in request_zone {
            let trimmed = line.trim();
            match scan_state {
                ScanState::AwaitingMethod => {
                    if trimmed.is_empty() {
                        continue;
                    }
                    if directive::is_directive(trimmed) {
                        Self::handle_directive(trimmed, index, &mut unit, state, diagnostics);
                    } else if let Some(request_line) = parse_request_line(trimmed) {
                        unit.method = Some(request_line.method);
                        unit.target = request_line.target;
                        scan_state = ScanState::InHeaders(true);
                    } else {
                        diagnostics.push(Diagnostic::new(
                            index,
                            DiagnosticKind::IgnoredLine,
                            format!("line before request line ignored: {}", trimmed),
                        ));
                    }
                }
                ScanState::InHeaders(first_header) => {
                    if trimmed.is_empty() {
                        scan_state = ScanState::InBody;
                    } else if directive::is_directive(trimmed) {
                        Self::handle_directive(trimmed, index, &mut unit, state, diagnostics);
                    } else if first_header && is_query_continuation(trimmed) {
                        unit.target.push_str(trimmed);
                    } else if is_header_line(trimmed) {
                        match parse_header(trimmed) {
                            Some((key, value)) => unit.headers.push(key, value),
                            None => diagnostics.push(Diagnostic::new(
                                index,
                                DiagnosticKind::IgnoredLine,
                                format!("header with empty name ignored: {}", trimmed),
                            )),
                        }
                        scan_state = ScanState::InHeaders(false);
                    } else {
                        body_lines.push(line);
                        scan_state = ScanState::InBody;
                    }
                }
                ScanState::InBody => body_lines.push(line),
            }
        }

        // 6. 请求体
        unit.body = Self::build_body(&body_lines);

        // 测试区
        if !test_zone.is_empty() {
            let zone = self.test_parser.parse(test_zone);
            unit.tests = zone.blocks;
            unit.directives.extend(zone.extractions);
        }

        // 7. 编译期变量替换
        unit.target = state.substitute_static(&unit.target);
        for (_, value) in unit.headers.iter_mut() {
            *value = state.substitute_static(value);
        }

        unit
    }

    /// 全局段落：只应用指令
    fn apply_globals(
        section: &Section,
        state: &mut VariableState,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let mut scratch = RequestUnit::default();
        for line in section.text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if directive::is_directive(trimmed) {
                Self::handle_directive(trimmed, section.index, &mut scratch, state, diagnostics);
            } else {
                diagnostics.push(Diagnostic::new(
                    section.index,
                    DiagnosticKind::IgnoredLine,
                    format!("line in globals section ignored: {}", trimmed),
                ));
            }
        }

        for directive in scratch.directives {
            if !matches!(directive, VariableDirective::StaticAssignment { .. }) {
                diagnostics.push(Diagnostic::new(
                    section.index,
                    DiagnosticKind::IgnoredLine,
                    format!("{:?} has no request to attach to", directive),
                ));
            }
        }
    }

    fn handle_directive(
        line: &str,
        section: usize,
        unit: &mut RequestUnit,
        state: &mut VariableState,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let directive = match parse_directive(line) {
            Some(Ok(directive)) => directive,
            Some(Err(e)) => {
                diagnostics.push(Diagnostic::new(
                    section,
                    DiagnosticKind::InvalidDirective,
                    e.to_string(),
                ));
                return;
            }
            None => return,
        };

        let directive = match directive {
            VariableDirective::NameBinding { request_id } => {
                unit.request_id = Some(request_id.clone());
                VariableDirective::NameBinding { request_id }
            }
            VariableDirective::StaticAssignment { key, value } => {
                let value = state.substitute(&value);
                debug!("Static variable {} = {}", key, value);
                state.store.set(key.clone(), value.clone());
                VariableDirective::StaticAssignment { key, value }
            }
            extraction @ VariableDirective::PathExtraction { .. } => extraction,
        };
        unit.directives.push(directive);
    }

    /// 去掉首尾空白行；单独的 `< path` 视为请求体文件引用
    fn build_body(lines: &[&str]) -> RequestBody {
        let start = lines.iter().position(|l| !l.trim().is_empty());
        let end = lines.iter().rposition(|l| !l.trim().is_empty());
        let (Some(start), Some(end)) = (start, end) else {
            return RequestBody::None;
        };

        let text = lines[start..=end].join("\n");
        match body_file_reference(&text) {
            Some(path) => RequestBody::File(path.to_string()),
            None => RequestBody::Inline(text),
        }
    }
}
