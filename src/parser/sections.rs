//! 注释剥离与段落切分

use crate::parser::request_line::is_request_line;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment regex must compile"));

/// 段落类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Request,
    /// 只包含变量指令的段落，写入静态变量表
    Globals,
}

/// 切分后的一个段落
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// 在文件中的序号
    pub index: usize,
    pub kind: SectionKind,
    pub text: String,
}

/// `###` 开头但不是 `####`
pub fn is_section_delimiter(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("###") && !trimmed.starts_with("####")
}

/// `####` 开头
pub fn is_test_delimiter(line: &str) -> bool {
    line.trim_start().starts_with("####")
}

/// `#` 或 `//` 开头的行注释，`###`/`####` 分隔行除外
pub fn is_line_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with("###") {
        return false;
    }
    trimmed.starts_with('#') || trimmed.starts_with("//")
}

/// 删除所有 `/* ... */` 块注释（可跨行）
pub fn strip_block_comments(content: &str) -> Cow<'_, str> {
    BLOCK_COMMENT.replace_all(content, "")
}

/// 剥离注释并按 `###` 切分段落，纯空白段落被丢弃
pub fn split_sections(content: &str) -> Vec<Section> {
    let stripped = strip_block_comments(content);

    let mut chunks: Vec<Vec<&str>> = vec![Vec::new()];
    for line in stripped.lines() {
        if is_line_comment(line) {
            continue;
        }
        if is_section_delimiter(line) {
            chunks.push(Vec::new());
        }
        if let Some(current) = chunks.last_mut() {
            current.push(line);
        }
    }

    chunks
        .into_iter()
        .filter(|lines| lines.iter().any(|l| !l.trim().is_empty()))
        .enumerate()
        .map(|(index, lines)| Section {
            index,
            kind: classify(&lines),
            text: lines.join("\n"),
        })
        .collect()
}

/// 首个非空行以 `@` 开头且没有请求行的段落视为全局段落
fn classify(lines: &[&str]) -> SectionKind {
    let first = lines.iter().map(|l| l.trim()).find(|l| !l.is_empty());
    let starts_with_directive = first.is_some_and(|l| l.starts_with('@'));
    if starts_with_directive && !lines.iter().any(|l| is_request_line(l.trim())) {
        SectionKind::Globals
    } else {
        SectionKind::Request
    }
}
