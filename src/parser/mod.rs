pub mod directive;
pub mod http_file;
pub mod request_line;
pub mod script_block;
pub mod sections;
pub mod test_block;
pub mod types;

pub use http_file::HttpFileParser;
pub use test_block::{DefaultTestBlockParser, TestBlockParser, TestZone};
pub use types::{
    Diagnostic, DiagnosticKind, HeaderList, ParseError, ParseResult, ParsedFile, RequestBody,
    RequestUnit, ScriptPhase, ScriptReference, TestBlock, VariableDirective,
};

use crate::variable::resolver::VariableState;

/// 从文件路径解析 HTTP 文件
pub fn parse_file<P: AsRef<std::path::Path>>(
    path: P,
    state: &mut VariableState,
) -> ParseResult<ParsedFile> {
    HttpFileParser::new().parse_file(path, state)
}

/// 从字符串内容解析 HTTP 请求
pub fn parse_content(content: &str, state: &mut VariableState) -> ParsedFile {
    HttpFileParser::new().parse_content(content, state)
}
