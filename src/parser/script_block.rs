//! `< {% %}` / `> {% %}` 脚本块
//!
//! 提取与删除共用同一次逐行扫描，保证两者识别的范围一致。

use crate::parser::types::{ScriptPhase, ScriptReference};
use once_cell::sync::Lazy;
use regex::Regex;

const SCRIPT_EXTENSION: &str = ".js";
const CLOSE: &str = "%}";

static OPEN_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([<>])\s*\{%(.*)$").expect("script marker regex must compile"));

static FILE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([<>])\s+(\S+)$").expect("file reference regex must compile"));

/// 识别出的一个脚本
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptBlock {
    pub phase: ScriptPhase,
    pub reference: ScriptReference,
}

/// 扫描结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptScan {
    /// 按源码顺序排列
    pub blocks: Vec<ScriptBlock>,
    /// 删除所有脚本后的文本
    pub remaining: String,
    /// 未闭合块的起始行（相对输入，从 0 开始）
    pub unterminated: Vec<usize>,
}

impl ScriptScan {
    pub fn scripts(&self, phase: ScriptPhase) -> impl Iterator<Item = &ScriptReference> {
        self.blocks
            .iter()
            .filter(move |b| b.phase == phase)
            .map(|b| &b.reference)
    }
}

/// 提取所有脚本
pub fn extract_scripts(text: &str) -> Vec<ScriptBlock> {
    scan(text).blocks
}

/// 删除所有可识别的脚本，其余内容（包括请求体文件引用）保持不变
pub fn remove_scripts(text: &str) -> String {
    scan(text).remaining
}

/// `< path` 形式、且不是脚本的请求体文件引用
pub fn body_file_reference(text: &str) -> Option<&str> {
    let caps = FILE_REFERENCE.captures(text.trim())?;
    let path = caps.get(2)?.as_str();
    (&caps[1] == "<" && !path.ends_with(SCRIPT_EXTENSION) && !path.starts_with("{%")).then_some(path)
}

pub fn scan(text: &str) -> ScriptScan {
    let lines: Vec<&str> = text.lines().collect();
    let mut result = ScriptScan::default();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if let Some(caps) = OPEN_MARKER.captures(trimmed) {
            let phase = phase_of(&caps[1]);
            let rest = caps.get(2).map_or("", |m| m.as_str());

            if let Some(content) = rest.trim_end().strip_suffix(CLOSE) {
                result.blocks.push(inline(phase, content));
                i += 1;
                continue;
            }

            match find_close(&lines, i + 1) {
                Some(end) => {
                    let mut body: Vec<&str> = Vec::new();
                    if !rest.trim().is_empty() {
                        body.push(rest);
                    }
                    body.extend_from_slice(&lines[i + 1..end]);
                    if let Some(last) = lines[end].trim_end().strip_suffix(CLOSE) {
                        body.push(last);
                    }
                    result.blocks.push(inline(phase, &body.join("\n")));
                    i = end + 1;
                }
                None => {
                    result.unterminated.push(i);
                    kept.push(line);
                    i += 1;
                }
            }
            continue;
        }

        if let Some(caps) = FILE_REFERENCE.captures(trimmed) {
            let phase = phase_of(&caps[1]);
            let path = &caps[2];
            let is_script = match phase {
                ScriptPhase::PreRequest => path.ends_with(SCRIPT_EXTENSION),
                ScriptPhase::PostResponse => true,
            };
            if is_script {
                result.blocks.push(ScriptBlock {
                    phase,
                    reference: ScriptReference::File(path.to_string()),
                });
                i += 1;
                continue;
            }
        }

        kept.push(line);
        i += 1;
    }

    result.remaining = kept.join("\n");
    result
}

fn find_close(lines: &[&str], from: usize) -> Option<usize> {
    (from..lines.len()).find(|&j| lines[j].trim_end().ends_with(CLOSE))
}

fn phase_of(marker: &str) -> ScriptPhase {
    if marker == "<" {
        ScriptPhase::PreRequest
    } else {
        ScriptPhase::PostResponse
    }
}

fn inline(phase: ScriptPhase, content: &str) -> ScriptBlock {
    ScriptBlock {
        phase,
        reference: ScriptReference::Inline(content.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_post_script() {
        let blocks = extract_scripts("> {% client.log(1); %}");
        assert_eq!(
            blocks,
            vec![ScriptBlock {
                phase: ScriptPhase::PostResponse,
                reference: ScriptReference::Inline("client.log(1);".to_string()),
            }]
        );
    }

    #[test]
    fn test_multi_line_script() {
        let text = "< {%\n  const a = 1;\n  request.variables.set('a', a);\n%}\nGET http://x";
        let scan = scan(text);
        assert_eq!(scan.blocks.len(), 1);
        assert_eq!(
            scan.blocks[0].reference,
            ScriptReference::Inline("const a = 1;\n  request.variables.set('a', a);".to_string())
        );
        assert_eq!(scan.remaining, "GET http://x");
    }

    #[test]
    fn test_close_line_with_content() {
        let blocks = extract_scripts("> {%\nclient.log('a');\nclient.log('b'); %}");
        assert_eq!(
            blocks[0].reference,
            ScriptReference::Inline("client.log('a');\nclient.log('b');".to_string())
        );
    }

    #[test]
    fn test_file_references() {
        let blocks = extract_scripts("< ./pre.js");
        assert_eq!(blocks[0].phase, ScriptPhase::PreRequest);
        assert_eq!(blocks[0].reference, ScriptReference::File("./pre.js".to_string()));

        assert!(extract_scripts("< ./body.json").is_empty());
        assert_eq!(remove_scripts("< ./body.json"), "< ./body.json");
        assert_eq!(body_file_reference("  < ./body.json "), Some("./body.json"));
        assert_eq!(body_file_reference("< ./pre.js"), None);

        let post = extract_scripts("> handlers/after.txt");
        assert_eq!(
            post[0].reference,
            ScriptReference::File("handlers/after.txt".to_string())
        );
    }

    #[test]
    fn test_empty_block() {
        let blocks = extract_scripts("< {% %}");
        assert_eq!(blocks[0].reference, ScriptReference::Inline(String::new()));
    }

    #[test]
    fn test_multiple_blocks_in_order() {
        let text = "> {% first(); %}\n< {% pre(); %}\n> {% second(); %}";
        let scan = scan(text);
        let post: Vec<_> = scan.scripts(ScriptPhase::PostResponse).collect();
        assert_eq!(
            post,
            vec![
                &ScriptReference::Inline("first();".to_string()),
                &ScriptReference::Inline("second();".to_string())
            ]
        );
        assert_eq!(scan.scripts(ScriptPhase::PreRequest).count(), 1);
        assert!(scan.remaining.is_empty());
    }

    #[test]
    fn test_unterminated_block_left_in_place() {
        let text = "GET http://x\n\n> {%\nclient.log('never closed');";
        let scan = scan(text);
        assert!(scan.blocks.is_empty());
        assert_eq!(scan.unterminated, vec![2]);
        assert_eq!(scan.remaining, text);
    }

    #[test]
    fn test_remove_keeps_other_lines() {
        let text = "POST http://x\nContent-Type: text/plain\n\n< {% pre(); %}\nhello\n> ./after.js";
        assert_eq!(
            remove_scripts(text),
            "POST http://x\nContent-Type: text/plain\n\nhello"
        );
    }

    #[test]
    fn test_angle_bracket_body_lines_untouched() {
        let text = "<html>\n<body>hi</body>\n</html>";
        assert!(extract_scripts(text).is_empty());
        assert_eq!(remove_scripts(text), text);
    }
}
