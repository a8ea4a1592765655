use crate::parser::directive::parse_directive;
use crate::parser::sections::is_test_delimiter;
use crate::parser::types::{TestBlock, VariableDirective};

/// 测试区（第一个 `####` 行起）的解析结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestZone {
    pub blocks: Vec<TestBlock>,
    /// 测试区中的 `@key = $.path`
    pub extractions: Vec<VariableDirective>,
}

/// 测试区解析器，可替换
pub trait TestBlockParser: Send + Sync {
    fn parse(&self, lines: &[&str]) -> TestZone;
}

/// 默认实现：每个 `####` 行开启一个块，非空行归入当前块
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTestBlockParser;

impl TestBlockParser for DefaultTestBlockParser {
    fn parse(&self, lines: &[&str]) -> TestZone {
        let mut zone = TestZone::default();

        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if is_test_delimiter(trimmed) {
                zone.blocks.push(TestBlock {
                    title: trimmed.trim_start_matches('#').trim().to_string(),
                    lines: Vec::new(),
                });
                continue;
            }

            if let Some(Ok(directive @ VariableDirective::PathExtraction { .. })) =
                parse_directive(trimmed)
            {
                zone.extractions.push(directive);
                continue;
            }

            match zone.blocks.last_mut() {
                Some(block) => block.lines.push(trimmed.to_string()),
                None => zone.blocks.push(TestBlock {
                    title: String::new(),
                    lines: vec![trimmed.to_string()],
                }),
            }
        }

        zone
    }
}
