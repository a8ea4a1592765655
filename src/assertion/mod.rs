//! 断言模块：对响应求值测试块中的断言行
mod evaluator;
mod extractor;
mod parser;
mod types;

pub use evaluator::{evaluate_assertion, evaluate_lines};
pub use extractor::{extract_value, path_exists};
pub use parser::parse_assertion;
pub use types::{AssertError, AssertExpr, AssertValue, AssertionResult, CompareOp, ValuePath};
