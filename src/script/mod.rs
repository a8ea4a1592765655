pub mod sandbox;
pub mod types;

pub use sandbox::ScriptSandbox;
pub use types::{SandboxExecutionResult, ScriptGlobals, SubTestResult};

use crate::Result;
use crate::parser::ScriptReference;
use std::path::Path;

/// 取得脚本源码：内联脚本直接返回，文件脚本相对 `base_dir` 读取
pub fn load_source(reference: &ScriptReference, base_dir: Option<&Path>) -> Result<String> {
    match reference {
        ScriptReference::Inline(source) => Ok(source.clone()),
        ScriptReference::File(path) => {
            let full = match base_dir {
                Some(dir) => dir.join(path),
                None => Path::new(path).to_path_buf(),
            };
            std::fs::read_to_string(&full).map_err(|e| {
                crate::RestflowError::ScriptError(format!(
                    "无法读取脚本文件 {}: {}",
                    full.display(),
                    e
                ))
            })
        }
    }
}
