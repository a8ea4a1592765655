use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// 静态变量表：扁平的 key → 标量映射
///
/// 只接受显式写入，后写覆盖先写，整个运行期间有效，只能显式清空。
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    /// 变量映射表
    variables: HashMap<String, String>,
}

impl VariableStore {
    /// 创建新的空变量表
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入变量
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// 获取变量值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(|s| s.as_str())
    }

    /// 删除单个变量
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.variables.remove(key)
    }

    /// 清空所有变量
    pub fn clear(&mut self) {
        self.variables.clear();
    }

    /// 批量写入变量
    pub fn extend<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.set(k, v);
        }
    }

    /// 只用本表内的变量做一次文本替换，未知变量保持原样
    pub fn substitute(&self, text: &str) -> String {
        super::resolver::replace_placeholders(text, |name| self.get(name).map(str::to_string))
    }

    /// 以 (key, value) 形式遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 变量数量
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// 环境配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Environment {
    /// 变量映射
    #[serde(flatten)]
    pub variables: HashMap<String, String>,
}

/// 脚本沙箱配置
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSettings {
    /// 单次脚本执行的墙钟超时（毫秒）
    #[serde(default = "SandboxSettings::default_timeout_ms")]
    pub timeout_ms: u64,

    /// 脚本运行时内存上限（MB）
    #[serde(default = "SandboxSettings::default_memory_limit_mb")]
    pub memory_limit_mb: usize,
}

impl SandboxSettings {
    fn default_timeout_ms() -> u64 {
        5000
    }

    fn default_memory_limit_mb() -> usize {
        64
    }
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
            memory_limit_mb: Self::default_memory_limit_mb(),
        }
    }
}

/// `.env` 文件查找配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DotenvSettings {
    /// 优先查找的目录，未命中时再查找工作目录
    pub base_dir: Option<PathBuf>,
}

/// 完整的配置文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VariableConfig {
    /// 所有环境配置
    #[serde(default)]
    pub environments: HashMap<String, Environment>,

    #[serde(default)]
    pub sandbox: SandboxSettings,

    #[serde(default)]
    pub dotenv: DotenvSettings,
}

impl VariableConfig {
    /// 获取指定环境的变量
    pub fn get_environment(&self, env_name: &str) -> Option<&Environment> {
        self.environments.get(env_name)
    }
}
