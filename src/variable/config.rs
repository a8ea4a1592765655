use crate::error::{RestflowError, Result};
use crate::variable::dynamic::DynamicVariables;
use crate::variable::resolver::{VariableState, resolve_env_vars};
use crate::variable::types::VariableConfig;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    pub const CONFIG_FILE: &'static str = "restflow.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<VariableConfig> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RestflowError::ConfigError(format!(
                "无法读取配置文件 {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| RestflowError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录
    /// 2. 父目录递归查找
    /// 3. 用户配置目录 ~/.config/restflow/
    pub fn find_and_load() -> Option<VariableConfig> {
        Self::try_load_from_current_dir().or_else(Self::try_load_from_user_dir)
    }

    fn try_load_from_current_dir() -> Option<VariableConfig> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.exists() {
                return Self::load_logged(&config_path);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    fn try_load_from_user_dir() -> Option<VariableConfig> {
        let home = dirs::home_dir()?;
        let config_path = home
            .join(".config")
            .join("restflow")
            .join(Self::CONFIG_FILE);

        if config_path.exists() {
            Self::load_logged(&config_path)
        } else {
            None
        }
    }

    fn load_logged(path: &Path) -> Option<VariableConfig> {
        match Self::load_from_path(path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                warn!("Ignoring config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// 构建一次运行的变量状态
    /// env_name: 环境名称（如 "dev", "prod"），其变量写入静态变量表
    /// cli_vars: CLI 传入的变量（--var key=value），作为运行时覆盖
    pub fn build_state(
        config: &VariableConfig,
        env_name: Option<&str>,
        cli_vars: &[(String, String)],
    ) -> VariableState {
        let mut dynamic = DynamicVariables::new();
        if let Some(dir) = &config.dotenv.base_dir {
            dynamic = dynamic.with_dotenv_dir(dir.clone());
        }
        let mut state = VariableState::new().with_dynamic(dynamic);

        if let Some(name) = env_name {
            match config.get_environment(name) {
                Some(env) => {
                    for (key, value) in &env.variables {
                        state.store.set(key.clone(), resolve_env_vars(value));
                    }
                }
                None => warn!("Environment '{}' not found in config", name),
            }
        }

        for (key, value) in cli_vars {
            state.overrides.set(key.clone(), value.clone());
        }

        state
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
    }
}
