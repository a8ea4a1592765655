use crate::variable::dynamic::DynamicVariables;
use crate::variable::response::NamedResponseStore;
use crate::variable::types::VariableStore;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// 匹配 `{{name}}`，花括号内首尾不能是空白（`{{ name }}` 不会被替换）
fn placeholder_regex() -> &'static Regex {
    static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
    VAR_REGEX.get_or_init(|| {
        Regex::new(r"\{\{([^{}\s](?:[^{}]*[^{}\s])?)\}\}").expect("placeholder regex must compile")
    })
}

/// 单遍扫描文本中的 `{{...}}`，用 `lookup` 的结果替换，未命中保持原样
///
/// 替换进来的值不会被再次扫描。
pub fn replace_placeholders<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    if !text.contains("{{") {
        return text.to_string();
    }

    placeholder_regex()
        .replace_all(text, |caps: &Captures| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// 解析并替换系统环境变量 ${VAR}（用于配置文件中的值）
pub fn resolve_env_vars(text: &str) -> String {
    static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = ENV_REGEX.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env regex must compile")
    });

    re.replace_all(text, |caps: &Captures| {
        let env_name = &caps[1];
        std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

/// 一次运行期间的全部变量状态，由调用方（执行器）持有
#[derive(Debug, Default)]
pub struct VariableState {
    /// 运行时覆盖（CLI --var），优先级最高
    pub overrides: VariableStore,
    /// 静态变量（`@key = value`、环境配置、脚本写入、路径提取）
    pub store: VariableStore,
    pub dynamic: DynamicVariables,
    pub responses: NamedResponseStore,
}

impl VariableState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dynamic(mut self, dynamic: DynamicVariables) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// 借用当前状态构造解析器
    pub fn resolver(&self) -> VariableResolver<'_> {
        VariableResolver {
            overrides: &self.overrides,
            store: &self.store,
            dynamic: &self.dynamic,
            responses: &self.responses,
        }
    }

    /// 等价于 `self.resolver().substitute(text)`
    pub fn substitute(&self, text: &str) -> String {
        self.resolver().substitute(text)
    }

    /// 编译期替换：只查覆盖层与静态变量，动态变量和响应引用留到发送时
    pub fn substitute_static(&self, text: &str) -> String {
        replace_placeholders(text, |name| {
            self.overrides
                .get(name)
                .or_else(|| self.store.get(name))
                .map(str::to_string)
        })
    }

    /// 覆盖层与静态变量合并后的快照（覆盖层优先）
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut merged: std::collections::BTreeMap<&str, &str> = self.store.iter().collect();
        merged.extend(self.overrides.iter());
        merged
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// 变量解析门面
///
/// 查找顺序：
/// 1. 运行时覆盖
/// 2. 静态变量（后写覆盖先写）
/// 3. 动态变量（`$` 开头）
/// 4. 命名响应引用（`id.response.path`）
///
/// 全部未命中时保留占位符原文，永不报错。
#[derive(Debug, Clone, Copy)]
pub struct VariableResolver<'a> {
    overrides: &'a VariableStore,
    store: &'a VariableStore,
    dynamic: &'a DynamicVariables,
    responses: &'a NamedResponseStore,
}

impl<'a> VariableResolver<'a> {
    pub fn new(
        overrides: &'a VariableStore,
        store: &'a VariableStore,
        dynamic: &'a DynamicVariables,
        responses: &'a NamedResponseStore,
    ) -> Self {
        Self {
            overrides,
            store,
            dynamic,
            responses,
        }
    }

    /// 解析单个占位符内部的名称
    pub fn lookup(&self, name: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(name).or_else(|| self.store.get(name)) {
            return Some(value.to_string());
        }

        if name.starts_with('$') {
            if let Some(value) = self.dynamic.evaluate(name) {
                return Some(value);
            }
        }

        if name.contains(".response.") {
            return self.responses.resolve(name);
        }

        None
    }

    /// 替换文本中的所有占位符
    pub fn substitute(&self, text: &str) -> String {
        replace_placeholders(text, |name| self.lookup(name))
    }
}
