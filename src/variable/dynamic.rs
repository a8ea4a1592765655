//! 动态变量生成器
//!
//! 处理 `{{$name args...}}` 形式的占位符。名称大小写不敏感，
//! 参数以空白分隔，可以用单引号或双引号包含空格。
//!
//! | 名称 | 说明 |
//! |------|------|
//! | `$guid` / `$uuid` | UUID v4 |
//! | `$timestamp [offset]` | Unix 时间戳（秒） |
//! | `$randomInt [min max]` | 闭区间随机整数，默认 0..=1000 |
//! | `$datetime [format] [offset]` | UTC 时间 |
//! | `$localDatetime [format] [offset]` | 本地时间 |
//! | `$dotenv NAME` | 读取 `.env` 文件 |
//! | `$processEnv NAME` | 读取进程环境变量，`%NAME` 表示可选 |
//!
//! 任何无法识别的名称、参数或偏移量都返回 None，调用方保留原占位符。

use chrono::{DateTime, Datelike, Local, Months, SecondsFormat, TimeDelta, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Captures, Regex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// `.env` 文件名
const DOTENV_FILE: &str = ".env";

/// randomInt 的默认区间
const DEFAULT_RANDOM_MIN: i64 = 0;
const DEFAULT_RANDOM_MAX: i64 = 1000;

static OFFSET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-]?\d+)\s*([A-Za-z]+)$").expect("offset regex must compile"));

static DATE_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"YYYY|SSS|MM|DD|HH|mm|ss").expect("date token regex must compile"));

/// 时间来源，测试时可注入固定时间
pub trait Clock: fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 动态变量求值器
#[derive(Debug)]
pub struct DynamicVariables {
    clock: Arc<dyn Clock>,
    dotenv_dir: Option<PathBuf>,
    /// 已加载的 `.env` 表，按查找顺序排列
    dotenv_cache: RefCell<Option<Vec<HashMap<String, String>>>>,
}

impl Default for DynamicVariables {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicVariables {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            dotenv_dir: None,
            dotenv_cache: RefCell::new(None),
        }
    }

    /// 替换时间来源
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// 设置 `.env` 优先查找目录
    pub fn with_dotenv_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dotenv_dir = Some(dir.into());
        self.invalidate_dotenv();
        self
    }

    /// 丢弃 `.env` 缓存，下次访问时重新读取
    pub fn invalidate_dotenv(&self) {
        self.dotenv_cache.replace(None);
    }

    /// 对占位符内部文本求值，例如 `$randomInt 1 10`
    pub fn evaluate(&self, expression: &str) -> Option<String> {
        let body = expression.trim().strip_prefix('$')?;
        let tokens = split_args(body);
        let (name, args) = tokens.split_first()?;

        let value = match name.to_ascii_lowercase().as_str() {
            "guid" | "uuid" => Some(Uuid::new_v4().to_string()),
            "timestamp" => self.timestamp(args),
            "randomint" => random_int(args),
            "datetime" => self.datetime(args, false),
            "localdatetime" => self.datetime(args, true),
            "dotenv" => self.dotenv(args),
            "processenv" => process_env(args),
            _ => None,
        };

        if value.is_none() {
            debug!("Dynamic variable left unresolved: {}", expression);
        }
        value
    }

    fn timestamp(&self, args: &[String]) -> Option<String> {
        let at = apply_offset(self.clock.now(), args)?;
        Some(at.timestamp().to_string())
    }

    fn datetime(&self, args: &[String], local: bool) -> Option<String> {
        let (format, offset) = match args.split_first() {
            Some((format, offset)) => (format.as_str(), offset),
            None => ("iso8601", args),
        };
        let at = apply_offset(self.clock.now(), offset)?;

        if local {
            format_datetime(&at.with_timezone(&Local), format, false)
        } else {
            format_datetime(&at, format, true)
        }
    }

    fn dotenv(&self, args: &[String]) -> Option<String> {
        let name = args.first()?;

        if self.dotenv_cache.borrow().is_none() {
            let tables = self.load_dotenv_tables();
            if tables.is_empty() {
                return None;
            }
            self.dotenv_cache.replace(Some(tables));
        }

        let cache = self.dotenv_cache.borrow();
        cache
            .as_ref()?
            .iter()
            .find_map(|table| table.get(name.as_str()).cloned())
    }

    /// 依次读取配置目录与工作目录下的 `.env`，读取失败视为不存在
    fn load_dotenv_tables(&self) -> Vec<HashMap<String, String>> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(dir) = &self.dotenv_dir {
            candidates.push(dir.join(DOTENV_FILE));
        }
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(DOTENV_FILE));
        }

        candidates
            .iter()
            .filter_map(|path| read_dotenv(path))
            .collect()
    }
}

fn read_dotenv(path: &Path) -> Option<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).ok()?;
    debug!("Loaded dotenv file {}", path.display());
    Some(parse_dotenv(&content))
}

/// 解析 `.env` 内容：忽略空行与注释，支持 `export ` 前缀，去掉成对引号
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            vars.insert(key.to_string(), unquote(value.trim()).to_string());
        }
    }

    vars
}

fn unquote(value: &str) -> &str {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn random_int(args: &[String]) -> Option<String> {
    let (min, max) = match args {
        [] => (DEFAULT_RANDOM_MIN, DEFAULT_RANDOM_MAX),
        [min, max] => (min.parse::<i64>().ok()?, max.parse::<i64>().ok()?),
        _ => return None,
    };
    if min > max {
        return None;
    }
    Some(rand::rng().random_range(min..=max).to_string())
}

fn process_env(args: &[String]) -> Option<String> {
    let name = args.first()?;
    match name.strip_prefix('%') {
        Some(optional) => Some(std::env::var(optional).unwrap_or_default()),
        None => std::env::var(name).ok(),
    }
}

/// 应用相对偏移，如 `-1 hour`、`2 days`、`+30m`
///
/// 没有偏移参数时原样返回；格式错误返回 None。
fn apply_offset(base: DateTime<Utc>, args: &[String]) -> Option<DateTime<Utc>> {
    let joined = args.join(" ");
    let joined = joined.trim();
    if joined.is_empty() {
        return Some(base);
    }

    let caps = OFFSET_REGEX.captures(joined)?;
    let amount: i64 = caps[1].parse().ok()?;
    let unit = &caps[2];

    // 单字母 M 表示月，m 表示分钟
    let delta = match unit {
        "M" => return shift_months(base, amount),
        "m" => TimeDelta::try_minutes(amount)?,
        _ => match unit.to_ascii_lowercase().as_str() {
            "ms" | "millisecond" | "milliseconds" => TimeDelta::try_milliseconds(amount)?,
            "s" | "sec" | "second" | "seconds" => TimeDelta::try_seconds(amount)?,
            "min" | "minute" | "minutes" => TimeDelta::try_minutes(amount)?,
            "h" | "hour" | "hours" => TimeDelta::try_hours(amount)?,
            "d" | "day" | "days" => TimeDelta::try_days(amount)?,
            "w" | "week" | "weeks" => TimeDelta::try_weeks(amount)?,
            "month" | "months" => return shift_months(base, amount),
            "y" | "year" | "years" => return shift_months(base, amount.checked_mul(12)?),
            _ => return None,
        },
    };

    base.checked_add_signed(delta)
}

fn shift_months(base: DateTime<Utc>, amount: i64) -> Option<DateTime<Utc>> {
    let months = Months::new(u32::try_from(amount.unsigned_abs()).ok()?);
    if amount < 0 {
        base.checked_sub_months(months)
    } else {
        base.checked_add_months(months)
    }
}

fn format_datetime<Tz>(at: &DateTime<Tz>, format: &str, utc: bool) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    match format.to_ascii_lowercase().as_str() {
        "iso8601" => Some(at.to_rfc3339_opts(SecondsFormat::Millis, utc)),
        "rfc1123" if utc => Some(at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
        "rfc1123" => Some(at.format("%a, %d %b %Y %H:%M:%S %z").to_string()),
        _ if DATE_TOKEN_REGEX.is_match(format) => Some(format_tokens(at, format)),
        _ => None,
    }
}

fn format_tokens<Tz: TimeZone>(at: &DateTime<Tz>, format: &str) -> String {
    DATE_TOKEN_REGEX
        .replace_all(format, |caps: &Captures| match &caps[0] {
            "YYYY" => format!("{:04}", at.year()),
            "MM" => format!("{:02}", at.month()),
            "DD" => format!("{:02}", at.day()),
            "HH" => format!("{:02}", at.hour()),
            "mm" => format!("{:02}", at.minute()),
            "ss" => format!("{:02}", at.second()),
            "SSS" => format!("{:03}", at.timestamp_subsec_millis()),
            other => other.to_string(),
        })
        .into_owned()
}

/// 按空白切分参数，引号内的空白保留
fn split_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;

    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixed() -> DynamicVariables {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 45).unwrap()
            + TimeDelta::milliseconds(123);
        DynamicVariables::new().with_clock(FixedClock(at))
    }

    #[test]
    fn test_guid_is_unique() {
        let vars = DynamicVariables::new();
        let a = vars.evaluate("$guid").unwrap();
        let b = vars.evaluate("$uuid").unwrap();
        assert_eq!(a.len(), 36);
        assert_ne!(a, b);
    }

    #[test]
    fn test_name_is_case_insensitive() {
        let vars = fixed();
        assert_eq!(vars.evaluate("$TIMESTAMP"), vars.evaluate("$timestamp"));
    }

    #[test]
    fn test_timestamp_with_offset() {
        let vars = fixed();
        let now: i64 = vars.evaluate("$timestamp").unwrap().parse().unwrap();
        let later: i64 = vars.evaluate("$timestamp 1 hour").unwrap().parse().unwrap();
        let earlier: i64 = vars.evaluate("$timestamp -2d").unwrap().parse().unwrap();
        assert_eq!(later - now, 3600);
        assert_eq!(now - earlier, 2 * 86400);
    }

    #[test]
    fn test_random_int_bounds() {
        let vars = DynamicVariables::new();
        assert_eq!(vars.evaluate("$randomInt 5 5"), Some("5".to_string()));

        for _ in 0..20 {
            let value: i64 = vars.evaluate("$randomInt").unwrap().parse().unwrap();
            assert!((0..=1000).contains(&value));
        }

        assert_eq!(vars.evaluate("$randomInt 10 1"), None);
        assert_eq!(vars.evaluate("$randomInt a b"), None);
    }

    #[test]
    fn test_datetime_keywords() {
        let vars = fixed();
        assert_eq!(
            vars.evaluate("$datetime iso8601"),
            Some("2024-03-15T10:30:45.123Z".to_string())
        );
        assert_eq!(
            vars.evaluate("$datetime rfc1123"),
            Some("Fri, 15 Mar 2024 10:30:45 GMT".to_string())
        );
        assert_eq!(vars.evaluate("$datetime"), vars.evaluate("$datetime iso8601"));
    }

    #[test]
    fn test_datetime_token_format_and_offset() {
        let vars = fixed();
        assert_eq!(
            vars.evaluate("$datetime 'YYYY-MM-DD HH:mm:ss.SSS'"),
            Some("2024-03-15 10:30:45.123".to_string())
        );
        assert_eq!(
            vars.evaluate("$datetime YYYY-MM-DD -1 day"),
            Some("2024-03-14".to_string())
        );
        assert_eq!(
            vars.evaluate("$datetime YYYY-MM 1 M"),
            Some("2024-04".to_string())
        );
        assert_eq!(
            vars.evaluate("$datetime HH:mm 15 m"),
            Some("10:45".to_string())
        );
    }

    #[test]
    fn test_malformed_offset_is_unresolved() {
        let vars = fixed();
        assert_eq!(vars.evaluate("$datetime iso8601 soon"), None);
        assert_eq!(vars.evaluate("$timestamp 1 fortnight"), None);
        assert_eq!(vars.evaluate("$datetime nonsense"), None);
    }

    #[test]
    fn test_local_datetime_token_format() {
        let vars = fixed();
        let value = vars.evaluate("$localDatetime YYYY").unwrap();
        assert_eq!(value.len(), 4);
    }

    #[test]
    fn test_unknown_generator() {
        let vars = DynamicVariables::new();
        assert_eq!(vars.evaluate("$nope"), None);
        assert_eq!(vars.evaluate("plain"), None);
    }

    #[test]
    fn test_process_env() {
        unsafe {
            std::env::set_var("RESTFLOW_DYNAMIC_TEST", "from-env");
        }
        let vars = DynamicVariables::new();
        assert_eq!(
            vars.evaluate("$processEnv RESTFLOW_DYNAMIC_TEST"),
            Some("from-env".to_string())
        );
        assert_eq!(vars.evaluate("$processEnv RESTFLOW_DYNAMIC_MISSING"), None);
        assert_eq!(
            vars.evaluate("$processEnv %RESTFLOW_DYNAMIC_MISSING"),
            Some(String::new())
        );
        unsafe {
            std::env::remove_var("RESTFLOW_DYNAMIC_TEST");
        }
    }

    #[test]
    fn test_dotenv_from_base_dir_and_cache() {
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join(".env");
        fs::write(
            &env_path,
            "# comment\nAPI_KEY=\"quoted key\"\nexport REGION='eu'\n",
        )
        .unwrap();

        let vars = DynamicVariables::new().with_dotenv_dir(dir.path());
        assert_eq!(
            vars.evaluate("$dotenv API_KEY"),
            Some("quoted key".to_string())
        );
        assert_eq!(vars.evaluate("$dotenv REGION"), Some("eu".to_string()));
        assert_eq!(vars.evaluate("$dotenv RESTFLOW_NOT_DEFINED_ANYWHERE"), None);

        // 缓存生效，文件变化需要显式失效
        fs::write(&env_path, "API_KEY=changed\n").unwrap();
        assert_eq!(
            vars.evaluate("$dotenv API_KEY"),
            Some("quoted key".to_string())
        );
        vars.invalidate_dotenv();
        assert_eq!(vars.evaluate("$dotenv API_KEY"), Some("changed".to_string()));
    }

    /// 没有读到任何文件时不缓存
    #[test]
    fn test_dotenv_missing_file_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let vars = DynamicVariables::new().with_dotenv_dir(dir.path());
        assert_eq!(vars.evaluate("$dotenv RESTFLOW_LATE_KEY"), None);

        fs::write(dir.path().join(".env"), "RESTFLOW_LATE_KEY=arrived\n").unwrap();
        assert_eq!(
            vars.evaluate("$dotenv RESTFLOW_LATE_KEY"),
            Some("arrived".to_string())
        );
    }

    #[test]
    fn test_parse_dotenv() {
        let vars = parse_dotenv("A=1\n\n#x\nB = 'two'\ninvalid\n=empty\n");
        assert_eq!(vars.get("A"), Some(&"1".to_string()));
        assert_eq!(vars.get("B"), Some(&"two".to_string()));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn test_split_args() {
        assert_eq!(
            split_args(r#"datetime "YYYY MM" -1 h"#),
            vec!["datetime", "YYYY MM", "-1", "h"]
        );
        assert_eq!(split_args("  a   b "), vec!["a", "b"]);
    }
}
