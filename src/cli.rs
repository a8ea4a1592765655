use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use restflow::parser::HttpFileParser;
use restflow::runner::{TestExecutor, TestReporter, TestSummary};
use restflow::script::ScriptSandbox;
use restflow::variable::{ConfigLoader, VariableConfig};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 输出调试日志与完整响应
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 配置文件路径，默认向上查找 restflow.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 按顺序执行 .http 文件中的请求
    Run {
        file: PathBuf,

        /// 使用的环境（restflow.toml 中的 [environments.<name>]）
        #[arg(short, long)]
        env: Option<String>,

        /// 运行时变量覆盖，可重复：--var key=value
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },

    /// 编译 .http 文件并以 JSON 输出请求与诊断
    Parse {
        file: PathBuf,

        #[arg(short, long)]
        env: Option<String>,
    },
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    ConfigLoader::parse_cli_var(s).ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

fn load_config(path: Option<&Path>) -> Result<VariableConfig> {
    match path {
        Some(path) => ConfigLoader::load_from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ConfigLoader::find_and_load().unwrap_or_default()),
    }
}

/// `restflow run`，有失败请求时返回错误
pub async fn run_file(
    file: &Path,
    env: Option<&str>,
    vars: &[(String, String)],
    config: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let mut state = ConfigLoader::build_state(&config, env, vars);

    let parsed = HttpFileParser::new()
        .parse_file(file, &mut state)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let reporter = TestReporter::new(verbose);
    reporter.print_header(&file.display().to_string(), parsed.units.len());

    let mut executor =
        TestExecutor::new(state)?.with_sandbox(ScriptSandbox::new(&config.sandbox));
    let results = executor.execute_all(&parsed).await;

    for result in &results {
        reporter.print_result(result);
    }

    let summary = TestSummary::from_results(&results);
    reporter.print_summary(&summary);

    if !summary.all_passed() {
        bail!("{} of {} requests failed", summary.failed, summary.total);
    }
    Ok(())
}

/// `restflow parse`
pub fn parse_file(file: &Path, env: Option<&str>, config: Option<&Path>) -> Result<String> {
    let config = load_config(config)?;
    let mut state = ConfigLoader::build_state(&config, env, &[]);

    let parsed = HttpFileParser::new()
        .parse_file(file, &mut state)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    Ok(serde_json::to_string_pretty(&parsed)?)
}
