use tracing_subscriber::{EnvFilter, fmt};

/// 初始化日志系统
///
/// 支持通过 RUST_LOG 环境变量控制日志级别，默认级别: info
///
/// 示例:
/// - RUST_LOG=restflow=debug restflow run api.http
/// - RUST_LOG=restflow::parser=trace restflow parse api.http
///
/// `verbose` 为 true 时默认级别提升为 debug（RUST_LOG 仍然优先）
pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("Logger initialized");
}
