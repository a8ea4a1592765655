mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    restflow::logger::init_logger(cli.verbose);

    match cli.command {
        Commands::Run { file, env, vars } => {
            cli::run_file(
                &file,
                env.as_deref(),
                &vars,
                cli.config.as_deref(),
                cli.verbose,
            )
            .await?
        }
        Commands::Parse { file, env } => {
            let json = cli::parse_file(&file, env.as_deref(), cli.config.as_deref())?;
            println!("{}", json);
        }
    }
    Ok(())
}
