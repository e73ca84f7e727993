use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;
mod config;
mod error;

use cli::{Cli, Commands};
use config::{load_config, merge_config};
use error::{CliResult, to_exit_code};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is the protocol channel
    let filter = if cli.verbose {
        "wongus_bridge=debug,wongus_probe=debug"
    } else {
        "wongus_bridge=warn,wongus_probe=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let result = smol::block_on(async_main(cli));
    to_exit_code(result)
}

async fn async_main(cli: Cli) -> CliResult<()> {
    let file_config = load_config(cli.config.as_deref())?;
    let config = merge_config(file_config, &cli.common)?;

    match cli.command {
        Commands::Log { message } => commands::query::log(message, config).await,
        Commands::Read { path } => commands::query::read(path, config).await,
        Commands::ListDir { path } => commands::query::list_dir(path, config).await,
        Commands::Exists { path } => commands::query::exists(path, config).await,
        Commands::Run(args) => commands::query::run(args, config).await,
        Commands::Spawn(args) => commands::query::spawn(args, config).await,
        Commands::Stream(args) => commands::stream::execute(args, config).await,
        Commands::Answer => commands::answer::execute(config).await,
    }
}
