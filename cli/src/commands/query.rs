use std::path::PathBuf;

use anyhow::Context;
use wongus_bridge::RunCommand;

use crate::cli::{CommandArgs, RunArgs};
use crate::commands::{command_spec, session};
use crate::config::MergedConfig;
use crate::error::CliResult;

pub async fn log(message: String, config: MergedConfig) -> CliResult<()> {
    session(&config, |bridge| async move {
        bridge.log(message).await.context("log failed")
    })
    .await
}

pub async fn read(path: PathBuf, config: MergedConfig) -> CliResult<()> {
    let content = session(&config, |bridge| async move {
        bridge
            .read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))
    })
    .await?;
    eprint!("{content}");
    Ok(())
}

pub async fn list_dir(path: PathBuf, config: MergedConfig) -> CliResult<()> {
    let entries = session(&config, |bridge| async move {
        bridge
            .list_dir(&path)
            .await
            .with_context(|| format!("failed to list {}", path.display()))
    })
    .await?;
    for entry in entries {
        eprintln!("{entry}");
    }
    Ok(())
}

pub async fn exists(path: PathBuf, config: MergedConfig) -> CliResult<()> {
    let exists = session(&config, |bridge| async move {
        Ok(bridge.file_exists(&path).await?)
    })
    .await?;
    eprintln!("{exists}");
    if exists {
        Ok(())
    } else {
        anyhow::bail!("no such path on host")
    }
}

pub async fn run(args: RunArgs, config: MergedConfig) -> CliResult<()> {
    let mut command = RunCommand::new(command_spec(&args.command)?);
    if let Some(secs) = args.timeout_secs {
        command = command.timeout_secs(secs);
    }

    let output = session(&config, |bridge| async move {
        bridge.run_command(command).await.context("command failed")
    })
    .await?;
    eprint!("{}", output.stdout);
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr);
    }
    Ok(())
}

pub async fn spawn(args: CommandArgs, config: MergedConfig) -> CliResult<()> {
    let spec = command_spec(&args)?;
    let process = session(&config, |bridge| async move {
        bridge
            .run_detached_command(spec)
            .await
            .context("failed to start command")
    })
    .await?;
    eprintln!("{}", process.pid);
    Ok(())
}
