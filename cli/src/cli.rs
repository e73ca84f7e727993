use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wongus-probe")]
#[command(version)]
#[command(about = "Talk to a wongus bridge host over stdin/stdout")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (TOML)
    #[arg(short, long, global = true, env = "WONGUS_PROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a message to the host's log
    Log { message: String },

    /// Print a file from the host
    Read { path: PathBuf },

    /// List a directory on the host
    ListDir { path: PathBuf },

    /// Check whether a path exists on the host
    Exists { path: PathBuf },

    /// Run a command on the host and print its output
    Run(RunArgs),

    /// Start a command on the host without waiting for it
    Spawn(CommandArgs),

    /// Run a command on the host and print its stdout as it arrives
    Stream(CommandArgs),

    /// Echo every host-initiated call back until stdin closes
    Answer,
}

/// A host command line and where to run it
#[derive(Args)]
pub struct CommandArgs {
    /// Command and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Working directory on the host
    #[arg(long)]
    pub cwd: Option<String>,

    /// Environment variable to set (KEY=VALUE, can be repeated)
    #[arg(long = "env", short = 'e')]
    pub envs: Vec<String>,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub command: CommandArgs,

    /// Kill the command after this many seconds (host default applies otherwise)
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Bridge tuning shared by all subcommands
#[derive(Args, Default)]
pub struct CommonArgs {
    /// Give up waiting for the host after this many seconds
    #[arg(long, global = true)]
    pub wait_secs: Option<u64>,

    /// Evict requests still unanswered after this many seconds
    #[arg(long, global = true)]
    pub pending_ttl_secs: Option<u64>,

    /// Largest inbound message accepted, in bytes
    #[arg(long, global = true)]
    pub max_message_len: Option<usize>,
}
