//! Command line entry point for logship.
//!
//! `logship rx` collects shipped logs into a storage directory, `logship tx`
//! ships every file matching a glob to a collector.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod commands;
mod error;

use error::Result;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use logship_protocol::DEFAULT_PORT;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "logship")]
#[command(about = "Ship growing log files to a remote collector")]
#[command(version)]
struct Cli {
    /// Port the receiver listens on
    #[arg(long, global = true, default_value_t = DEFAULT_PORT, env = "LOGSHIP_PORT")]
    port: u16,

    /// Connection timeout in seconds
    #[arg(long, global = true, default_value_t = 60, env = "LOGSHIP_TIMEOUT")]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value_t = Level::INFO, env = "LOGSHIP_LOG_LEVEL")]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Receive shipped logs and append them under the storage path
    Rx(Box<RxArgs>),

    /// Ship files matching a glob pattern to a receiver
    Tx(Box<TxArgs>),
}

#[derive(clap::Args, Debug)]
struct RxArgs {
    /// Host name or address to listen on
    #[arg(long, default_value = "localhost", env = "LOGSHIP_BIND_HOST")]
    bind_host: String,

    /// Listen backlog
    #[arg(long, default_value_t = 5, env = "LOGSHIP_SOCKET_QUEUE_LENGTH")]
    socket_queue_length: u32,

    /// Directory the received files are written to
    #[arg(long, default_value = "/var/tmp/logship", env = "LOGSHIP_STORAGE_PATH")]
    storage_path: PathBuf,

    /// Prefix stored file names with the sender's address
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        env = "LOGSHIP_HOST_IN_FILENAME"
    )]
    host_in_filename: bool,
}

#[derive(clap::Args, Debug)]
struct TxArgs {
    /// Receiver host name or address
    #[arg(long, env = "LOGSHIP_HOST")]
    host: String,

    /// Glob pattern selecting the files to ship
    #[arg(long, env = "LOGSHIP_GLOB")]
    glob: String,

    /// Seconds between scans of the glob pattern
    #[arg(long, default_value_t = 1, env = "LOGSHIP_RESCAN_INTERVAL")]
    rescan_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    match cli.command {
        Commands::Rx(args) => commands::rx(*args, cli.port).await,
        Commands::Tx(args) => commands::tx(*args, cli.port, cli.timeout).await,
    }
}
