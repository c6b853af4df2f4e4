use clap::{Parser, Subcommand};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::{
    admin::AdminCommands,
    dev::DevArgs,
    error::{ObservabilitySnafu, Result},
    push::PushArgs,
};

mod admin;
mod config;
mod dev;
mod error;
mod push;
mod remote;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Bulk ingestion into a sharded document cluster")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an in-memory cluster in development mode
    Dev {
        #[clap(flatten)]
        inner: DevArgs,
    },
    /// Interact with the cluster admin API
    Admin {
        #[command(subcommand)]
        inner: AdminCommands,
    },
    /// Push documents to an index
    Push {
        #[clap(flatten)]
        inner: PushArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    sluice_observability::init_observability(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    )
    .context(ObservabilitySnafu {})?;

    let ct = CancellationToken::new();

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ct_clone.cancel();
    });

    let result = match cli.command {
        Commands::Dev { inner } => inner.run(ct).await,
        Commands::Admin { inner } => inner.run(ct).await,
        Commands::Push { inner } => inner.run(ct).await,
    };

    if let Err(err) = &result {
        let code = err.kind().exit_code();
        eprintln!("Error: {err}");
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(code);
    }

    result
}
