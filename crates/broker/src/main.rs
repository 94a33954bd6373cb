// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use alarm_broker::config::BrokerConfig;

#[derive(Parser)]
#[command(name = "alarm-broker", version, about = "Silent-emergency alarm broker.")]
struct Cli {
    #[command(subcommand)]
    subcommand: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the HTTP front-end.
    Serve(ServeArgs),
    /// Run the notification/escalation worker.
    Work(ServeArgs),
}

#[derive(clap::Args)]
struct ServeArgs {
    #[command(flatten)]
    config: BrokerConfig,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.subcommand {
        Commands::Serve(args) => alarm_broker::run_server(args.config).await,
        Commands::Work(args) => alarm_broker::run_worker(args.config).await,
    };

    if let Err(e) = result {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
