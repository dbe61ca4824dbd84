use clap::Parser;
use kubesage::cli::Cli;
use std::process;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> kubesage::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping analysis");
            on_interrupt.cancel();
        }
    });

    kubesage::run_command(cli.command, &cli.global, cancel).await
}
