//! keyholder-proxy - group-based authorization proxy for an SSH agent socket

use anyhow::Result;
use clap::Parser;

use keyholder_proxy::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    keyholder_proxy::logging::init(cli.verbose, cli.quiet);

    keyholder_proxy::cli::run::execute(cli).await
}
