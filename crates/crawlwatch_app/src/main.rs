mod app;
mod cli;
mod config;
mod dashboard;
mod render;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run(cli::Cli::parse()).await
}
