use std::path::PathBuf;

use clap::Parser;
use gdps_newrate::{config::Config, server};

#[derive(Parser)]
struct Opts {
    /// TOML config file.  All keys are optional.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the port in the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    let mut config = Config::load(opts.config)?;
    if let Some(port) = opts.port {
        config.port = port;
    }
    server::run(config).await
}
