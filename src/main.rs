//! datapushgateway
//!
//! Usage:
//!     datapushgateway --auth.file auth.yaml --port :9092 -d data

use clap::Parser;

use datapushgateway::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    datapushgateway::init_tracing(args.debug);

    datapushgateway::run(args).await?;
    Ok(())
}
