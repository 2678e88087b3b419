//! Command-line entry point: reads the input paths from the environment
//! and runs one mux to completion in the current directory.

use log::error;
use std::process;
use tsmux::{MuxerConfig, TsWriter};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    if let Err(err) = run().await {
        error!("mux failed: {}", err);
        process::exit(1);
    }
}

async fn run() -> tsmux::Result<()> {
    let config = MuxerConfig::from_env()?;
    let writer = TsWriter::open(config).await?;
    writer.run().await
}
