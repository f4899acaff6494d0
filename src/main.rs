use chrono::Local;
use clap::Parser;
use pharmascrap::{config::Config, info_time, logging::init_logging, process::process_site, Result};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_logging();

    let start_time = Local::now();
    process_site(&config)
        .await
        .inspect_err(|err| error!(error = %err, "collection failed"))?;
    info_time!(start_time, "Full program time:");

    Ok(())
}
