use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::request::RetryPolicy;
use crate::store::Layout;
use crate::DEFAULT_BASE_URL;

#[derive(Debug, Parser)]
#[command(name = "pharmascrap")]
#[command(about = "Collect medicine prices offered by pharmacies in every region")]
pub struct Config {
    /// JSON list of regions, each record carrying an `id_ubigeo`.
    #[arg(long, default_value = "ubigeos.json")]
    pub regions: PathBuf,

    /// Directory the JSON artifacts are written to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Catalog host.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Retries per request after the first attempt.
    #[arg(long, default_value_t = 10)]
    pub max_retries: u32,

    #[arg(long, default_value_t = 1000)]
    pub min_backoff_ms: u64,

    #[arg(long, default_value_t = 30_000)]
    pub max_backoff_ms: u64,

    /// Per-request timeout.
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Only search for the first N product names.
    #[arg(long)]
    pub max_names: Option<usize>,

    /// Also write all observations as a single flat list.
    #[arg(long, default_value_t = false)]
    pub flat: bool,

    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            min_backoff: Duration::from_millis(self.min_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.min_backoff_ms)),
        }
    }

    pub fn layout(&self) -> Layout {
        Layout {
            flat: self.flat,
            pretty: self.pretty,
        }
    }
}
