use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use indicatif::ProgressBar;
use tokio::{sync::mpsc, task::JoinSet};
use tracing::warn;

use crate::config::Config;
use crate::model::{AggregateDataset, ProductName, RegionId, RegionResult};
use crate::names::list_names;
use crate::progress::{progress_bar, Progress, Reporter};
use crate::request::{CatalogClient, HttpTransport};
use crate::worker::run_region;
use crate::{info_time, store, Error, Result};

/// Runs the whole collection: regions file in, JSON artifacts out.
pub async fn process_site(config: &Config) -> Result<()> {
    let start_time = Local::now();
    let transport = HttpTransport::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
    let client = CatalogClient::new(Arc::new(transport), config.retry_policy());

    let regions = store::load_regions(&config.regions).await?;
    info_time!("Loaded {} regions from {}", regions.len(), config.regions.display());

    let mut names = list_names(&client).await?;
    if let Some(max) = config.max_names {
        names = names.into_iter().take(max).collect();
    }
    info_time!(start_time, "Enumerated {} product names.", names.len());
    if names.is_empty() {
        warn!("no product names to search for, the dataset will be empty");
    }

    let estimate = (regions.len() * names.len()) as u64;
    let bar = if config.no_progress {
        ProgressBar::hidden()
    } else {
        progress_bar(estimate)
    };

    let collect_time = Local::now();
    let dataset = collect(&client, &regions, &names, bar).await?;
    info_time!(
        collect_time,
        "Collected {} observations, {} pharmacies, {} products.",
        dataset.observation_count(),
        dataset.pharmacies.len(),
        dataset.products.len()
    );
    if dataset.failed_pairs > 0 {
        warn!(
            failed_pairs = dataset.failed_pairs,
            "some (name, region) pairs failed and are missing from the dataset"
        );
    }

    let write_time = Local::now();
    store::write_dataset(&config.output_dir, &dataset, config.layout()).await?;
    info_time!(write_time, "Wrote the results to {}", config.output_dir.display());

    Ok(())
}

/// Runs one worker per region concurrently and merges their results.
///
/// Progress is counted in processed price entries against an estimate of
/// `regions × names`. Returns once every region has handed over its result.
pub async fn collect(
    client: &CatalogClient,
    regions: &[RegionId],
    names: &BTreeSet<ProductName>,
    bar: ProgressBar,
) -> Result<AggregateDataset> {
    let names: Arc<[ProductName]> = names.iter().cloned().collect();
    let progress = Progress::new();
    let reporter = Reporter::spawn(progress.clone(), bar);

    let (result_tx, mut result_rx) = mpsc::channel::<RegionResult>(regions.len().max(1));
    let mut workers = JoinSet::new();
    for &region in regions {
        workers.spawn({
            let client = client.clone();
            let names = names.clone();
            let progress = progress.clone();
            let result_tx = result_tx.clone();
            async move {
                let result = run_region(client, region, names, progress).await;
                // The receiver outlives every worker.
                let _ = result_tx.send(result).await;
            }
        });
    }
    drop(result_tx);

    let mut dataset = AggregateDataset::default();
    let mut received = 0;
    while received < regions.len() {
        let Some(result) = result_rx.recv().await else {
            break;
        };
        dataset.merge_region(result);
        received += 1;
    }

    while let Some(joined) = workers.join_next().await {
        joined?;
    }
    reporter.finish(format!("{received}/{} regions", regions.len())).await;

    if received < regions.len() {
        return Err(Error::MissingRegionResults {
            expected: regions.len(),
            received,
        });
    }
    Ok(dataset)
}
