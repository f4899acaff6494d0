use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::model::{PriceObservation, ProductName, RegionId, RegionResult};
use crate::pages::fetch_prices;
use crate::progress::Progress;
use crate::request::CatalogClient;
use crate::resolve::{resolve, EntityCache};
use crate::Result;

/// Collects every price in `region` for each of `names`.
///
/// Names are searched one after the other. A pair whose pages or lookups fail
/// is logged, counted and skipped; the worker always produces a result.
pub async fn run_region(
    client: CatalogClient,
    region: RegionId,
    names: Arc<[ProductName]>,
    progress: Progress,
) -> RegionResult {
    let mut cache = EntityCache::new();
    let mut result = RegionResult::empty(region);

    for name in names.iter() {
        match collect_pair(&client, name, region, &mut cache, &progress).await {
            Ok(observations) => {
                debug!(%region, %name, entries = observations.len(), "collected pair");
                for observation in observations {
                    // Same price surfacing under another name: last write wins.
                    result.observations.insert(observation.key(), observation);
                }
            }
            Err(err) => {
                warn!(%region, %name, error = %err, "skipping pair");
                result.failed_pairs += 1;
            }
        }
    }

    let (pharmacies, products) = cache.into_parts();
    result.pharmacies = pharmacies;
    result.products = products;
    info!(
        %region,
        observations = result.observations.len(),
        pharmacies = result.pharmacies.len(),
        products = result.products.len(),
        failed_pairs = result.failed_pairs,
        "region done"
    );
    result
}

/// All observations for one (name, region) pair, or nothing if any step fails.
/// `progress` counts every resolved entry, even in a pair that fails later.
async fn collect_pair(
    client: &CatalogClient,
    name: &ProductName,
    region: RegionId,
    cache: &mut EntityCache,
    progress: &Progress,
) -> Result<Vec<PriceObservation>> {
    let entries = fetch_prices(client, name, region).await?;
    let mut observations = Vec::with_capacity(entries.len());
    for entry in &entries {
        let (pharmacy, product) = resolve(client, entry, cache).await?;
        observations.push(PriceObservation::new(entry, pharmacy, product));
        progress.inc();
    }
    Ok(observations)
}
