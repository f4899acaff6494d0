//! Region list input and JSON artifact output.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use crate::model::{AggregateDataset, PriceObservation, RegionId};
use crate::Result;

pub const REGION_PRICES_FILE: &str = "prices_by_region.json";
pub const FLAT_PRICES_FILE: &str = "prices.json";
pub const PHARMACIES_FILE: &str = "pharmacies.json";
pub const PRODUCTS_FILE: &str = "products.json";

#[derive(Deserialize)]
struct RegionRow {
    id_ubigeo: u32,
}

/// Reads the region ids from a JSON array of `{"id_ubigeo": ..}` records.
/// Repeated ids are kept once, in first-seen order.
pub async fn load_regions(path: &Path) -> Result<Vec<RegionId>> {
    let bytes = fs::read(path).await?;
    let rows: Vec<RegionRow> = serde_json::from_slice(&bytes)?;

    let mut seen = HashSet::new();
    let regions: Vec<_> = rows
        .into_iter()
        .map(|row| RegionId(row.id_ubigeo))
        .filter(|region| seen.insert(*region))
        .collect();
    Ok(regions)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Layout {
    /// Also write every observation as one flat list.
    pub flat: bool,
    pub pretty: bool,
}

#[derive(Serialize)]
struct RegionPrices<'a> {
    id_ubigeo: RegionId,
    data: Vec<&'a PriceObservation>,
}

/// Observations of one region ordered by (product, pharmacy).
fn sorted_observations(dataset: &AggregateDataset) -> Vec<RegionPrices<'_>> {
    dataset
        .regions
        .iter()
        .map(|(region, observations)| {
            let mut data: Vec<_> = observations.values().collect();
            data.sort_by(|a, b| (a.product_id, &a.pharmacy_id).cmp(&(b.product_id, &b.pharmacy_id)));
            RegionPrices {
                id_ubigeo: *region,
                data,
            }
        })
        .collect()
}

/// Writes the dataset artifacts into `dir`.
pub async fn write_dataset(dir: &Path, dataset: &AggregateDataset, layout: Layout) -> Result<()> {
    fs::create_dir_all(dir).await?;

    let by_region = sorted_observations(dataset);
    write_json(&dir.join(REGION_PRICES_FILE), &by_region, layout.pretty).await?;

    if layout.flat {
        let flat: Vec<_> = by_region.iter().flat_map(|r| r.data.iter().copied()).collect();
        write_json(&dir.join(FLAT_PRICES_FILE), &flat, layout.pretty).await?;
    }

    // BTreeMap views keep the files stable between runs.
    let pharmacies: BTreeMap<_, _> = dataset.pharmacies.iter().collect();
    write_json(&dir.join(PHARMACIES_FILE), &pharmacies, layout.pretty).await?;
    let products: BTreeMap<_, _> = dataset.products.iter().collect();
    write_json(&dir.join(PRODUCTS_FILE), &products, layout.pretty).await?;
    Ok(())
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    let mut file = fs::File::create(path).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::*;
    use crate::model::{PharmacyRecord, ProductRecord, RegionResult};

    #[tokio::test]
    async fn regions_are_loaded_once_each() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ubigeos.json");
        std::fs::write(
            &path,
            json!([
                {"id_ubigeo": 150101, "nombre": "LIMA"},
                {"id_ubigeo": 40101},
                {"id_ubigeo": 150101}
            ])
            .to_string(),
        )
        .unwrap();

        let regions = load_regions(&path).await.unwrap();

        assert_eq!(regions, vec![RegionId(150101), RegionId(40101)]);
    }

    #[tokio::test]
    async fn malformed_region_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ubigeos.json");
        std::fs::write(&path, r#"[{"id": 1}]"#).unwrap();

        assert!(load_regions(&path).await.is_err());
        assert!(load_regions(&dir.path().join("missing.json")).await.is_err());
    }

    #[tokio::test]
    async fn dataset_is_written_as_json_artifacts() {
        let pharmacy = Arc::new(PharmacyRecord {
            name: "BOTICA SOL".into(),
            ..PharmacyRecord::placeholder("F1")
        });
        let product = Arc::new(ProductRecord {
            id: 9,
            generic_name: "PARACETAMOL".into(),
            ..Default::default()
        });
        let mut region = RegionResult::empty(RegionId(150101));
        region.pharmacies.insert("F1".into(), pharmacy.clone());
        region.products.insert(9, product.clone());
        region.observations.insert(
            (9, "F1".into()),
            PriceObservation {
                product_id: 9,
                pharmacy_id: "F1".into(),
                price: 4.2,
                product,
                pharmacy,
            },
        );
        let mut dataset = AggregateDataset::default();
        dataset.merge_region(region);

        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &dataset, Layout { flat: true, pretty: false }).await.unwrap();

        let read = |name: &str| -> Value {
            serde_json::from_slice(&std::fs::read(dir.path().join(name)).unwrap()).unwrap()
        };
        let by_region = read(REGION_PRICES_FILE);
        assert_eq!(by_region[0]["id_ubigeo"], 150101);
        assert_eq!(by_region[0]["data"][0]["precio"], 4.2);
        assert_eq!(by_region[0]["data"][0]["drugstore"]["nombre"], "BOTICA SOL");
        assert_eq!(by_region[0]["data"][0]["Product"]["nombre"], "PARACETAMOL");
        assert_eq!(read(FLAT_PRICES_FILE).as_array().unwrap().len(), 1);
        assert_eq!(read(PHARMACIES_FILE)["F1"]["codigo"], "F1");
        assert_eq!(read(PRODUCTS_FILE)["9"]["codprod"], 9);
    }
}
