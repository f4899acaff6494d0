use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::model::{PharmacyId, PharmacyRecord, ProductId, ProductRecord, RawPriceEntry};
use crate::request::{CatalogClient, Endpoint};
use crate::{parse, Result};

/// Resolved pharmacies and products, owned by a single region worker.
#[derive(Debug, Default)]
pub struct EntityCache {
    pharmacies: HashMap<PharmacyId, Arc<PharmacyRecord>>,
    products: HashMap<ProductId, Arc<ProductRecord>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, entry: &RawPriceEntry) -> Option<(Arc<PharmacyRecord>, Arc<ProductRecord>)> {
        let pharmacy = self.pharmacies.get(&entry.pharmacy_id)?;
        let product = self.products.get(&entry.product_id)?;
        Some((pharmacy.clone(), product.clone()))
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.pharmacies.len(), self.products.len())
    }

    pub fn into_parts(self) -> (HashMap<PharmacyId, Arc<PharmacyRecord>>, HashMap<ProductId, Arc<ProductRecord>>) {
        (self.pharmacies, self.products)
    }
}

/// Resolves the pharmacy and product an entry refers to.
///
/// Served from `cache` when both are known. Otherwise one detail lookup is made
/// and its outcome cached, including placeholders for whatever the upstream
/// didn't describe, so an identifier is looked up at most once per cache.
/// The product keeps the entry's own fields and takes only the descriptive
/// fields from the lookup.
pub async fn resolve(
    client: &CatalogClient,
    entry: &RawPriceEntry,
    cache: &mut EntityCache,
) -> Result<(Arc<PharmacyRecord>, Arc<ProductRecord>)> {
    if let Some(hit) = cache.lookup(entry) {
        return Ok(hit);
    }

    let body = json!({ "cod_estab": entry.pharmacy_id, "cod_prod": entry.product_id });
    let fragments = client.post(Endpoint::Detail, &body).await?;
    let (pharmacy, detail) = parse::detail(&fragments)?;

    let pharmacy = cache
        .pharmacies
        .entry(entry.pharmacy_id.clone())
        .or_insert_with(|| {
            let mut pharmacy = pharmacy.unwrap_or_else(|| {
                debug!(pharmacy = %entry.pharmacy_id, "no pharmacy detail, using placeholder");
                PharmacyRecord::default()
            });
            pharmacy.id = entry.pharmacy_id.clone();
            Arc::new(pharmacy)
        })
        .clone();

    let product = cache
        .products
        .entry(entry.product_id)
        .or_insert_with(|| {
            let product = ProductRecord::from_entry(entry);
            Arc::new(match detail {
                Some(detail) => product.with_detail(detail),
                None => {
                    debug!(product = entry.product_id, "no product detail, using placeholder");
                    product
                }
            })
        })
        .clone();

    Ok((pharmacy, product))
}
