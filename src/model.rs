//! Records exchanged between the collection stages.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{MIN_NAME_LEN, NAME_SEPARATOR};

pub type PharmacyId = String;
pub type ProductId = i64;
/// A price observation is unique per (product, pharmacy) within a region.
pub type ObservationKey = (ProductId, PharmacyId);

/// Upstream geography code (ubigeo) scoping a price search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized search term taken from the autocomplete list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductName(String);

impl ProductName {
    /// Keeps the part before the first separator, drops quote characters and
    /// surrounding whitespace. Returns `None` for names that end up too short.
    pub fn parse(raw: &str) -> Option<Self> {
        let head = raw.split(NAME_SEPARATOR).next().unwrap_or_default();
        let name = head.replace('"', "");
        let name = name.trim();
        if name.chars().count() < MIN_NAME_LEN {
            return None;
        }
        Some(ProductName(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upstream sends `null` for blank text fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

/// One row of a price-search page.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPriceEntry {
    #[serde(rename = "codigo", default, deserialize_with = "lenient_string")]
    pub pharmacy_id: PharmacyId,
    #[serde(rename = "codprod")]
    pub product_id: ProductId,
    #[serde(rename = "precio", default, deserialize_with = "lenient_f64")]
    pub price: f64,
    #[serde(rename = "nombre", default, deserialize_with = "lenient_string")]
    pub generic_name: String,
    #[serde(rename = "laboratorio", default, deserialize_with = "lenient_string")]
    pub laboratory: String,
    #[serde(rename = "fecha", default, deserialize_with = "lenient_string")]
    pub updated_at: String,
    #[serde(rename = "setcodigo", default, deserialize_with = "lenient_string")]
    pub sector: String,
    #[serde(rename = "regsan", default, deserialize_with = "lenient_string")]
    pub health_registry: String,
    #[serde(flatten)]
    pub detail: ProductDetail,
}

/// Descriptive product fields. Partially populated on price entries, filled in
/// by the detail lookup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProductDetail {
    #[serde(rename = "b", default, deserialize_with = "lenient_string")]
    pub market_name: String,
    #[serde(rename = "c", default, deserialize_with = "lenient_string")]
    pub concentration: String,
    #[serde(rename = "d", default, deserialize_with = "lenient_string")]
    pub form: String,
    #[serde(rename = "f", default, deserialize_with = "lenient_string")]
    pub presentation: String,
    #[serde(rename = "k", default, deserialize_with = "lenient_string")]
    pub manufacturer: String,
    #[serde(rename = "l", default, deserialize_with = "lenient_string")]
    pub search_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PharmacyRecord {
    #[serde(rename = "codigo", default)]
    pub id: PharmacyId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ruc: String,
    #[serde(rename = "nombre", default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "direccion", default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(rename = "ubicacion", default, deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(rename = "tipo", default, deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(rename = "telefono", default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(rename = "horario", default, deserialize_with = "lenient_string")]
    pub open_hours: String,
}

impl PharmacyRecord {
    /// Stand-in for a pharmacy the detail endpoint knows nothing about.
    pub fn placeholder(id: &str) -> Self {
        PharmacyRecord {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename = "codprod")]
    pub id: ProductId,
    #[serde(rename = "nombre")]
    pub generic_name: String,
    #[serde(rename = "laboratorio")]
    pub laboratory: String,
    #[serde(rename = "regsan")]
    pub health_registry: String,
    #[serde(rename = "setcodigo")]
    pub sector: String,
    #[serde(rename = "fecha")]
    pub updated_at: String,
    #[serde(flatten)]
    pub detail: ProductDetail,
}

impl ProductRecord {
    /// Product as far as the price entry describes it. This is also the
    /// placeholder kept when the detail lookup returns no product.
    pub fn from_entry(entry: &RawPriceEntry) -> Self {
        ProductRecord {
            id: entry.product_id,
            generic_name: entry.generic_name.clone(),
            laboratory: entry.laboratory.clone(),
            health_registry: entry.health_registry.clone(),
            sector: entry.sector.clone(),
            updated_at: entry.updated_at.clone(),
            detail: entry.detail.clone(),
        }
    }

    /// Only the descriptive fields are taken from the detail lookup.
    pub fn with_detail(mut self, detail: ProductDetail) -> Self {
        self.detail = detail;
        self
    }
}

/// A price offered by one pharmacy for one product.
#[derive(Debug, Clone, Serialize)]
pub struct PriceObservation {
    #[serde(skip)]
    pub product_id: ProductId,
    #[serde(skip)]
    pub pharmacy_id: PharmacyId,
    #[serde(rename = "precio")]
    pub price: f64,
    #[serde(rename = "Product")]
    pub product: Arc<ProductRecord>,
    #[serde(rename = "drugstore")]
    pub pharmacy: Arc<PharmacyRecord>,
}

impl PriceObservation {
    pub fn new(entry: &RawPriceEntry, pharmacy: Arc<PharmacyRecord>, product: Arc<ProductRecord>) -> Self {
        PriceObservation {
            product_id: entry.product_id,
            pharmacy_id: entry.pharmacy_id.clone(),
            price: entry.price,
            product,
            pharmacy,
        }
    }

    pub fn key(&self) -> ObservationKey {
        (self.product_id, self.pharmacy_id.clone())
    }
}

/// Everything one region worker collected. Its caches are handed over as-is.
#[derive(Debug, Clone)]
pub struct RegionResult {
    pub region: RegionId,
    pub pharmacies: HashMap<PharmacyId, Arc<PharmacyRecord>>,
    pub products: HashMap<ProductId, Arc<ProductRecord>>,
    pub observations: HashMap<ObservationKey, PriceObservation>,
    /// (name, region) pairs skipped because a request or decode failed.
    pub failed_pairs: usize,
}

impl RegionResult {
    pub fn empty(region: RegionId) -> Self {
        RegionResult {
            region,
            pharmacies: HashMap::new(),
            products: HashMap::new(),
            observations: HashMap::new(),
            failed_pairs: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateDataset {
    pub regions: BTreeMap<RegionId, HashMap<ObservationKey, PriceObservation>>,
    pub pharmacies: HashMap<PharmacyId, Arc<PharmacyRecord>>,
    pub products: HashMap<ProductId, Arc<ProductRecord>>,
    pub failed_pairs: usize,
}

impl AggregateDataset {
    /// Folds one region into the dataset. Entities are merged last-write-wins
    /// on their identifier; every resolution of an identifier yields the same record.
    pub fn merge_region(&mut self, result: RegionResult) {
        self.pharmacies.extend(result.pharmacies);
        self.products.extend(result.products);
        self.failed_pairs += result.failed_pairs;
        self.regions
            .entry(result.region)
            .or_default()
            .extend(result.observations);
    }

    pub fn observation_count(&self) -> usize {
        self.regions.values().map(HashMap::len).sum()
    }
}
