use serde::Deserialize;
use serde_json::Value;

use crate::model::{PharmacyRecord, ProductDetail, RawPriceEntry};
use crate::request::Endpoint;
use crate::{Error, Result, ENVELOPE_FIELD, PAGE_COUNT_FIELD};

#[derive(Deserialize)]
struct Envelope {
    d: Option<Vec<String>>,
}

/// Unwraps the `d` envelope every endpoint answers with.
/// The fragments themselves are still JSON-encoded strings.
pub(crate) fn envelope(endpoint: Endpoint, body: &str) -> Result<Vec<String>> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| Error::decode(format!("{endpoint} response"), e))?;
    envelope.d.ok_or_else(|| {
        Error::decode(
            format!("{endpoint} response"),
            format!("missing envelope field `{ENVELOPE_FIELD}`"),
        )
    })
}

/// Decodes one price-search page into its entries and the total page count, if present.
pub(crate) fn price_page(fragments: &[String]) -> Result<(Vec<RawPriceEntry>, Option<u32>)> {
    let entries = fragment(fragments, 0, "price entries")?;
    let entries = if entries.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(entries).map_err(|e| Error::decode("price entries", e))?
    };
    let total = fragments.get(1).map(String::as_str).and_then(total_pages);
    Ok((entries, total))
}

/// Reads the total page count from the page metadata fragment. Anything
/// unexpected yields `None`, which the caller treats as "this is the last page".
pub(crate) fn total_pages(meta: &str) -> Option<u32> {
    let meta: Value = serde_json::from_str(meta).ok()?;
    let meta = match &meta {
        Value::Array(items) => items.first()?,
        other => other,
    };
    match meta.get(PAGE_COUNT_FIELD)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Decodes a detail lookup into the pharmacy and the first product detail.
/// Either may be missing when the upstream has nothing for the identifier;
/// absent or blank fragments count as nothing.
pub(crate) fn detail(fragments: &[String]) -> Result<(Option<PharmacyRecord>, Option<ProductDetail>)> {
    let pharmacy = match fragments.first().map(|s| s.trim()) {
        None | Some("") => Value::Null,
        Some(pharmacy) => serde_json::from_str(pharmacy).map_err(|e| Error::decode("pharmacy detail", e))?,
    };
    let pharmacy = match pharmacy {
        Value::Array(items) => items.into_iter().next(),
        Value::Null => None,
        other => Some(other),
    };
    let pharmacy = pharmacy
        .map(serde_json::from_value::<PharmacyRecord>)
        .transpose()
        .map_err(|e| Error::decode("pharmacy detail", e))?;

    let products = match fragments.get(1).map(|s| s.trim()) {
        None | Some("") => Vec::new(),
        Some(products) => serde_json::from_str::<Vec<ProductDetail>>(products)
            .map_err(|e| Error::decode("product detail", e))?,
    };

    Ok((pharmacy, products.into_iter().next()))
}

#[inline]
fn fragment<'a>(fragments: &'a [String], index: usize, what: &str) -> Result<&'a str> {
    fragments
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| Error::decode(what, format!("envelope has no fragment #{index}")))
}
