use serde_json::{json, Value};
use tracing::debug;

use crate::model::{ProductName, RawPriceEntry, RegionId};
use crate::request::{CatalogClient, Endpoint};
use crate::{parse, Result};

/// Request body for one page of the price search.
fn page_request(name: &ProductName, region: RegionId, page: u32) -> Value {
    json!({
        "typeup": "FARMACIA",
        "tipo": "M",
        "nomprod": name.as_str(),
        "ubigeo": region.to_string(),
        "type": "0",
        "labotarorio": "",
        "establecimiento": "",
        "pag": page,
    })
}

/// Walks every result page for `name` in `region` and returns all entries in page order.
///
/// Pages are requested one after the other until the reported page count is
/// reached. A missing or unreadable page count ends the walk on the current page.
/// Any failed page fails the whole pair; earlier pages are discarded.
pub async fn fetch_prices(client: &CatalogClient, name: &ProductName, region: RegionId) -> Result<Vec<RawPriceEntry>> {
    let mut entries = Vec::new();
    let mut page = 1;

    loop {
        let fragments = client.post(Endpoint::PriceSearch, &page_request(name, region, page)).await?;
        let (mut batch, total) = parse::price_page(&fragments)?;
        debug!(%name, %region, page, ?total, entries = batch.len(), "fetched price page");
        entries.append(&mut batch);

        match total {
            Some(total) if page < total => page += 1,
            _ => break,
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client, envelope, price_page, StubTransport};
    use crate::{Error, SendError};

    fn name() -> ProductName {
        ProductName::parse("AMOXICILINA").unwrap()
    }

    fn entry(pharmacy: &str, product: i64) -> Value {
        json!({ "codigo": pharmacy, "codprod": product, "precio": 1.0 })
    }

    #[tokio::test]
    async fn walks_every_page_in_order() {
        let stub = StubTransport::new(|_, body, _| {
            let page = body["pag"].as_u64().unwrap();
            Ok(price_page(json!([entry(&format!("F{page}"), 1)]), 3))
        });

        let entries = fetch_prices(&client(&stub), &name(), RegionId(150101)).await.unwrap();

        let pharmacies: Vec<_> = entries.iter().map(|e| e.pharmacy_id.as_str()).collect();
        assert_eq!(pharmacies, vec!["F1", "F2", "F3"]);
        assert_eq!(stub.calls(Endpoint::PriceSearch), 3);

        let first = &stub.requests(Endpoint::PriceSearch)[0];
        assert_eq!(first["nomprod"], "AMOXICILINA");
        assert_eq!(first["ubigeo"], "150101");
        assert_eq!(first["typeup"], "FARMACIA");
        assert_eq!(first["pag"], 1);
    }

    #[tokio::test]
    async fn missing_page_count_stops_after_first_page() {
        let stub = StubTransport::new(|_, _, _| Ok(envelope(&[json!([entry("F1", 1)]).to_string()])));

        let entries = fetch_prices(&client(&stub), &name(), RegionId(1)).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(stub.calls(Endpoint::PriceSearch), 1);
    }

    #[tokio::test]
    async fn unreadable_page_count_stops_after_first_page() {
        let stub = StubTransport::new(|_, _, _| {
            Ok(envelope(&[json!([]).to_string(), "garbage".to_string()]))
        });

        let entries = fetch_prices(&client(&stub), &name(), RegionId(1)).await.unwrap();

        assert!(entries.is_empty());
        assert_eq!(stub.calls(Endpoint::PriceSearch), 1);
    }

    #[tokio::test]
    async fn failed_page_fails_the_pair() {
        let stub = StubTransport::new(|_, body, _| {
            if body["pag"] == 2 {
                Err(SendError::Rejected("500".into()))
            } else {
                Ok(price_page(json!([entry("F1", 1)]), 3))
            }
        });

        let err = fetch_prices(&client(&stub), &name(), RegionId(1)).await.unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(stub.calls(Endpoint::PriceSearch), 2);
    }
}
