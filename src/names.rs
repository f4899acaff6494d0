use std::collections::BTreeSet;

use serde_json::json;
use tracing::{debug, info};

use crate::model::ProductName;
use crate::request::{CatalogClient, Endpoint};
use crate::Result;

/// Asks the autocomplete endpoint for every product name once and returns the
/// normalized, deduplicated search terms.
pub async fn list_names(client: &CatalogClient) -> Result<BTreeSet<ProductName>> {
    let raw = client.post(Endpoint::Autocomplete, &json!({ "prefix": "" })).await?;

    let names: BTreeSet<_> = raw.iter().filter_map(|s| ProductName::parse(s)).collect();
    debug!(dropped = raw.len() - names.len(), "normalized autocomplete names");
    info!(raw = raw.len(), unique = names.len(), "enumerated product names");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client, envelope, StubTransport};
    use crate::{Error, SendError};

    #[tokio::test]
    async fn names_are_normalized_and_deduplicated() {
        let stub = StubTransport::new(|_, _, _| {
            Ok(envelope(&[
                "\"ACETAMINOFEN - 500MG\"".to_string(),
                "ACETAMINOFEN - 1G".to_string(),
                "ABC".to_string(),
                "IBUPROFENO".to_string(),
            ]))
        });

        let names = list_names(&client(&stub)).await.unwrap();

        let names: Vec<_> = names.iter().map(ProductName::as_str).collect();
        assert_eq!(names, vec!["ACETAMINOFEN", "IBUPROFENO"]);
        assert_eq!(stub.calls(Endpoint::Autocomplete), 1);
        assert_eq!(stub.requests(Endpoint::Autocomplete)[0], json!({ "prefix": "" }));
    }

    #[tokio::test]
    async fn enumeration_failure_is_propagated() {
        let stub = StubTransport::new(|_, _, _| Err(SendError::Rejected("403".into())));

        let err = list_names(&client(&stub)).await.unwrap_err();

        assert!(matches!(err, Error::Transport { endpoint: Endpoint::Autocomplete, .. }));
    }
}
