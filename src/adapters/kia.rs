//! Kia inventory.
//!
//! POST JSON against the Kia inventory service. The response holds every
//! matching vehicle with full detail in one page, which is also why Kia has
//! no separate VIN endpoint. A successful answer always carries
//! `inventoryVehicles`, even for zero vehicles.

use serde_json::json;

use super::fetch_json;
use crate::descriptor::RequestDescriptor;
use crate::error::Result;
use crate::paginate::{AggregateResult, PageOutcome};
use crate::query::InventoryQuery;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://www.kia.com";
const INVENTORY_URI: &str = "/us/services/en/inventory/initial";

/// Fetch the Kia inventory for a query. One page covers everything.
pub async fn inventory<T>(
    transport: &T,
    query: &InventoryQuery,
    user_agent: &str,
) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    let referer = format!(
        "https://www.kia.com/us/en/inventory/result?zipCode={}&seriesId={}&year={}",
        query.zip, query.model, query.year
    );
    let descriptor = RequestDescriptor::post(INVENTORY_URI)
        .header("User-Agent", user_agent)
        .header("referer", referer)
        .json(json!({
            "series": query.model,
            "year": query.year,
            "zipCode": query.zip,
            // Dealer stock and in transit.
            "status": ["DS", "IT"],
            "selectedRange": query.radius,
            "currentRange": query.radius
        }));
    let body = fetch_json(transport, &descriptor).await?;

    if body.get("inventoryVehicles").is_none() {
        return Err(super::missing("Kia", "/inventoryVehicles"));
    }
    Ok(PageOutcome::Merged(AggregateResult {
        body,
        partial_failure: false,
    }))
}

/// [`inventory`] over a transport opened for the scope of this call.
pub async fn fetch_inventory(query: &InventoryQuery, user_agent: &str) -> Result<PageOutcome> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    inventory(&transport, query, user_agent).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Payload;
    use crate::error::MotorcadeError;
    use crate::transport::MockTransport;
    use serde_json::Value;

    fn query() -> InventoryQuery {
        InventoryQuery::new("00501", 2023, "N", 125)
    }

    #[tokio::test]
    async fn test_post_body_carries_the_search() {
        let mock = MockTransport::new();
        mock.add_json(
            &format!("POST {INVENTORY_URI}"),
            json!({"inventoryVehicles": []}),
        );

        let outcome = inventory(&mock, &query(), "ua").await.unwrap();
        assert!(!outcome.merged().unwrap().partial_failure);

        let calls = mock.get_calls();
        let Payload::Json(body) = calls[0].payload() else {
            panic!("expected JSON payload");
        };
        assert_eq!(body["zipCode"], "00501");
        assert_eq!(body["series"], "N");
        assert_eq!(body["status"], json!(["DS", "IT"]));
        assert_eq!(body["selectedRange"], 125);
        assert!(
            calls[0]
                .header_value("referer")
                .unwrap()
                .contains("zipCode=00501")
        );
    }

    #[tokio::test]
    async fn test_missing_inventory_key_is_malformed() {
        let mock = MockTransport::new();
        mock.add_json(
            &format!("POST {INVENTORY_URI}"),
            json!({"errorCode": "E999"}),
        );

        let error = inventory(&mock, &query(), "ua").await.unwrap_err();
        assert!(matches!(error, MotorcadeError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_empty_inventory_is_still_a_complete_aggregate() {
        let mock = MockTransport::new();
        mock.add_json(
            &format!("POST {INVENTORY_URI}"),
            json!({"inventoryVehicles": []}),
        );

        let outcome = inventory(&mock, &query(), "ua").await.unwrap();
        let aggregate = outcome.merged().unwrap();
        assert_eq!(aggregate.body["inventoryVehicles"], Value::Array(vec![]));
    }
}
