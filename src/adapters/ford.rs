//! Ford inventory.
//!
//! The Ford API is strict about what accompanies a request. Every inventory
//! call needs a dealer slug fetched up front, radius searches above 500
//! miles are rejected upstream, and the first page holds only 12 vehicles
//! while follow-up windows may span at most 90. Requests go out without a
//! caller User-Agent: the API sits behind a bot filter that tarpits forged
//! agents, so the client's own agent string is the one that works.
//!
//! Each page carries two arrays worth keeping: the vehicles themselves and
//! the per-page dealer filter items, so the merge extends both.

use serde_json::Value;

use super::fetch_json;
use crate::descriptor::RequestDescriptor;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{self, PageCount, PageOutcome, PageWindow, Paginator};
use crate::query::InventoryQuery;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://shop.ford.com";
const DEALERS_URI: &str = "/aemservices/cache/inventory/dealer/dealers";
const INVENTORY_URI: &str = "/aemservices/cache/inventory/dealer-lot";
const VIN_URI: &str = "/aemservices/cache/inventory/dealer/vehicle-details";

const FIRST_PAGE_SIZE: u64 = 12;
const PAGE_SIZE: u64 = 90;
const MAX_RADIUS: u32 = 500;

const VEHICLES_POINTER: &str = "/data/filterResults/ExactMatch/vehicles";
const DEALERS_POINTER: &str = "/data/filterSet/filterGroupsMap/Dealer/0/filterItemsMetadata/filterItems";

/// Upstream segment name for a model, required on every request.
fn segment(model: &str) -> Result<&'static str> {
    match model {
        "mache" => Ok("Crossover"),
        "f-150 lightning" => Ok("Truck"),
        other => Err(MotorcadeError::Unsupported(format!(
            "no Ford segment known for model {other:?}"
        ))),
    }
}

fn referer(model: &str) -> String {
    format!("https://shop.ford.com/inventory/{model}/")
}

/// Pagination strategy for the Ford dealer-lot API.
pub struct FordPager {
    query: InventoryQuery,
    segment: &'static str,
    dealer_slug: String,
}

impl FordPager {
    fn new(query: &InventoryQuery, segment: &'static str, dealer_slug: String) -> Self {
        Self {
            query: query.clone(),
            segment,
            dealer_slug,
        }
    }

    fn params(&self) -> Vec<(String, String)> {
        vec![
            ("make".into(), "Ford".into()),
            ("market".into(), "US".into()),
            ("inventoryType".into(), "Radius".into()),
            ("maxDealerCount".into(), "1".into()),
            ("model".into(), self.query.model.clone()),
            ("segment".into(), self.segment.into()),
            ("zipcode".into(), self.query.zip.clone()),
            ("dealerSlug".into(), self.dealer_slug.clone()),
            ("Radius".into(), self.query.radius.to_string()),
            ("Order".into(), "Distance".into()),
        ]
    }

    fn descriptor_with(&self, params: Vec<(String, String)>) -> RequestDescriptor {
        RequestDescriptor::get(INVENTORY_URI)
            .header("Referer", referer(&self.query.model))
            .query(params)
    }
}

impl Paginator for FordPager {
    fn first_page(&self) -> RequestDescriptor {
        self.descriptor_with(self.params())
    }

    fn first_page_size(&self) -> u64 {
        FIRST_PAGE_SIZE
    }

    fn page_size(&self) -> u64 {
        PAGE_SIZE
    }

    fn total_count(&self, first_page: &Value) -> Result<PageCount> {
        if first_page.pointer("/data/filterResults").is_none() {
            return Err(MotorcadeError::Malformed(format!(
                "Ford API answered without filter results: {}",
                first_page
                    .get("errorMessage")
                    .and_then(Value::as_str)
                    .unwrap_or("no error message")
            )));
        }
        first_page
            .pointer("/data/filterResults/ExactMatch/totalCount")
            .and_then(Value::as_u64)
            .map(PageCount::Total)
            .ok_or_else(|| super::missing("Ford", "/data/filterResults/ExactMatch/totalCount"))
    }

    fn descriptor(&self, window: &PageWindow) -> RequestDescriptor {
        let mut params = self.params();
        if let PageWindow::Range { begin, end } = window {
            params.push(("beginIndex".into(), begin.to_string()));
            params.push(("endIndex".into(), end.to_string()));
        }
        self.descriptor_with(params)
    }

    fn records_pointer(&self) -> &str {
        VEHICLES_POINTER
    }

    fn merge(&self, aggregate: &mut Value, mut page: Value) -> Result<()> {
        paginate::merge_records(aggregate, &mut page, VEHICLES_POINTER)?;
        // Dealer filter items ride along on each page; keep them when the
        // page has them, a page is still usable without.
        if page.pointer(DEALERS_POINTER).is_some() {
            let _ = paginate::merge_records(aggregate, &mut page, DEALERS_POINTER);
        }
        Ok(())
    }
}

/// Look up the dealer slug every inventory and detail call must carry.
async fn dealer_slug<T>(transport: &T, query: &InventoryQuery, segment: &'static str) -> Result<String>
where
    T: Transport + ?Sized,
{
    let descriptor = RequestDescriptor::get(DEALERS_URI)
        .header("Referer", referer(&query.model))
        .query([
            ("make", "Ford"),
            ("market", "US"),
            ("inventoryType", "Radius"),
            ("maxDealerCount", "1"),
            ("model", query.model.as_str()),
            ("segment", segment),
            ("zipcode", query.zip.as_str()),
        ])
        .error_for_status();
    let dealers = fetch_json(transport, &descriptor).await?;

    let succeeded = dealers
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|status| status.eq_ignore_ascii_case("success"));
    let slug = dealers
        .pointer("/data/firstFDDealerSlug")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if succeeded && !slug.is_empty() {
        Ok(slug.to_string())
    } else {
        Err(MotorcadeError::Malformed(format!(
            "Ford dealer lookup failed: {}",
            dealers
                .get("errorType")
                .and_then(Value::as_str)
                .unwrap_or("no dealer slug returned")
        )))
    }
}

/// Fetch and merge the full Ford inventory for a query.
///
/// The aggregate carries the dealer slug under `dealerSlug`; detail calls
/// made later need it.
pub async fn inventory<T>(transport: &T, query: &InventoryQuery) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    if query.radius > MAX_RADIUS {
        return Err(MotorcadeError::Unsupported(format!(
            "Ford searches support a radius of at most {MAX_RADIUS} miles, got {}",
            query.radius
        )));
    }
    let segment = segment(&query.model)?;
    let slug = dealer_slug(transport, query, segment).await?;

    let pager = FordPager::new(query, segment, slug.clone());
    match paginate::gather(transport, &pager).await? {
        PageOutcome::Empty => Ok(PageOutcome::Empty),
        PageOutcome::Merged(mut aggregate) => {
            aggregate.body["dealerSlug"] = Value::String(slug);
            Ok(PageOutcome::Merged(aggregate))
        }
    }
}

/// [`inventory`] over a transport opened for the scope of this call.
pub async fn fetch_inventory(query: &InventoryQuery) -> Result<PageOutcome> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    inventory(&transport, query).await
}

/// Everything a Ford vehicle-detail request has to carry.
#[derive(Debug, Clone)]
pub struct VinQuery {
    pub vin: String,
    pub zip: String,
    pub year: u16,
    pub model: String,
    pub dealer_slug: String,
    pub model_slug: String,
    pub pa_code: String,
}

/// Detail lookup for one VIN.
pub async fn vin_detail<T>(transport: &T, vin_query: &VinQuery) -> Result<Value>
where
    T: Transport + ?Sized,
{
    let referer = format!(
        "https://shop.ford.com/inventory/{}/results?zipcode={}&Radius=20&year={}&Order=Distance",
        vin_query.model, vin_query.zip, vin_query.year
    );
    let descriptor = RequestDescriptor::get(VIN_URI)
        .header("Referer", referer)
        .query([
            ("dealerSlug", vin_query.dealer_slug.as_str()),
            ("modelSlug", vin_query.model_slug.as_str()),
            ("vin", vin_query.vin.as_str()),
            ("make", "Ford"),
            ("market", "US"),
            ("requestTowingData", "undefined"),
            ("inventoryType", "Radius"),
            ("ownerPACode", vin_query.pa_code.as_str()),
            ("zipcode", vin_query.zip.as_str()),
        ]);
    fetch_json(transport, &descriptor).await
}

/// [`vin_detail`] over a transport opened for the scope of this call.
pub async fn fetch_vin_detail(vin_query: &VinQuery) -> Result<Value> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    vin_detail(&transport, vin_query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn query() -> InventoryQuery {
        InventoryQuery::new("48120", 2023, "mache", 200)
    }

    fn slug_response() -> Value {
        json!({"status": "Success", "data": {"firstFDDealerSlug": "aabbcc"}})
    }

    fn page(vehicles: Value, dealers: Value, total: u64) -> Value {
        json!({
            "data": {
                "filterResults": {"ExactMatch": {"totalCount": total, "vehicles": vehicles}},
                "filterSet": {"filterGroupsMap": {"Dealer": [
                    {"filterItemsMetadata": {"filterItems": dealers}}
                ]}}
            }
        })
    }

    #[tokio::test]
    async fn test_radius_above_500_is_unsupported() {
        let mock = MockTransport::new();
        let error = inventory(&mock, &InventoryQuery::new("48120", 2023, "mache", 501))
            .await
            .unwrap_err();
        assert!(matches!(error, MotorcadeError::Unsupported(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_model_is_unsupported() {
        let mock = MockTransport::new();
        let error = inventory(&mock, &InventoryQuery::new("48120", 2023, "bronco", 50))
            .await
            .unwrap_err();
        assert!(matches!(error, MotorcadeError::Unsupported(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_dealer_lookup_is_fatal() {
        let mock = MockTransport::new();
        mock.add_json(
            &format!("GET {DEALERS_URI}"),
            json!({"status": "error", "errorType": "NO_DEALERS"}),
        );

        let error = inventory(&mock, &query()).await.unwrap_err();
        assert!(matches!(error, MotorcadeError::Malformed(_)));
        assert_eq!(mock.calls_for(&format!("GET {INVENTORY_URI}")), 0);
    }

    #[tokio::test]
    async fn test_single_page_carries_dealer_slug() {
        let mock = MockTransport::new();
        mock.add_json(&format!("GET {DEALERS_URI}"), slug_response());
        mock.add_json(
            &format!("GET {INVENTORY_URI}"),
            page(json!(["v1"]), json!(["d1"]), 1),
        );

        let outcome = inventory(&mock, &query()).await.unwrap();
        let aggregate = outcome.merged().unwrap();
        assert_eq!(aggregate.body["dealerSlug"], "aabbcc");
        assert_eq!(
            aggregate.body.pointer(VEHICLES_POINTER).unwrap(),
            &json!(["v1"])
        );
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_pagination_merges_vehicles_and_dealers() {
        let mock = MockTransport::new();
        let inventory_route = format!("GET {INVENTORY_URI}");
        mock.add_json(&format!("GET {DEALERS_URI}"), slug_response());
        // 120 total: first page of 12, then [12,102) and [102,120).
        mock.add_json(&inventory_route, page(json!(["v1"]), json!(["d1"]), 120));
        mock.add_json(&inventory_route, page(json!(["v2"]), json!(["d2"]), 120));
        mock.add_json(&inventory_route, page(json!(["v3"]), json!(["d3"]), 120));

        let outcome = inventory(&mock, &query()).await.unwrap();
        let aggregate = outcome.merged().unwrap();
        assert_eq!(
            aggregate.body.pointer(VEHICLES_POINTER).unwrap(),
            &json!(["v1", "v2", "v3"])
        );
        assert_eq!(
            aggregate.body.pointer(DEALERS_POINTER).unwrap(),
            &json!(["d1", "d2", "d3"])
        );
        assert!(!aggregate.partial_failure);
        assert_eq!(mock.calls_for(&inventory_route), 3);
    }
}
