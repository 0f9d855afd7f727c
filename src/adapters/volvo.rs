//! Volvo inventory.
//!
//! Two upstreams cooperate here: a dealer-locator API on `volvocars.com`
//! that turns coordinates into dealer ids, and a GraphQL inventory API on
//! `graph.volvocars.com` that takes those ids. The inventory API pages with
//! skip/take, 100 hits at a time. The graph origin serves a certificate
//! chain that does not verify, so its transport runs with TLS verification
//! off.

use serde_json::{Value, json};

use super::fetch_json;
use crate::descriptor::RequestDescriptor;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{self, PageCount, PageOutcome, PagePlan, PageWindow, Paginator};
use crate::query::InventoryQuery;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const DEALER_BASE_URL: &str = "https://www.volvocars.com";
pub const GRAPH_BASE_URL: &str = "https://graph.volvocars.com";
const DEALERS_URI: &str = "/api/inventory/retailers/locations";
const GRAPHQL_URI: &str = "/graphql";
const PAGE_SIZE: u64 = 100;

const TOTAL_POINTER: &str = "/data/stockCars/metadata/totalHits";
const HITS_POINTER: &str = "/data/stockCars/hits";

const LISTING_QUERY: &str = "query CarSelectorListingCars($filter: CLESearchFilterWithDistributionChannel!, $locale: String!) { stockCars(filter: $filter) { metadata { returnedHits totalHits } hits { vehicle { dealer { id } id vin modelYear specification { pno { pno12 pno34PlusOptions } model(locale: $locale) { displayName { value } } driveline { content(locale: $locale) { driveType { value } } } trim(locale: $locale) { displayName { value } } engine { content(locale: $locale) { engineCode fuelType { formatted value } displayName { value } engineType { formatted value } } } } configuration { color { code hex description { language text } } upholstery { code description { language text } } } price { msrpAmount } order { commonOrderNumber commonSalesType deliveryDate estimatedCustomerDeliveryLeadTimeUnit estimatedCustomerDeliveryLeadTime } } } }}";

/// Pagination strategy for the Volvo stock-car GraphQL API.
pub struct VolvoPager {
    dealer_ids: Vec<String>,
    user_agent: String,
}

impl VolvoPager {
    pub fn new(dealer_ids: Vec<String>, user_agent: &str) -> Self {
        Self {
            dealer_ids,
            user_agent: user_agent.to_string(),
        }
    }

    fn post_body(&self, skip: u64, take: u64) -> Value {
        let dealer_values: Vec<Value> = self
            .dealer_ids
            .iter()
            .map(|id| json!({"value": id}))
            .collect();
        json!({
            "operationName": "CarSelectorListingCars",
            "variables": {
                "filter": {
                    "skip": skip,
                    "take": take,
                    "filter": {
                        "value": {
                            "dealerId": {"value": dealer_values},
                            "available": {"value": [{"value": true}]},
                            "engineType": {"value": [{"value": "BEV"}]}
                        }
                    },
                    "sort": [{"field": "orderDeliveryDate", "desc": false}]
                },
                "locale": "en-US"
            },
            "query": LISTING_QUERY
        })
    }

    fn descriptor_with(&self, skip: u64, take: u64) -> RequestDescriptor {
        RequestDescriptor::post(GRAPHQL_URI)
            .header("User-Agent", &self.user_agent)
            .header("Referer", "https://www.volvocars.com/")
            .header("apollographql-client-name", "cle")
            .json(self.post_body(skip, take))
    }
}

impl Paginator for VolvoPager {
    fn first_page(&self) -> RequestDescriptor {
        self.descriptor_with(0, PAGE_SIZE)
    }

    fn page_size(&self) -> u64 {
        PAGE_SIZE
    }

    fn total_count(&self, first_page: &Value) -> Result<PageCount> {
        first_page
            .pointer(TOTAL_POINTER)
            .and_then(Value::as_u64)
            .map(PageCount::Total)
            .ok_or_else(|| super::missing("Volvo", TOTAL_POINTER))
    }

    fn plan(&self, _first_page: &Value, total: u64) -> PagePlan {
        PagePlan::Batch(paginate::offset_windows(PAGE_SIZE, total, PAGE_SIZE))
    }

    fn descriptor(&self, window: &PageWindow) -> RequestDescriptor {
        match window {
            PageWindow::Offset { offset, limit } => self.descriptor_with(*offset, *limit),
            other => self.descriptor_with(0, other_window_take(other)),
        }
    }

    fn records_pointer(&self) -> &str {
        HITS_POINTER
    }
}

// plan() only emits Offset windows; anything else would be a driver bug, so
// fall back to a full page rather than panic.
fn other_window_take(window: &PageWindow) -> u64 {
    tracing::warn!(?window, "Unexpected window shape for Volvo");
    PAGE_SIZE
}

/// Dealer ids within the search radius of a `lat_lon` coordinate pair.
pub async fn dealer_ids<T>(transport: &T, geo: &str, radius: u32, user_agent: &str) -> Result<Vec<String>>
where
    T: Transport + ?Sized,
{
    let Some((lat, lon)) = geo.split_once('_') else {
        return Err(MotorcadeError::Unsupported(format!(
            "Volvo dealer lookup needs coordinates as lat_lon, got {geo:?}"
        )));
    };
    let descriptor = RequestDescriptor::get(DEALERS_URI)
        .header("User-Agent", user_agent)
        .header("Referer", "https://www.volvocars.com/us/inventory/car-locator")
        .query([
            ("latitude", lat),
            ("longitude", lon),
            ("market", "us"),
            ("offset", "0"),
            ("capabilities", "new_car_sales"),
            ("distanceUnit", "Miles"),
        ]);
    let body = fetch_json(transport, &descriptor).await?;

    let Some(Value::Array(dealers)) = body.get("data") else {
        return Err(super::missing("Volvo", "/data"));
    };
    Ok(dealers
        .iter()
        .filter(|dealer| {
            dealer
                .get("distanceFromPoint")
                .and_then(Value::as_f64)
                .is_some_and(|distance| distance <= f64::from(radius))
        })
        .filter_map(|dealer| dealer.get("partnerId").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

/// Fetch and merge the full Volvo inventory for a query.
///
/// `geo` is the caller's coordinates as `lat_lon`; the upstream searches by
/// dealer, not postal code, so the dealer set within `query.radius` is
/// resolved first on `dealer_transport`.
pub async fn inventory<D, G>(
    dealer_transport: &D,
    graph_transport: &G,
    query: &InventoryQuery,
    geo: &str,
    user_agent: &str,
) -> Result<PageOutcome>
where
    D: Transport + ?Sized,
    G: Transport + ?Sized,
{
    let dealer_ids = dealer_ids(dealer_transport, geo, query.radius, user_agent).await?;
    if dealer_ids.is_empty() {
        return Ok(PageOutcome::Empty);
    }
    let pager = VolvoPager::new(dealer_ids, user_agent);
    paginate::gather(graph_transport, &pager).await
}

/// [`inventory`] over transports opened for the scope of this call.
pub async fn fetch_inventory(
    query: &InventoryQuery,
    geo: &str,
    user_agent: &str,
) -> Result<PageOutcome> {
    let dealer_transport = HttpTransport::open(TransportConfig::new(DEALER_BASE_URL))?;
    // The graph origin serves a certificate chain that fails verification.
    let graph_transport =
        HttpTransport::open(TransportConfig::new(GRAPH_BASE_URL).with_verify_tls(false))?;
    inventory(&dealer_transport, &graph_transport, query, geo, user_agent).await
}
