//! Cadillac inventory.
//!
//! POST JSON against the GM shopping discovery API, 20 vehicles per page.
//! Follow-up pages are addressed by the `nextPageToken` the previous page
//! handed out, so they are walked sequentially. A 404 with
//! `errorDetails.key == "inventory.notFound"` is the upstream's way of
//! saying "no matching vehicles" and maps to the empty outcome.
//!
//! A second endpoint serves facet data for the same search; its result is
//! attached to the aggregate, and losing it only degrades the aggregate.

use serde_json::{Value, json};

use crate::descriptor::RequestDescriptor;
use crate::dispatch::dispatch_one;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{self, PageCount, PageOutcome, PagePlan, PageWindow, Paginator};
use crate::query::InventoryQuery;
use crate::response::FetchResult;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://www.cadillac.com/cadillac/shopping/api";
const SEARCH_URI: &str = "/aec-cp-discovery-api/p/v1/vehicles/search";
const FACETS_URI: &str = "/aec-cp-discovery-api/p/v1/vehicles/facets";
const VIN_URI: &str = "/aec-cp-ims-apigateway/p/v1/vehicles/detail";
const PAGE_SIZE: u64 = 20;

const NOT_FOUND_KEY: &str = "inventory.notFound";
const TOKEN_POINTER: &str = "/data/pagination/nextPageToken";

fn headers(user_agent: &str, referer: String, client: &str) -> Vec<(String, String)> {
    vec![
        ("User-Agent".into(), user_agent.into()),
        ("Referer".into(), referer),
        ("oemId".into(), "GM".into()),
        ("programId".into(), "CADILLAC".into()),
        ("dealerId".into(), "0".into()),
        ("tenantId".into(), "0".into()),
        ("client".into(), client.into()),
    ]
}

/// The upstream's explicit no-inventory sentinel.
fn is_not_found(body: &Value) -> bool {
    body.pointer("/errorDetails/key")
        .and_then(Value::as_str)
        .is_some_and(|key| key == NOT_FOUND_KEY)
}

/// Pagination strategy for the Cadillac discovery API.
pub struct CadillacPager {
    query: InventoryQuery,
    user_agent: String,
}

impl CadillacPager {
    pub fn new(query: &InventoryQuery, user_agent: &str) -> Self {
        Self {
            query: query.clone(),
            user_agent: user_agent.to_string(),
        }
    }

    fn referer(&self) -> String {
        format!(
            "https://www.cadillac.com/shopping/inventory/search/{}/{}",
            self.query.model, self.query.year
        )
    }

    fn filters(&self) -> Value {
        json!({
            "vehicleCategory": {"values": ["EV"]},
            "year": {"values": [self.query.year.to_string()]},
            "model": {"values": [self.query.model]},
            "geo": {"zipCode": self.query.zip, "radius": self.query.radius}
        })
    }

    fn descriptor_with(&self, pagination: Value) -> RequestDescriptor {
        RequestDescriptor::post(SEARCH_URI)
            .headers(headers(&self.user_agent, self.referer(), "T1_VSR"))
            .json(json!({
                "filters": self.filters(),
                "sort": {"name": "distance", "order": "ASC"},
                "paymentTypes": ["CASH"],
                "pagination": pagination
            }))
    }

    fn facets_descriptor(&self) -> RequestDescriptor {
        RequestDescriptor::post(FACETS_URI)
            .headers(headers(&self.user_agent, self.referer(), "T1_VSR"))
            .json(json!({
                "filters": {
                    "model": {"values": [self.query.model]},
                    "geo": {"zipCode": self.query.zip, "radius": self.query.radius}
                }
            }))
    }
}

impl Paginator for CadillacPager {
    fn first_page(&self) -> RequestDescriptor {
        self.descriptor_with(json!({"size": PAGE_SIZE}))
    }

    fn page_size(&self) -> u64 {
        PAGE_SIZE
    }

    fn total_count(&self, first_page: &Value) -> Result<PageCount> {
        if is_not_found(first_page) {
            return Ok(PageCount::Empty);
        }
        if first_page.get("status").is_none() {
            return Err(MotorcadeError::Malformed(
                "Cadillac response carries no status".into(),
            ));
        }
        first_page
            .pointer("/data/count")
            .and_then(Value::as_u64)
            .map(PageCount::Total)
            .ok_or_else(|| super::missing("Cadillac", "/data/count"))
    }

    fn plan(&self, first_page: &Value, _total: u64) -> PagePlan {
        match self.next_window(first_page) {
            Some(window) => PagePlan::Sequential(window),
            // More vehicles than one page but no token to reach them.
            None => PagePlan::Batch(Vec::new()),
        }
    }

    fn next_window(&self, page: &Value) -> Option<PageWindow> {
        page.pointer(TOKEN_POINTER)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(|token| PageWindow::Token(token.to_string()))
    }

    fn descriptor(&self, window: &PageWindow) -> RequestDescriptor {
        let pagination = match window {
            PageWindow::Token(token) => json!({"size": PAGE_SIZE, "nextPageToken": token}),
            _ => json!({"size": PAGE_SIZE}),
        };
        self.descriptor_with(pagination)
    }

    fn records_pointer(&self) -> &str {
        "/data/hits"
    }
}

/// Fetch and merge the full Cadillac inventory for a query.
///
/// The facets result rides on the aggregate under `facets`; a failed facets
/// call flags the aggregate partial instead of failing the search.
pub async fn inventory<T>(
    transport: &T,
    query: &InventoryQuery,
    user_agent: &str,
) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    let pager = CadillacPager::new(query, user_agent);

    let facets = match dispatch_one(transport, &pager.facets_descriptor()).await {
        FetchResult::Success(success) => success.json().ok(),
        FetchResult::Failure(_) => None,
    };

    match paginate::gather(transport, &pager).await? {
        PageOutcome::Empty => Ok(PageOutcome::Empty),
        PageOutcome::Merged(mut aggregate) => {
            match facets {
                Some(facets) => aggregate.body["facets"] = facets,
                None => {
                    tracing::warn!("Cadillac facets call failed; aggregate is partial");
                    aggregate.partial_failure = true;
                }
            }
            Ok(PageOutcome::Merged(aggregate))
        }
    }
}

/// [`inventory`] over a transport opened for the scope of this call.
pub async fn fetch_inventory(query: &InventoryQuery, user_agent: &str) -> Result<PageOutcome> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    inventory(&transport, query, user_agent).await
}

/// Detail lookup for one VIN. The upstream echoes the VIN inside `data.id`
/// on a good answer.
pub async fn vin_detail<T>(
    transport: &T,
    vin: &str,
    model: &str,
    year: u16,
    user_agent: &str,
) -> Result<Value>
where
    T: Transport + ?Sized,
{
    let referer = format!(
        "{BASE_URL}/shopping/inventory/vehicle/{}/{year}",
        model.to_uppercase()
    );
    let descriptor = RequestDescriptor::post(VIN_URI)
        .headers(headers(user_agent, referer, "UI"))
        .json(json!({
            "pricing": {
                "paymentTypes": ["CASH", "FINANCE", "LEASE"],
                "finance": {"downPayment": 3500},
                "lease": {"mileage": 10000, "downPayment": 3500}
            },
            "vin": vin
        }));
    let detail = super::fetch_json(transport, &descriptor).await?;
    match detail.pointer("/data/id").and_then(Value::as_str) {
        Some(id) if id.contains(vin) => Ok(detail),
        _ => Err(MotorcadeError::Malformed(format!(
            "Cadillac detail response does not match VIN {vin}: {}",
            detail
                .pointer("/errorDetails/errorCode")
                .and_then(Value::as_str)
                .unwrap_or("no error code")
        ))),
    }
}

/// [`vin_detail`] over a transport opened for the scope of this call.
pub async fn fetch_vin_detail(
    vin: &str,
    model: &str,
    year: u16,
    user_agent: &str,
) -> Result<Value> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    vin_detail(&transport, vin, model, year, user_agent).await
}
