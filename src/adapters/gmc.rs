//! GMC inventory.
//!
//! GET with query parameters against the GM vehicle-shopping API. Pages 96
//! vehicles at a time; follow-up windows are addressed with
//! `beginIndex`/`endIndex` so no record is fetched twice.

use serde_json::Value;

use super::fetch_json;
use crate::descriptor::RequestDescriptor;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{self, PageCount, PageOutcome, PageWindow, Paginator};
use crate::query::InventoryQuery;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://cws.gm.com";
const REFERER: &str = "https://www.gmc.com/";
const INVENTORY_URI: &str = "/vs-cws/vehshop/v2/vehicles";
const VIN_URI: &str = "/vs-cws/vehshop/v2/vehicle";
const PAGE_SIZE: u64 = 96;

/// Pagination strategy for the GMC inventory API.
pub struct GmcPager {
    query: InventoryQuery,
    user_agent: String,
}

impl GmcPager {
    pub fn new(query: &InventoryQuery, user_agent: &str) -> Self {
        Self {
            query: query.clone(),
            user_agent: user_agent.to_string(),
        }
    }

    fn base_params(&self) -> Vec<(String, String)> {
        vec![
            ("conditions".into(), "New".into()),
            ("makes".into(), "GMC".into()),
            ("locale".into(), "en_US".into()),
            ("models".into(), self.query.model.clone()),
            ("years".into(), self.query.year.to_string()),
            ("radius".into(), self.query.radius.to_string()),
            ("postalCode".into(), self.query.zip.clone()),
            ("pageSize".into(), PAGE_SIZE.to_string()),
            (
                "sortby".into(),
                "bestMatch:desc,distance:asc,netPrice:asc".into(),
            ),
            ("includeNearMatches".into(), "true".into()),
            ("requesterType".into(), "TIER_1_VSR".into()),
        ]
    }

    fn descriptor_with(&self, params: Vec<(String, String)>) -> RequestDescriptor {
        RequestDescriptor::get(INVENTORY_URI)
            .header("User-Agent", &self.user_agent)
            .header("Referer", REFERER)
            .query(params)
    }
}

impl Paginator for GmcPager {
    fn first_page(&self) -> RequestDescriptor {
        self.descriptor_with(self.base_params())
    }

    fn page_size(&self) -> u64 {
        PAGE_SIZE
    }

    fn total_count(&self, first_page: &Value) -> Result<PageCount> {
        first_page
            .get("resultsCount")
            .and_then(Value::as_u64)
            .map(PageCount::Total)
            .ok_or_else(|| super::missing("GMC", "/resultsCount"))
    }

    fn descriptor(&self, window: &PageWindow) -> RequestDescriptor {
        let mut params = self.base_params();
        if let PageWindow::Range { begin, end } = window {
            params.push(("beginIndex".into(), begin.to_string()));
            params.push(("endIndex".into(), end.to_string()));
        }
        self.descriptor_with(params)
    }

    fn records_pointer(&self) -> &str {
        "/vehicles"
    }
}

/// Fetch and merge the full GMC inventory for a query.
pub async fn inventory<T>(
    transport: &T,
    query: &InventoryQuery,
    user_agent: &str,
) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    paginate::gather(transport, &GmcPager::new(query, user_agent)).await
}

/// [`inventory`] over a transport opened for the scope of this call.
pub async fn fetch_inventory(query: &InventoryQuery, user_agent: &str) -> Result<PageOutcome> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    inventory(&transport, query, user_agent).await
}

/// Detail lookup for one VIN. The upstream echoes the VIN back on a good
/// answer; anything else is a malformed response.
pub async fn vin_detail<T>(transport: &T, vin: &str, zip: &str, user_agent: &str) -> Result<Value>
where
    T: Transport + ?Sized,
{
    let descriptor = RequestDescriptor::get(VIN_URI)
        .header("User-Agent", user_agent)
        .header("Referer", BASE_URL)
        .query([
            ("vin", vin),
            ("postalCode", zip),
            ("customerType", "GC"),
            ("requesterType", "TIER_1"),
            ("locale", "en_US"),
        ]);
    let detail = fetch_json(transport, &descriptor).await?;
    match detail.get("vin").and_then(Value::as_str) {
        Some(found) if found.contains(vin) => Ok(detail),
        _ => Err(MotorcadeError::Malformed(format!(
            "GMC detail response does not match VIN {vin}"
        ))),
    }
}

/// [`vin_detail`] over a transport opened for the scope of this call.
pub async fn fetch_vin_detail(vin: &str, zip: &str, user_agent: &str) -> Result<Value> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    vin_detail(&transport, vin, zip, user_agent).await
}
