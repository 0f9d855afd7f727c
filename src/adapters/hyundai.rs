//! Hyundai inventory.
//!
//! GET with query parameters against the Hyundai USA inventory service. One
//! page covers every search. A successful answer always carries `data`
//! (dealers with their vehicles), even for zero vehicles.

use serde_json::Value;

use super::fetch_json;
use crate::descriptor::RequestDescriptor;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{AggregateResult, PageOutcome};
use crate::query::InventoryQuery;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://www.hyundaiusa.com";
const INVENTORY_URI: &str = "/var/hyundai/services/inventory/vehicleList.json";
const VIN_URI: &str = "/var/hyundai/services/inventory/vehicleDetails.vin.json";
const REFERER: &str = "https://www.hyundaiusa.com/us/en/vehicles";

/// Fetch the Hyundai inventory for a query. One page covers everything.
pub async fn inventory<T>(
    transport: &T,
    query: &InventoryQuery,
    user_agent: &str,
) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    let descriptor = RequestDescriptor::get(INVENTORY_URI)
        .header("User-Agent", user_agent)
        .header("Referer", REFERER)
        .query([
            ("zip", query.zip.clone()),
            ("year", query.year.to_string()),
            ("model", query.model.clone()),
            ("radius", query.radius.to_string()),
        ]);
    let body = fetch_json(transport, &descriptor).await?;

    if body.get("data").is_none() {
        return Err(super::missing("Hyundai", "/data"));
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

/// Detail lookup for one VIN.
pub async fn vin_detail<T>(transport: &T, vin: &str, zip: &str, user_agent: &str) -> Result<Value>
where
    T: Transport + ?Sized,
{
    let descriptor = RequestDescriptor::get(VIN_URI)
        .header("User-Agent", user_agent)
        .header("Referer", REFERER)
        .query([("vin", vin), ("zip", zip)]);
    let detail = fetch_json(transport, &descriptor).await?;

    if detail.get("data").is_none() {
        return Err(MotorcadeError::Malformed(format!(
            "Hyundai detail response has no data for VIN {vin}"
        )));
    }
    Ok(detail)
}

/// [`vin_detail`] over a transport opened for the scope of this call.
pub async fn fetch_vin_detail(vin: &str, zip: &str, user_agent: &str) -> Result<Value> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    vin_detail(&transport, vin, zip, user_agent).await
}
