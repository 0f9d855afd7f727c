//! Genesis inventory.
//!
//! GET with path segments rather than query parameters: model, postal code,
//! a dealer ceiling, and today's date. The upstream takes no radius and no
//! model year; callers filter the results themselves. When something goes
//! wrong the upstream answers with an empty payload, so emptiness here is a
//! fault, not a no-inventory sentinel.

use chrono::Local;
use serde_json::Value;

use super::fetch_json;
use crate::descriptor::RequestDescriptor;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{AggregateResult, PageOutcome};
use crate::query::InventoryQuery;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://www.genesis.com";
const MAX_DEALERS: u32 = 50;

fn referer() -> String {
    format!("{BASE_URL}/us/en/new/inventory.html")
}

fn is_empty_payload(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

/// Fetch the Genesis inventory for a query. One page covers everything.
pub async fn inventory<T>(
    transport: &T,
    query: &InventoryQuery,
    user_agent: &str,
) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    let today = Local::now().format("%Y-%m-%d");
    let descriptor = RequestDescriptor::get(format!(
        "/bin/api/v1/inventory.json/{}/{}/{MAX_DEALERS}/{today}",
        query.model, query.zip
    ))
    .header("User-Agent", user_agent)
    .header("Referer", referer());
    let body = fetch_json(transport, &descriptor).await?;

    if is_empty_payload(&body) {
        return Err(MotorcadeError::Malformed(
            "Genesis answered with an empty payload".into(),
        ));
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
    let descriptor = RequestDescriptor::get("/bin/api/v1/vehicledetails.json")
        .header("User-Agent", user_agent)
        .header("Referer", format!("{}?vin={vin}", referer()))
        .query([("zip", zip), ("vin", vin)]);
    let detail = fetch_json(transport, &descriptor).await?;

    if is_empty_payload(&detail) {
        return Err(MotorcadeError::Malformed(format!(
            "Genesis answered with an empty payload for VIN {vin}"
        )));
    }
    Ok(detail)
}

/// [`vin_detail`] over a transport opened for the scope of this call.
pub async fn fetch_vin_detail(vin: &str, zip: &str, user_agent: &str) -> Result<Value> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    vin_detail(&transport, vin, zip, user_agent).await
}
