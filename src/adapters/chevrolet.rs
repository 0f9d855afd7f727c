//! Chevrolet inventory.
//!
//! Same GM discovery API as Cadillac, but a single 100-vehicle page covers
//! the result sets this search produces, so there is no pagination. The
//! search and the facets lookup go out as one concurrent batch; losing the
//! facets degrades the result, losing the search fails it.

use serde_json::{Value, json};

use crate::descriptor::RequestDescriptor;
use crate::dispatch::dispatch_many;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{AggregateResult, PageOutcome};
use crate::query::InventoryQuery;
use crate::response::FetchResult;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://www.chevrolet.com/chevrolet/shopping/api";
const SEARCH_URI: &str = "/aec-cp-discovery-api/p/v1/vehicles/search";
const FACETS_URI: &str = "/aec-cp-discovery-api/p/v1/vehicles/facets";
const VIN_URI: &str = "/aec-cp-ims-apigateway/p/v1/vehicles/detail";
const PAGE_SIZE: u64 = 100;

fn headers(user_agent: &str, client: &str) -> Vec<(String, String)> {
    vec![
        ("User-Agent".into(), user_agent.into()),
        (
            "referer".into(),
            "https://www.chevrolet.com/shopping/inventory/search".into(),
        ),
        ("client".into(), client.into()),
        ("tenantId".into(), "0".into()),
        ("dealerId".into(), "0".into()),
        ("oemId".into(), "GM".into()),
        ("programId".into(), "CHEVROLET".into()),
    ]
}

fn search_descriptor(query: &InventoryQuery, user_agent: &str) -> RequestDescriptor {
    RequestDescriptor::post(SEARCH_URI)
        .headers(headers(user_agent, "T1_VSR"))
        .json(json!({
            "filters": {
                "stockType": {"values": ["DealerStock"]},
                "year": {"values": [query.year.to_string()]},
                "model": {"values": [query.model.to_lowercase()]},
                "geo": {"zipCode": query.zip, "radius": query.radius}
            },
            "sort": {"name": "distance", "order": "ASC"},
            "paymentTypes": ["CASH"],
            "pagination": {"size": PAGE_SIZE}
        }))
}

fn facets_descriptor(query: &InventoryQuery, user_agent: &str) -> RequestDescriptor {
    RequestDescriptor::post(FACETS_URI)
        .headers(headers(user_agent, "T1_VSR"))
        .json(json!({
            "filters": {
                "year": {"values": [query.year.to_string()]},
                "model": {"values": [query.model.to_lowercase()]},
                "geo": {"zipCode": query.zip, "radius": query.radius}
            }
        }))
}

/// Fetch the Chevrolet inventory and facets for a query.
pub async fn inventory<T>(
    transport: &T,
    query: &InventoryQuery,
    user_agent: &str,
) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    let descriptors = [
        search_descriptor(query, user_agent),
        facets_descriptor(query, user_agent),
    ];
    let mut results = dispatch_many(transport, &descriptors).await;
    let facets_result = results.pop();
    let search_result = results.pop();

    let mut body = match search_result {
        Some(FetchResult::Success(success)) => success.json().map_err(|e| {
            MotorcadeError::Malformed(format!("Chevrolet search body was not JSON: {e}"))
        })?,
        Some(FetchResult::Failure(failure)) => return Err(MotorcadeError::Upstream(failure)),
        None => unreachable!("batch result is index-aligned with two descriptors"),
    };

    if body.pointer("/data/hits").is_none() {
        return if body.pointer("/errorDetails/key").is_some() {
            Ok(PageOutcome::Empty)
        } else {
            Err(super::missing("Chevrolet", "/data/hits"))
        };
    }

    let mut partial_failure = false;
    match facets_result {
        Some(FetchResult::Success(success)) => match success.json() {
            Ok(facets) => body["facets"] = facets,
            Err(_) => partial_failure = true,
        },
        _ => partial_failure = true,
    }
    if partial_failure {
        tracing::warn!("Chevrolet facets call failed; aggregate is partial");
    }

    Ok(PageOutcome::Merged(AggregateResult {
        body,
        partial_failure,
    }))
}

/// [`inventory`] over a transport opened for the scope of this call.
pub async fn fetch_inventory(query: &InventoryQuery, user_agent: &str) -> Result<PageOutcome> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    inventory(&transport, query, user_agent).await
}

/// Detail lookup for one VIN. The upstream answers with a `data` object.
pub async fn vin_detail<T>(transport: &T, vin: &str, user_agent: &str) -> Result<Value>
where
    T: Transport + ?Sized,
{
    let descriptor = RequestDescriptor::post(VIN_URI)
        .headers(headers(user_agent, "UI"))
        .json(json!({"vin": vin}));
    let detail = super::fetch_json(transport, &descriptor).await?;
    if detail.get("data").is_none() {
        return Err(MotorcadeError::Malformed(format!(
            "Chevrolet detail response for VIN {vin} has no data"
        )));
    }
    Ok(detail)
}

/// [`vin_detail`] over a transport opened for the scope of this call.
pub async fn fetch_vin_detail(vin: &str, user_agent: &str) -> Result<Value> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    vin_detail(&transport, vin, user_agent).await
}
