//! Audi inventory.
//!
//! GraphQL POST against the Audi owner-area gateway. Searches are addressed
//! by coordinates rather than postal code, packed into a filter string. A
//! 1000-vehicle limit keeps everything on one page. A successful answer
//! always carries `data`, even for zero vehicles.

use serde_json::{Value, json};

use super::fetch_json;
use crate::descriptor::RequestDescriptor;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{AggregateResult, PageOutcome};
use crate::query::InventoryQuery;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://prod.aoaaudinagateway.svc.audiusa.io/graphql";
const REFERER: &str = "https://www.audiusa.com/";
const PAGE_LIMIT: u64 = 1000;

const INVENTORY_QUERY: &str = "query getFilteredVehiclesForWormwood($version: String, $market: [MarketType]!, $limit: Int, $lang: String!, $filters: String, $sort: String, $offset: Int, $preset: String) { getFilteredVehiclesForWormwood( version: $version market: $market size: $limit lang: $lang filters: $filters sort: $sort from: $offset preset: $preset ) { filterResults { totalCount totalNewCarCount totalUsedCarCount available_from_soon available_from_immediately } vehicles { id interiorColor exteriorColor modelID modelYear modelCode modelName modelPrice modelPowerkW modelMileage audiCode stockNumber trimName kvpsSyncId dealerName dealerRegion vehicleType warrantyType modelImageFromScs isAvailableNow vin bodyType saleOrderType vehicleInventoryType vehicleOrderStatus driveType gearType distanceFromUser } }}";

const VIN_QUERY: &str = "query getVehicleInfoForWormwood($market: MarketType!, $lang: String!, $id: String!, $version: String) { getVehicleInfoForWormwood( market: $market lang: $lang id: $id version: $version ) { modelName trimName bodyType modelYear trimline gearType driveType modelMileage vehicleType market fuelType exteriorColor upholsteryColor interiorTileImage exteriorTileImage dealerName dealerNote vehicleMedia { mediaRequestString mediaImages { config imageType url } } technicalSpecifications { engineType displacement maxOutput maxTorque gearbox topSpeed acceleration fuelType } }}";

/// Fetch the Audi inventory for a query. `geo` is the caller's coordinates
/// as `lat_lon`; one page covers everything.
pub async fn inventory<T>(
    transport: &T,
    query: &InventoryQuery,
    geo: &str,
    user_agent: &str,
) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    let filters = format!(
        "available-from.immediately,available-from.soon,geo:{geo}_{radius}_miles_defaultcity,\
         model-group-range.{model},vtp-drivetrain.electrical,model-year.{year}",
        radius = query.radius,
        model = query.model,
        year = query.year,
    );
    let descriptor = RequestDescriptor::post("/")
        .header("User-Agent", user_agent)
        .header("Referer", REFERER)
        .json(json!({
            "operationName": "getFilteredVehiclesForWormwood",
            "variables": {
                "version": "2.0.0",
                "market": ["US"],
                "lang": "en",
                "filters": filters,
                "sort": "byDistance:ASC",
                "limit": PAGE_LIMIT,
                "offset": 0,
                "preset": "foreign-brand.no,sold-order.no"
            },
            "query": INVENTORY_QUERY
        }));
    let body = fetch_json(transport, &descriptor).await?;

    if body.get("data").is_none() {
        return Err(super::missing("Audi", "/data"));
    }
    Ok(PageOutcome::Merged(AggregateResult {
        body,
        partial_failure: false,
    }))
}

/// [`inventory`] over a transport opened for the scope of this call.
pub async fn fetch_inventory(
    query: &InventoryQuery,
    geo: &str,
    user_agent: &str,
) -> Result<PageOutcome> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    inventory(&transport, query, geo, user_agent).await
}

/// Detail lookup for one vehicle id (Audi keys details by id, not VIN).
pub async fn vin_detail<T>(transport: &T, vehicle_id: &str, user_agent: &str) -> Result<Value>
where
    T: Transport + ?Sized,
{
    let descriptor = RequestDescriptor::post("/")
        .header("User-Agent", user_agent)
        .header("Referer", REFERER)
        .json(json!({
            "operationName": "getVehicleInfoForWormwood",
            "variables": {
                "version": "2.0.0",
                "market": "US",
                "lang": "en",
                "id": vehicle_id
            },
            "query": VIN_QUERY
        }));
    let detail = fetch_json(transport, &descriptor).await?;

    if detail.pointer("/data/getVehicleInfoForWormwood").is_none() {
        return Err(MotorcadeError::Malformed(format!(
            "Audi detail response has no vehicle info for id {vehicle_id}"
        )));
    }
    Ok(detail)
}

/// [`vin_detail`] over a transport opened for the scope of this call.
pub async fn fetch_vin_detail(vehicle_id: &str, user_agent: &str) -> Result<Value> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    vin_detail(&transport, vehicle_id, user_agent).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Payload;
    use crate::transport::MockTransport;

    fn query() -> InventoryQuery {
        InventoryQuery::new("94105", 2023, "q4", 100)
    }

    #[tokio::test]
    async fn test_filters_encode_geo_and_model() {
        let mock = MockTransport::new();
        mock.add_json(
            "POST /",
            json!({"data": {"getFilteredVehiclesForWormwood": {"vehicles": []}}}),
        );

        inventory(&mock, &query(), "37.7_-122.4", "ua").await.unwrap();

        let calls = mock.get_calls();
        let Payload::Json(body) = calls[0].payload() else {
            panic!("expected JSON payload");
        };
        let filters = body.pointer("/variables/filters").unwrap().as_str().unwrap();
        assert!(filters.contains("geo:37.7_-122.4_100_miles_defaultcity"));
        assert!(filters.contains("model-group-range.q4"));
        assert!(filters.contains("model-year.2023"));
        assert_eq!(body.pointer("/variables/limit"), Some(&json!(1000)));
    }

    #[tokio::test]
    async fn test_missing_data_is_malformed() {
        let mock = MockTransport::new();
        mock.add_json("POST /", json!({"errors": ["upstream unhappy"]}));

        let error = inventory(&mock, &query(), "37.7_-122.4", "ua")
            .await
            .unwrap_err();
        assert!(matches!(error, MotorcadeError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_vin_detail_requires_vehicle_info() {
        let mock = MockTransport::new();
        mock.add_json(
            "POST /",
            json!({"data": {"getVehicleInfoForWormwood": {"modelName": "Q4 e-tron"}}}),
        );
        mock.add_json("POST /", json!({"data": {}}));

        assert!(vin_detail(&mock, "abc-123", "ua").await.is_ok());
        assert!(vin_detail(&mock, "abc-123", "ua").await.is_err());
    }
}
