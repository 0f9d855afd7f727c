//! Volkswagen inventory.
//!
//! GraphQL POST against the VW inventory API. A 1000-vehicle page covers
//! every realistic search, so there is no pagination. A successful answer
//! always carries `data.inventory`, even for zero vehicles.

use serde_json::{Value, json};

use super::fetch_json;
use crate::descriptor::RequestDescriptor;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{AggregateResult, PageOutcome};
use crate::query::InventoryQuery;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://api.vw.com/graphql";
const REFERER: &str = "https://www.vw.com/";
const PAGE_SIZE: u64 = 1000;

const INVENTORY_QUERY: &str = "query InventoryData($zipcode: String, $distance: Int, $pageSize: Int, $pageNumber: Int, $sortBy: String, $filters: String) { inventory: getPagedInventoryByZipAndDistanceAndFilters( zipcode: $zipcode distance: $distance pageSize: $pageSize pageNumber: $pageNumber sortBy: $sortBy filters: $filters ) { modelYear totalPages totalVehicles vehicles { vin model msrp modelYear exteriorColorDescription factoryExteriorCode interiorColorDescription factoryInteriorCode mpgCity subTrimLevel engineDescription mpgHighway trimLevel onlineSalesURL dealerEnrollmentStatusInd inTransit dealer { dealerid name url distance address1 address2 city state postalcode phone aor } highlightFeatures { key title } } dealers { dealerid name url distance address1 address2 city state postalcode phone aor } aorDealer { dealerid name url distance address1 address2 city state postalcode phone aor } filter { modelName filterAttributes { transmissionType { key value } exteriorColor { key value } interiorColor { key value } modelYear { key value } trimLevel { key value } dealers { key value } models { key value } } } }}";

const VIN_QUERY: &str = "query VehicleData($vin: String, $zipcode: String) { vehicle: getVehicleByVinAndZip(vin: $vin, zipcode: $zipcode) { portInstalledOptions vin model modelCode modelYear modelVersion carlineKey msrp mpgCity subTrimLevel engineDescription exteriorColorDescription exteriorColorBaseColor exteriorColorCode exteriorSwatchUrl interiorColorDescription interiorColorBaseColor interiorColorCode interiorSwatchUrl factoryExteriorCode factoryInteriorCode mpgHighway trimLevel mediaAssets { view type url } onlineSalesURL dealerEnrollmentStatusInd highlightFeatures { key title } factoryModelYear dealerInstalledAccessories { mdmCode title longTitle description image itemPrice creativeTitle } dealer { generatedDate dealerid name dealername seolookupkey address1 address2 city state postalcode country url phone latlong staticMapsUrl distance inventoryCount aor isSatellite isAssessing lmaId } specifications { text values { key label longTitle value } key } destinationCharge }}";

/// Fetch the Volkswagen inventory for a query. One page covers everything.
pub async fn inventory<T>(
    transport: &T,
    query: &InventoryQuery,
    user_agent: &str,
) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    // The filters variable is a stringified object, per the upstream schema.
    let filters = json!({"modelName": [query.model], "modelYear": [query.year]}).to_string();
    let descriptor = RequestDescriptor::post("/")
        .header("User-Agent", user_agent)
        .header("referer", REFERER)
        .json(json!({
            "operationName": "InventoryData",
            "variables": {
                "zipcode": query.zip,
                "distance": query.radius,
                "pageSize": PAGE_SIZE,
                "pageNumber": 0,
                "sortBy": "",
                "filters": filters
            },
            "query": INVENTORY_QUERY
        }));
    let body = fetch_json(transport, &descriptor).await?;

    if body.pointer("/data/inventory").is_none() {
        return Err(super::missing("Volkswagen", "/data/inventory"));
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
    let descriptor = RequestDescriptor::post("/")
        .header("User-Agent", user_agent)
        .header("referer", REFERER)
        .json(json!({
            "operationName": "VehicleData",
            "variables": {"vin": vin, "zipcode": zip},
            "query": VIN_QUERY
        }));
    let detail = fetch_json(transport, &descriptor).await?;

    let found = detail
        .pointer("/data/vehicle")
        .is_some_and(|vehicle| !vehicle.is_null());
    if found {
        Ok(detail)
    } else {
        Err(MotorcadeError::Malformed(format!(
            "Volkswagen detail response has no vehicle for VIN {vin}"
        )))
    }
}

/// [`vin_detail`] over a transport opened for the scope of this call.
pub async fn fetch_vin_detail(vin: &str, zip: &str, user_agent: &str) -> Result<Value> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    vin_detail(&transport, vin, zip, user_agent).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Payload;
    use crate::transport::MockTransport;

    fn query() -> InventoryQuery {
        InventoryQuery::new("02134", 2023, "ID.4", 60)
    }

    #[tokio::test]
    async fn test_variables_carry_the_search() {
        let mock = MockTransport::new();
        mock.add_json("POST /", json!({"data": {"inventory": {"vehicles": []}}}));

        inventory(&mock, &query(), "ua").await.unwrap();

        let calls = mock.get_calls();
        let Payload::Json(body) = calls[0].payload() else {
            panic!("expected JSON payload");
        };
        assert_eq!(body.pointer("/variables/zipcode"), Some(&json!("02134")));
        assert_eq!(body.pointer("/variables/distance"), Some(&json!(60)));
        let filters = body.pointer("/variables/filters").unwrap().as_str().unwrap();
        assert!(filters.contains("ID.4"));
        assert!(filters.contains("2023"));
    }

    #[tokio::test]
    async fn test_missing_inventory_is_malformed() {
        let mock = MockTransport::new();
        mock.add_json("POST /", json!({"data": {}}));

        let error = inventory(&mock, &query(), "ua").await.unwrap_err();
        assert!(matches!(error, MotorcadeError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_vin_detail_requires_a_vehicle() {
        let mock = MockTransport::new();
        mock.add_json("POST /", json!({"data": {"vehicle": {"vin": "WVW123"}}}));
        mock.add_json("POST /", json!({"data": {"vehicle": null}}));

        assert!(vin_detail(&mock, "WVW123", "02134", "ua").await.is_ok());
        assert!(vin_detail(&mock, "WVW123", "02134", "ua").await.is_err());
    }
}
