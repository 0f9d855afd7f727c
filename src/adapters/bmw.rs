//! BMW inventory.
//!
//! GraphQL POST against the BMW USA inventory gateway. The API defaults to
//! 24 vehicles per page; requesting 2000 keeps every realistic result set on
//! one page, so there is no pagination here. A successful answer always has
//! `data.getInventory`, even for zero vehicles.

use serde_json::{Value, json};

use super::fetch_json;
use crate::descriptor::RequestDescriptor;
use crate::error::{MotorcadeError, Result};
use crate::paginate::{AggregateResult, PageOutcome};
use crate::query::InventoryQuery;
use crate::transport::{HttpTransport, Transport, TransportConfig};

pub const BASE_URL: &str = "https://www.bmwusa.com/inventory/graphql";
const MAX_PAGE_SIZE: u64 = 2000;

fn inventory_query(query: &InventoryQuery) -> String {
    format!(
        concat!(
            "query inventory {{getInventory(zip: \"{zip}\", bucket: BYO, ",
            "filter: {{ locatorRange: {radius} excludeStopSale: false series: \"{model}\" ",
            // Statuses 0-1 are at the dealership, 2-5 in transit or production.
            "statuses:[\"0\",\"1\",\"2\",\"3\",\"4\",\"5\"] }}, ",
            "sorting: [{{order: ASC, criteria: DISTANCE_TO_LOCATOR_ZIP}},{{order:ASC,criteria:PRICE}}] ",
            "pagination: {{pageIndex: 1, pageSize: {page_size}}}) ",
            "{{ numberOfFilteredVehicles pageNumber totalPages errorCode ",
            "filter {{ modelsWithSeries {{ series {{ code name }} model {{ code name }} }} }} ",
            "dealerInfo {{ centerID newVehicleSales {{ dealerName distance longitude locationID ",
            "dealerURL phoneNumber address {{ lineOne lineTwo city state zipcode }} }} }} ",
            "result {{ name modelYear sold daysOnLot orderType dealerEstArrivalDate marketingText ",
            "technicalText interiorGenericColor exteriorGenericColor hybridFlag sportsFlag ",
            "vehicleDetailsPage milesPerGallon milesPerGallonEqv code bodyStyle {{ name }} ",
            "engineDriveType {{ name }} series {{ name code }} qualifiedModelCode totalMsrp ",
            "dealerId dealerLocation distanceToLocatorZip orderStatus vin initialCOSYURL ",
            "cosy {{ panoramaViewUrlPart walkaround360DegViewUrlPart }} ",
            "vehicleProcessingCenter isAtPmaDealer }} }} }}",
        ),
        zip = query.zip,
        radius = query.radius,
        model = query.model,
        page_size = MAX_PAGE_SIZE,
    )
}

const VIN_QUERY_FIELDS: &str = "{ result { code id dealerId dealerLocation vin totalMsrp name powertrain fuelType marketingText orderStatus technicalText acceleration horsepower milesPerGallon milesPerGallonEqv modelYear productionNumber sold hybridFlag sportsFlag vehicleDetailsPage destinationAndHandling qualifiedModelCode series { code name } bodyStyle { code name } engineDriveType { code name } options { name code optionPackageCodeKey price wholesalePrice optionType optionAttribute isPaint isUpholstery isPackage isTrim isAccessory isWheel isStandard isLine isTop isUni isMetallic isIndividual isMarketing } vehicleProcessingCenter isAtPmaDealer } dealerInfo { centerID newVehicleSales { dealerName distance longitude locationID dealerURL phoneNumber address { lineOne lineTwo city state zipcode } } } }";

/// Fetch the BMW inventory for a query. One page covers everything.
pub async fn inventory<T>(
    transport: &T,
    query: &InventoryQuery,
    user_agent: &str,
) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
{
    let descriptor = RequestDescriptor::post("/")
        .header("User-Agent", user_agent)
        .header("Referer", "https://www.bmwusa.com/inventory.html")
        .json(json!({"query": inventory_query(query)}));
    let body = fetch_json(transport, &descriptor).await?;

    if body.pointer("/data/getInventory").is_none() {
        return Err(super::missing("BMW", "/data/getInventory"));
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

/// Detail lookup for one VIN. An empty result array means the upstream did
/// not recognize the identifier.
pub async fn vin_detail<T>(transport: &T, vin: &str, user_agent: &str) -> Result<Value>
where
    T: Transport + ?Sized,
{
    let graphql = format!(
        "query inventory {{ getInventoryByIdentifier(identifier: \"{vin}\") {VIN_QUERY_FIELDS} }}"
    );
    let descriptor = RequestDescriptor::post("/")
        .header("User-Agent", user_agent)
        .header("Referer", "https://www.bmwusa.com/inventory/")
        .json(json!({"query": graphql}));
    let detail = fetch_json(transport, &descriptor).await?;

    let found = detail
        .pointer("/data/getInventoryByIdentifier/result")
        .and_then(Value::as_array)
        .is_some_and(|results| !results.is_empty());
    if found {
        Ok(detail)
    } else {
        Err(MotorcadeError::Malformed(format!(
            "BMW detail response has no result for VIN {vin}"
        )))
    }
}

/// [`vin_detail`] over a transport opened for the scope of this call.
pub async fn fetch_vin_detail(vin: &str, user_agent: &str) -> Result<Value> {
    let transport = HttpTransport::open(TransportConfig::new(BASE_URL))?;
    vin_detail(&transport, vin, user_agent).await
}
