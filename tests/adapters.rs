//! Adapter flows the way a response layer drives them: every make comes back
//! as the same `PageOutcome`, failures map to suggested status codes, and
//! fan-out batches really run concurrently.

use std::time::Duration;

use motorcade::adapters::{cadillac, chevrolet, gmc, kia};
use motorcade::{
    FailureKind, FetchResult, FetchSuccess, InventoryQuery, MockTransport, MotorcadeError,
    PageOutcome,
};
use serde_json::json;

const UA: &str = "integration-test-agent";

fn query() -> InventoryQuery {
    InventoryQuery::new("90210", 2023, "Hummer EV", 100)
}

#[test_log::test(tokio::test)]
async fn test_first_page_failure_maps_to_a_status_code() {
    let mock = MockTransport::new();
    mock.add_failure("GET /vs-cws/vehshop/v2/vehicles", FailureKind::Timeout);

    let error = gmc::inventory(&mock, &query(), UA).await.unwrap_err();
    let failure = error.fetch_failure().expect("upstream failure");
    assert_eq!(failure.kind.suggested_status(), 504);
    // First-page failure must not trigger any follow-up fetches.
    assert_eq!(mock.call_count(), 1);
}

#[test_log::test(tokio::test)]
async fn test_partial_aggregate_keeps_surviving_pages() {
    let mock = MockTransport::new();
    let route = "GET /vs-cws/vehshop/v2/vehicles";
    // 288 total: first page of 96, then [96,192) and [192,288).
    mock.add_json(route, json!({"resultsCount": 288, "vehicles": ["a"]}));
    mock.add_failure(route, FailureKind::Network);
    mock.add_json(route, json!({"vehicles": ["c"]}));

    let outcome = gmc::inventory(&mock, &query(), UA).await.unwrap();
    let aggregate = outcome.merged().unwrap();
    assert!(aggregate.partial_failure);
    assert_eq!(aggregate.body["vehicles"], json!(["a", "c"]));
    assert_eq!(mock.call_count(), 3);
}

#[test_log::test(tokio::test)]
async fn test_follow_up_pages_are_fetched_concurrently() {
    let mock = MockTransport::new();
    let route = "GET /vs-cws/vehshop/v2/vehicles";
    mock.add_json(route, json!({"resultsCount": 288, "vehicles": ["a"]}));
    let page = |label: &str| {
        FetchResult::Success(FetchSuccess {
            status: 200,
            headers: Vec::new(),
            body: json!({"vehicles": [label]}).to_string(),
        })
    };
    let first_trigger = mock.add_result_with_trigger(route, page("b"));
    let second_trigger = mock.add_result_with_trigger(route, page("c"));

    let mock_clone = mock.clone();
    let handle =
        tokio::spawn(async move { gmc::inventory(&mock_clone, &query(), UA).await });

    // Both follow-up windows must be in flight at once.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mock.in_flight_count(), 2);

    // Releasing them out of order must not reorder the merge.
    second_trigger.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    first_trigger.send(()).unwrap();

    let aggregate = handle.await.unwrap().unwrap().merged().unwrap();
    assert_eq!(aggregate.body["vehicles"], json!(["a", "b", "c"]));
    assert!(!aggregate.partial_failure);
}

#[test_log::test(tokio::test)]
async fn test_empty_sentinel_is_distinct_from_malformed() {
    // Cadillac's not-found sentinel is a legitimate empty result.
    let mock = MockTransport::new();
    mock.add_json(
        "POST /aec-cp-discovery-api/p/v1/vehicles/facets",
        json!({}),
    );
    mock.add_json(
        "POST /aec-cp-discovery-api/p/v1/vehicles/search",
        json!({"status": 404, "errorDetails": {"key": "inventory.notFound"}}),
    );
    let outcome = cadillac::inventory(&mock, &query(), UA).await.unwrap();
    assert!(matches!(outcome, PageOutcome::Empty));

    // Kia with a missing inventory key is a fault, not an empty result.
    let mock = MockTransport::new();
    mock.add_json(
        "POST /us/services/en/inventory/initial",
        json!({"unexpected": true}),
    );
    let error = kia::inventory(&mock, &query(), UA).await.unwrap_err();
    assert!(matches!(error, MotorcadeError::Malformed(_)));
}

#[test_log::test(tokio::test)]
async fn test_chevrolet_issues_search_and_facets_together() {
    let mock = MockTransport::new();
    let search = FetchResult::Success(FetchSuccess {
        status: 200,
        headers: Vec::new(),
        body: json!({"data": {"hits": ["v1"]}}).to_string(),
    });
    let facets = FetchResult::Success(FetchSuccess {
        status: 200,
        headers: Vec::new(),
        body: json!({"colors": []}).to_string(),
    });
    let search_trigger =
        mock.add_result_with_trigger("POST /aec-cp-discovery-api/p/v1/vehicles/search", search);
    let facets_trigger =
        mock.add_result_with_trigger("POST /aec-cp-discovery-api/p/v1/vehicles/facets", facets);

    let mock_clone = mock.clone();
    let handle =
        tokio::spawn(async move { chevrolet::inventory(&mock_clone, &query(), UA).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mock.in_flight_count(), 2);

    facets_trigger.send(()).unwrap();
    search_trigger.send(()).unwrap();

    let aggregate = handle.await.unwrap().unwrap().merged().unwrap();
    assert_eq!(aggregate.body["data"]["hits"], json!(["v1"]));
    assert_eq!(aggregate.body["facets"], json!({"colors": []}));
}

#[test_log::test(tokio::test)]
async fn test_user_agent_flows_through_to_the_upstream() {
    let mock = MockTransport::new();
    mock.add_json(
        "GET /vs-cws/vehshop/v2/vehicles",
        json!({"resultsCount": 0, "vehicles": []}),
    );

    gmc::inventory(&mock, &query(), "caller-ua/7.0").await.unwrap();

    let calls = mock.get_calls();
    assert_eq!(calls[0].header_value("user-agent"), Some("caller-ua/7.0"));
}
