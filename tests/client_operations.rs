//! Endpoint-level behavior of the client
//!
//! Status handling, data point writes, annotations, UID metadata, search
//! and suggest, all against a scripted transport.

mod common;

use common::{cpu_series, stub_client};
use opentsdb_client::error::TransportError;
use opentsdb_client::transport::Method;
use opentsdb_client::{
    Annotation, Entity, Error, Measurement, PutOptions, SearchMode, SearchRequest, SuggestKind,
    UidKind, UidMeta,
};
use serde_json::json;

// =============================================================================
// Status handling
// =============================================================================

#[test]
fn test_error_object_is_surfaced() {
    let client = stub_client();
    client.transport().push_json(
        404,
        json!({"error": {"code": 404, "message": "Endpoint not found", "details": "/api/nothing"}}),
    );
    match client.version().unwrap_err() {
        Error::Transport(e) => {
            assert_eq!(e.code, 404);
            assert_eq!(e.message, "Endpoint not found");
            assert_eq!(e.details.as_deref(), Some("/api/nothing"));
            assert_eq!(e.trace, None);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_connection_failure() {
    let client = stub_client();
    client
        .transport()
        .push_failure(TransportError::connection("connection refused"));
    let err = client.aggregators().unwrap_err();
    assert_eq!(err.status_code(), Some(0));
}

#[test]
fn test_server_information() {
    let client = stub_client();
    client
        .transport()
        .push_json(200, json!({"version": "2.4.0", "short_revision": "abc123"}));
    client.transport().push_json(200, json!(["sum", "avg", "max"]));

    let version = client.version().unwrap();
    assert_eq!(version.get("version").map(String::as_str), Some("2.4.0"));
    assert_eq!(client.aggregators().unwrap(), vec!["sum", "avg", "max"]);

    let requests = client.transport().requests();
    assert_eq!(requests[0].path, "/api/version");
    assert_eq!(requests[1].path, "/api/aggregators");
    assert!(requests.iter().all(|r| r.method == Method::Get));
}

// =============================================================================
// Data points
// =============================================================================

#[test]
fn test_put_partial_failure_summary() {
    let client = stub_client();
    client.transport().push_json(
        400,
        json!({"success": 1, "failed": 1, "errors": [{"error": "Unknown metric"}]}),
    );

    let points = vec![
        Measurement::new(cpu_series(), 1356998400, 42).unwrap(),
        Measurement::new(cpu_series(), 1356998460, 43.5).unwrap(),
    ];
    let summary = client
        .put_measurements(&points, PutOptions::default().with_details())
        .unwrap()
        .unwrap();
    assert_eq!(summary.success, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors.len(), 1);

    let request = client.transport().last_request().unwrap();
    assert_eq!(request.param("details"), Some(""));
    assert_eq!(request.body.unwrap().as_array().unwrap().len(), 2);
}

#[test]
fn test_put_400_error_object_is_raised() {
    let client = stub_client();
    client.transport().push_json(
        400,
        json!({"error": {"code": 400, "message": "One or more data points had errors"}}),
    );
    let points = vec![Measurement::new(cpu_series(), 1356998400, 1).unwrap()];
    let err = client.put_measurements(&points, PutOptions::default()).unwrap_err();
    assert_eq!(err.status_code(), Some(400));
}

#[test]
fn test_invalid_measurement_is_not_sent() {
    let client = stub_client();
    let mut point = Measurement::new(cpu_series(), 1356998400, 1).unwrap();
    point.timestamp = -1;
    let err = client.put_measurements(&[point], PutOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(client.transport().request_count(), 0);
}

// =============================================================================
// Annotations
// =============================================================================

#[test]
fn test_annotation_round_trip() {
    let client = stub_client();
    let stored = json!({
        "tsuid": "000001000001000001", "description": "Network outage", "notes": "",
        "custom": {"severity": "high"}, "startTime": 1369141261, "endTime": 0
    });

    let mut note = Annotation::new(1369141261)
        .unwrap()
        .with_tsuid("000001000001000001")
        .with_description("Network outage")
        .with_custom("severity", "high");

    client.transport().push_json(200, stored.clone());
    note.save_to(&client).unwrap();
    assert_eq!(note.end_time, None);
    let body = client.transport().last_request().unwrap().body.unwrap();
    assert_eq!(body["startTime"], 1369141261);
    assert_eq!(body["custom"]["severity"], "high");
    assert!(body.get("endTime").is_none());

    client.transport().push_json(200, stored);
    note.load_from(&client).unwrap();
    let request = client.transport().last_request().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.param("startTime"), Some("1369141261"));
    assert_eq!(request.param("tsuid"), Some("000001000001000001"));
    assert_eq!(request.param("endTime"), None);

    client.transport().push_empty(204);
    note.delete(&client).unwrap();
    let request = client.transport().last_request().unwrap();
    assert_eq!(request.method, Method::Delete);
    assert_eq!(
        request.body.unwrap(),
        json!({"startTime": 1369141261, "tsuid": "000001000001000001"})
    );
}

#[test]
fn test_global_annotation() {
    let client = stub_client();
    let note = Annotation::new(1369141261).unwrap().with_tsuid("");
    assert!(note.is_global());

    client.transport().push_empty(204);
    client.delete_annotation(&note).unwrap();
    assert_eq!(
        client.transport().last_request().unwrap().body.unwrap(),
        json!({"startTime": 1369141261})
    );
}

#[test]
fn test_bad_annotation_from_store() {
    let client = stub_client();
    client
        .transport()
        .push_json(200, json!({"startTime": 100, "endTime": 50}));
    let err = client.get_annotation(100, None, None).unwrap_err();
    assert!(matches!(err, Error::ProtocolMismatch(_)));
}

// =============================================================================
// UID metadata
// =============================================================================

#[test]
fn test_uidmeta_load_and_save() {
    let client = stub_client();
    let stored = json!({
        "uid": "00002A", "type": "TAGV", "name": "web01", "description": "Web server 1",
        "notes": "", "created": 1350425579, "custom": null, "displayName": ""
    });

    let mut meta = UidMeta::with_uid(UidKind::Tagv, "00002A");
    client.transport().push_json(200, stored.clone());
    meta.load_from(&client).unwrap();
    assert_eq!(meta.name, "web01");
    assert!(meta.custom.is_empty());
    let request = client.transport().last_request().unwrap();
    assert_eq!(request.param("uid"), Some("00002A"));
    assert_eq!(request.param("type"), Some("tagv"));

    meta.display_name = "Web 01".to_string();
    let mut updated = stored;
    updated["displayName"] = json!("Web 01");
    client.transport().push_json(200, updated);
    meta.save_to(&client).unwrap();

    let body = client.transport().last_request().unwrap().body.unwrap();
    assert_eq!(body["uid"], "00002A");
    assert_eq!(body["type"], "tagv");
    assert_eq!(body["displayName"], "Web 01");
    assert_eq!(meta.display_name, "Web 01");
}

#[test]
fn test_uidmeta_without_uid_fails_without_io() {
    let client = stub_client();
    let mut meta = UidMeta::named(UidKind::Metric, "sys.cpu.0");
    assert!(matches!(meta.load_from(&client), Err(Error::Validation(_))));
    assert!(meta.delete(&client).is_err());
    assert_eq!(client.transport().request_count(), 0);
}

#[test]
fn test_uidmeta_entity_kind() {
    let meta = UidMeta::from_value(json!({"uid": "0001", "type": "metric", "name": "sys.cpu.0"})).unwrap();
    assert_eq!(meta.kind, Some(UidKind::Metric));
    assert!(UidMeta::from_value(json!({"uid": "xyz", "name": "a"})).is_err());
}

// =============================================================================
// Search and suggest
// =============================================================================

#[test]
fn test_search_lookup_is_get() {
    let client = stub_client();
    client
        .transport()
        .push_json(200, json!({"type": "LOOKUP", "results": [], "totalResults": 0}));

    let search = SearchRequest::lookup("sys.cpu.0", [("host", "*")]).with_use_meta(true);
    let result = client.search(SearchMode::Lookup, &search).unwrap();
    assert_eq!(result["totalResults"], 0);

    let request = client.transport().last_request().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.path, "/api/search/lookup");
    assert_eq!(request.param("m"), Some("sys.cpu.0{host=*}"));
    assert_eq!(request.param("use_meta"), Some("true"));
}

#[test]
fn test_search_query_is_post() {
    let client = stub_client();
    client.transport().push_json(200, json!({"results": []}));

    let search = SearchRequest::query("name:sys.cpu.*").with_page(50, 10);
    client.search(SearchMode::TsMeta, &search).unwrap();

    let request = client.transport().last_request().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path, "/api/search/tsmeta");
    assert_eq!(
        request.body.unwrap(),
        json!({"query": "name:sys.cpu.*", "limit": 10, "startIndex": 50})
    );

    let empty_page = SearchRequest::query("x").with_page(0, 0);
    assert!(client.search(SearchMode::Annotation, &empty_page).is_err());
    assert_eq!(client.transport().request_count(), 1);
}

#[test]
fn test_suggest_body() {
    let client = stub_client();
    client.transport().push_json(200, json!(["sys.cpu.0", "sys.cpu.1"]));

    let names = client.suggest(SuggestKind::Metrics, Some("sys"), Some(10)).unwrap();
    assert_eq!(names, vec!["sys.cpu.0", "sys.cpu.1"]);
    assert_eq!(
        client.transport().last_request().unwrap().body.unwrap(),
        json!({"type": "metrics", "q": "sys", "max": 10})
    );

    assert!(client.suggest(SuggestKind::Tagk, None, Some(0)).is_err());
}
