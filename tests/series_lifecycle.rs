//! Time series UID assignment and metadata round trips
//!
//! Drives [`TimeSeries`] against a scripted transport and checks both the
//! requests it sends and the state it ends up in.

mod common;

use common::{cpu_series, stored_tsmeta, stub_client};
use opentsdb_client::transport::Method;
use opentsdb_client::{Error, Measurement, TimeSeries, UidKind};
use serde_json::json;
use std::collections::BTreeMap;

// =============================================================================
// UID assignment
// =============================================================================

#[test]
fn test_assign_uid_merges_partial_failure() {
    let client = stub_client();
    client.transport().push_json(
        400,
        json!({
            "metric": {"sys.cpu.0": "000042"},
            "metric_errors": {},
            "tagk": {"host": "000012", "dc": "000013"},
            "tagk_errors": {},
            "tagv": {"web01": "00001A"},
            "tagv_errors": {"lga": "Name already exists with UID: 00001B"}
        }),
    );

    let mut series = cpu_series();
    series.assign_uid(&client).unwrap();

    assert_eq!(series.metric_uid(), Some("000042"));
    assert_eq!(series.tagk_uid("dc"), Some("000013"));
    assert_eq!(series.tagv_uid("web01"), Some("00001A"));
    assert_eq!(series.tagv_uid("lga"), Some("00001B"));

    let request = client.transport().last_request().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path, "/api/uid/assign");
    let body = request.body.unwrap();
    assert_eq!(body["metric"], json!(["sys.cpu.0"]));
    assert_eq!(body["tagk"], json!(["dc", "host"]));
    assert_eq!(body["tagv"], json!(["lga", "web01"]));
}

#[test]
fn test_assign_uid_only_requests_missing_names() {
    let client = stub_client();
    client.transport().push_json(
        200,
        json!({"metric": {"sys.cpu.0": "000042"}, "tagk": {"host": "000012", "dc": "000013"},
               "tagv": {"web01": "00001A", "lga": "00001B"}}),
    );
    let mut series = cpu_series();
    series.assign_uid(&client).unwrap();
    assert!(series.unassigned().is_empty());

    // Everything is known now, so a second call stays local.
    series.assign_uid(&client).unwrap();
    assert_eq!(client.transport().request_count(), 1);
}

#[test]
fn test_assign_uid_unaccounted_name() {
    let client = stub_client();
    client.transport().push_json(
        200,
        json!({"metric": {"sys.cpu.0": "000042"}, "tagk": {"host": "000012", "dc": "000013"},
               "tagv": {"web01": "00001A"}}),
    );
    let mut series = cpu_series();
    let err = series.assign_uid(&client).unwrap_err();
    match err {
        Error::Reconciliation(e) => {
            assert_eq!(e.name, "lga");
            assert_eq!(e.raw["tagv"]["web01"], "00001A");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(series.metric_uid(), None);
}

#[test]
fn test_assign_uid_with_tsuid_fails_without_io() {
    let client = stub_client();
    let mut series = TimeSeries::from_tsuid("00004200001200001A").unwrap();
    assert!(matches!(series.assign_uid(&client), Err(Error::Validation(_))));
    assert_eq!(client.transport().request_count(), 0);
}

#[test]
fn test_assign_uid_transport_error() {
    let client = stub_client();
    client.transport().push_json(
        500,
        json!({"error": {"code": 500, "message": "HBase unavailable"}}),
    );
    let mut series = cpu_series();
    let err = series.assign_uid(&client).unwrap_err();
    assert_eq!(err.status_code(), Some(500));
}

// =============================================================================
// Metadata
// =============================================================================

#[test]
fn test_load_by_metric_query() {
    let client = stub_client();
    client
        .transport()
        .push_json(200, json!([stored_tsmeta("00004200001300001B00001200001A")]));

    let mut series = cpu_series();
    series.load_from(&client).unwrap();

    let request = client.transport().last_request().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.param("m"), Some("sys.cpu.0{dc=lga,host=web01}"));

    assert_eq!(series.tsuid.as_deref(), Some("00004200001300001B00001200001A"));
    assert_eq!(series.metric_uid(), Some("000042"));
    assert_eq!(series.tagk_uid("host"), Some("000012"));
    assert_eq!(series.tagv_uid("lga"), Some("00001B"));
    assert_eq!(series.metadata().data_type, "gauge");
    assert_eq!(series.metadata().min, None);
    assert_eq!(
        series.tagv_meta("web01").unwrap().custom.get("owner").map(String::as_str),
        Some("ops")
    );
}

#[test]
fn test_load_by_tsuid_rebuilds_identity() {
    let client = stub_client();
    client
        .transport()
        .push_json(200, stored_tsmeta("00004200001300001B00001200001A"));

    let mut series = TimeSeries::from_tsuid("00004200001300001B00001200001A").unwrap();
    series.load_from(&client).unwrap();

    assert_eq!(series.metric.as_deref(), Some("sys.cpu.0"));
    let expected: BTreeMap<String, String> = [("dc", "lga"), ("host", "web01")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(series.tags, expected);
    assert_eq!(
        client.transport().last_request().unwrap().param("tsuid"),
        Some("00004200001300001B00001200001A")
    );
}

#[test]
fn test_load_missing_record_creates_it() {
    let client = stub_client();
    client.transport().push_json(200, json!([]));
    client
        .transport()
        .push_json(200, stored_tsmeta("00004200001300001B00001200001A"));

    let mut series = cpu_series();
    series.load_from(&client).unwrap();

    let requests = client.transport().requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, Method::Post);
    assert_eq!(requests[1].param("create"), Some("true"));
    assert_eq!(requests[1].param("m"), Some("sys.cpu.0{dc=lga,host=web01}"));
    assert!(series.tsuid.is_some());
}

#[test]
fn test_load_tsuid_not_found_falls_back_to_create() {
    let client = stub_client();
    client.transport().push_json(
        404,
        json!({"error": {"code": 404, "message": "Could not find Timeseries meta data"}}),
    );
    client
        .transport()
        .push_json(200, stored_tsmeta("00004200001300001B00001200001A"));

    let mut series = TimeSeries::from_parts(
        Some("sys.cpu.0".to_string()),
        [("host", "web01"), ("dc", "lga")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        Some("00004200001300001B00001200001A".to_string()),
    )
    .unwrap();
    series.load_from(&client).unwrap();
    assert_eq!(client.transport().request_count(), 2);
    assert_eq!(series.metric_uid(), Some("000042"));
}

#[test]
fn test_load_ambiguous_match() {
    let client = stub_client();
    client.transport().push_json(
        200,
        json!([stored_tsmeta("00004200001300001B00001200001A"), stored_tsmeta("00004200001300001C00001200001A")]),
    );
    let mut series = cpu_series();
    assert!(matches!(series.load_from(&client), Err(Error::ProtocolMismatch(_))));
}

#[test]
fn test_delete_meta_recursive() {
    let client = stub_client();
    client
        .transport()
        .push_json(200, stored_tsmeta("00004200001300001B00001200001A"));
    let mut series = TimeSeries::from_tsuid("00004200001300001B00001200001A").unwrap();
    series.load_from(&client).unwrap();

    // tsmeta, metric, two tag keys, two tag values
    for _ in 0..6 {
        client.transport().push_empty(204);
    }
    series.delete_meta(&client, true).unwrap();

    let requests = client.transport().requests();
    assert_eq!(requests.len(), 7);
    assert!(requests[1..].iter().all(|r| r.method == Method::Delete));
    assert_eq!(requests[1].path, "/api/uid/tsmeta");
    assert_eq!(requests[2].body.as_ref().unwrap()["type"], "metric");
    assert_eq!(series.metric_uid(), None);
    assert_eq!(series.metric_meta().kind, Some(UidKind::Metric));
}

// =============================================================================
// Data points
// =============================================================================

#[test]
fn test_measurement_put_body() {
    let client = stub_client();
    client.transport().push_empty(204);

    let measurement = Measurement::parse(cpu_series(), 1356998400, "42.5").unwrap();
    measurement.save_to(&client).unwrap();

    let request = client.transport().last_request().unwrap();
    assert_eq!(request.path, "/api/put");
    assert_eq!(
        request.body.unwrap(),
        json!([{
            "metric": "sys.cpu.0",
            "tags": {"dc": "lga", "host": "web01"},
            "timestamp": 1356998400,
            "value": 42.5
        }])
    );
}
