//! Shared fixtures for integration tests

#![allow(dead_code)]

use opentsdb_client::transport::StubTransport;
use opentsdb_client::{Client, TimeSeries};
use serde_json::{json, Value};

/// Client over an empty scripted transport
pub fn stub_client() -> Client<StubTransport> {
    Client::new(StubTransport::new())
}

/// `sys.cpu.0{dc=lga,host=web01}`
pub fn cpu_series() -> TimeSeries {
    TimeSeries::new("sys.cpu.0", [("host", "web01"), ("dc", "lga")]).unwrap()
}

/// A TS metadata record as the store returns it
pub fn stored_tsmeta(tsuid: &str) -> Value {
    json!({
        "tsuid": tsuid,
        "metric": {
            "uid": "000042", "type": "METRIC", "name": "sys.cpu.0",
            "description": "System CPU time", "notes": "", "created": 1350425579,
            "custom": null, "displayName": ""
        },
        "tags": [
            {"uid": "000013", "type": "TAGK", "name": "dc", "description": "", "notes": "",
             "created": 1350425579, "custom": null, "displayName": ""},
            {"uid": "00001B", "type": "TAGV", "name": "lga", "description": "", "notes": "",
             "created": 1350425579, "custom": null, "displayName": ""},
            {"uid": "000012", "type": "TAGK", "name": "host", "description": "", "notes": "",
             "created": 1350425579, "custom": null, "displayName": ""},
            {"uid": "00001A", "type": "TAGV", "name": "web01", "description": "Web server 1",
             "notes": "", "created": 1350425579, "custom": {"owner": "ops"}, "displayName": ""}
        ],
        "description": "", "notes": "", "created": 1350425579, "units": "", "retention": 0,
        "max": "NaN", "min": "NaN", "custom": null, "displayName": "", "dataType": "gauge",
        "lastReceived": 1356998400, "totalDatapoints": 12532
    })
}

/// A root branch with one child stub
pub fn root_branch(tree_id: u32, child_id: &str) -> Value {
    json!({
        "leaves": null,
        "branches": [
            {"leaves": null, "branches": null, "path": {"0": "ROOT", "1": "sys"},
             "treeId": tree_id, "displayName": "sys", "branchId": child_id, "depth": 1}
        ],
        "path": {"0": "ROOT"},
        "treeId": tree_id,
        "displayName": "ROOT",
        "branchId": format!("{:04X}", tree_id),
        "depth": 0
    })
}
