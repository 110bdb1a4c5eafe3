//! Query validation and endpoint dispatch through the client

mod common;

use common::stub_client;
use opentsdb_client::query::{
    ExpressionQuery, Filter, IdSubQuery, JoinOperator, LastMetric, LastValueQuery, MetricSubQuery,
    Query, QueryRequest,
};
use opentsdb_client::transport::Method;
use opentsdb_client::{Error, Validate};
use serde_json::json;

fn expression_query() -> ExpressionQuery {
    let fill = ExpressionQuery::fill_policy("scalar", Some(0.0)).unwrap();
    ExpressionQuery::new(
        ExpressionQuery::time_section("sum", "1h-ago", None, None, false).unwrap(),
        vec![ExpressionQuery::filter_set(
            "f1",
            vec![Filter::new("wildcard", "host", "web*").with_group_by(true)],
        )
        .unwrap()],
        vec![
            ExpressionQuery::metric("a", "f1", "sys.cpu.user", None, Some(fill)).unwrap(),
            ExpressionQuery::metric("b", "f1", "sys.cpu.sys", Some("max"), None).unwrap(),
        ],
        vec![ExpressionQuery::expression(
            "e",
            "a + b",
            Some(ExpressionQuery::join(JoinOperator::Union, false, true)),
            None,
        )
        .unwrap()],
    )
    .with_output(ExpressionQuery::output("e", Some("cpu.total")).unwrap())
}

#[test]
fn test_metric_query_goes_to_query_endpoint() {
    let client = stub_client();
    client.transport().push_json(200, json!([{"metric": "sys.cpu.0", "dps": {}}]));

    let query = Query::new(vec![], "1h-ago")
        .with_end("2013/01/01-12:00")
        .with_query(
            MetricSubQuery::new("sum", "sys.cpu.0")
                .with_filter(Filter::new("literal_or", "host", "web01|web02"))
                .with_filter(Filter::new("wildcard", "host", "web*").with_group_by(true)),
        )
        .with_query(IdSubQuery::new("avg", ["000001000001000001"]))
        .with_show_tsuids(true);

    let result = client.query(query).unwrap();
    assert_eq!(result[0]["metric"], "sys.cpu.0");

    let request = client.transport().last_request().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path, "/api/query");
    let body = request.body.unwrap();
    assert_eq!(body["end"], "2013/01/01-12:00");
    assert_eq!(body["showTSUIDs"], true);
    assert_eq!(body["queries"][0]["filters"].as_array().unwrap().len(), 2);
    assert_eq!(body["queries"][1], json!({"aggregator": "avg", "tsuids": ["000001000001000001"]}));
}

#[test]
fn test_invalid_query_is_not_sent() {
    let client = stub_client();
    let err = client.query(Query::new(vec![], "1h-ago")).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let bad_filter = MetricSubQuery::new("sum", "sys.cpu.0").with_filter(Filter::new("wildcard", "host", ""));
    assert!(client.query(Query::new(vec![bad_filter.into()], "1h-ago")).is_err());
    assert!(client.query(LastValueQuery::new()).is_err());
    assert_eq!(client.transport().request_count(), 0);
}

#[test]
fn test_expression_query_dispatch() {
    let client = stub_client();
    client.transport().push_json(200, json!({"outputs": [], "query": {}}));

    client.query(expression_query()).unwrap();

    let request = client.transport().last_request().unwrap();
    assert_eq!(request.path, "/api/query/exp");
    let body = request.body.unwrap();
    assert_eq!(body["metrics"][0]["fillPolicy"], json!({"policy": "scalar", "value": 0.0}));
    assert_eq!(body["metrics"][1]["aggregator"], "max");
    assert_eq!(
        body["expressions"][0]["join"],
        json!({"operator": "union", "useQueryTags": false, "includeAggTags": true})
    );
    assert_eq!(body["outputs"][0]["alias"], "cpu.total");
    assert_eq!(body["filters"][0]["tags"][0]["groupBy"], true);
}

#[test]
fn test_last_value_dispatch() {
    let client = stub_client();
    client.transport().push_json(200, json!([]));

    let query = LastValueQuery::new()
        .with_metric(LastMetric::new("sys.cpu.0", [("host", "web01")]))
        .with_back_scan(24);
    client.query(query).unwrap();

    let request = client.transport().last_request().unwrap();
    assert_eq!(request.path, "/api/query/last");
    assert_eq!(request.body.unwrap()["backScan"], 24);
}

#[test]
fn test_request_enum_validation() {
    let mut query = expression_query();
    query.metrics[0].filter_id = "missing".to_string();
    let request = QueryRequest::from(query);
    assert!(!request.validate());
    assert_eq!(request.endpoint(), "/api/query/exp");
}

#[test]
fn test_query_error_from_store() {
    let client = stub_client();
    client.transport().push_json(
        400,
        json!({"error": {"code": 400, "message": "No such name for 'metrics': 'sys.cpu.9'"}}),
    );
    let query = Query::new(vec![MetricSubQuery::new("sum", "sys.cpu.9").into()], 1356998400);
    let err = client.query(query).unwrap_err();
    match err {
        Error::Transport(e) => assert!(e.message.contains("sys.cpu.9")),
        other => panic!("unexpected error {:?}", other),
    }
}
