use apq_common::http::StatusCode;
use apq_config::{load_config, parse_config_contents, ConfigError, ConfigFormat};
use apq_engine::gateway::Gateway;
use e2e::suite::{cache_manager, extensions_param, get_request, header, post_request, persisted_query};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tokio::test;

const QUERY: &str = "{ a }";
const HASH: &str = "1c7e1e347f726166b5b1c55afd61f278cc9b45e00c108ec33d540a566379811b";

const CONFIG: &str = r#"
cache_stores:
  - type: in_memory
    id: apq
  - type: in_memory
    id: pages

sources:
  - type: graphql
    id: upstream
    config:
      endpoint: ${UPSTREAM_URL}

endpoints:
  - path: /graphql
    from: upstream
    plugins:
      - type: http_get
      - type: automatic_persisted_queries
      - type: http_caching
        config:
          cache: pages
          expose_cache_tags: true
"#;

#[test]
async fn gateway_from_config_serves_persisted_queries() {
  let mock_server = MockServer::start_async().await;
  let mock = mock_server
    .mock_async(|when, then| {
      when.method(POST).path("/graphql");
      then
        .status(200)
        .header("content-type", "application/json")
        .json_body(json!({ "data": { "a": 1 } }));
    })
    .await;
  let upstream_url = mock_server.url("/graphql");

  let config = parse_config_contents(CONFIG.to_string(), ConfigFormat::Yaml, |key: &str| {
    (key == "UPSTREAM_URL").then(|| upstream_url.clone())
  })
  .unwrap();
  let gateway = Gateway::new(&config, cache_manager()).await.unwrap();

  assert!(gateway.match_route("/unknown").is_none());
  let route = gateway.match_route("/graphql").expect("route");
  assert!(route.capabilities.contains("automatic_persisted_queries"));

  let not_found = Gateway::execute(get_request(&[extensions_param(HASH)]), route).await;
  assert_eq!(header(&not_found, "x-cache"), Some("MISS"));

  let registered = Gateway::execute(
    post_request(json!({ "query": QUERY, "extensions": persisted_query(HASH) })),
    route,
  )
  .await;
  assert_eq!(registered.status, StatusCode::OK);

  let replayed = Gateway::execute(get_request(&[extensions_param(HASH)]), route).await;
  assert_eq!(
    replayed.json_body::<Value>().unwrap()["data"],
    json!({ "a": 1 })
  );

  mock.assert_hits_async(2).await;
}

#[test]
async fn unknown_plugin_store_is_rejected() {
  let contents = r#"
sources:
  - type: graphql
    id: upstream
    config:
      endpoint: http://localhost:4000/graphql

endpoints:
  - path: /graphql
    from: upstream
    plugins:
      - type: automatic_persisted_queries
"#;

  let result = parse_config_contents(
    contents.to_string(),
    ConfigFormat::Yaml,
    |_: &str| -> Option<String> { None },
  );

  assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
async fn mocked_source_answers_from_file() {
  let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../config/fixtures/config.yaml");
  let config = load_config(path, |_: &str| -> Option<String> { None }).unwrap();
  let gateway = Gateway::new(&config, cache_manager()).await.unwrap();
  let route = gateway.match_route("/graphql").expect("route");

  let response = Gateway::execute(
    post_request(json!({ "query": QUERY, "extensions": persisted_query(HASH) })),
    route,
  )
  .await;

  assert_eq!(
    response.json_body::<Value>().unwrap(),
    json!({ "data": { "hello": "world" } })
  );
}
