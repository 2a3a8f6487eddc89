use apq_common::http::StatusCode;
use automatic_persisted_queries_plugin::ResponseCachePolicy;
use e2e::suite::{
  extensions_param, first_error_message, http_get, persisted_queries, persisted_query, TestSuite,
};
use serde_json::{json, Value};
use tokio::test;

const QUERY: &str = "{ a }";
const HASH: &str = "1c7e1e347f726166b5b1c55afd61f278cc9b45e00c108ec33d540a566379811b";
const OTHER_HASH: &str = "ec2e01311ab3b02f3d8c8c712f9e579356d332cd007ac4c1ea5df727f482f05f";

fn suite_plugins() -> Vec<apq_config::PluginDefinition> {
  vec![http_get(), persisted_queries(ResponseCachePolicy::CacheTag)]
}

#[test]
async fn unknown_hash_then_register_then_replay() {
  let suite = TestSuite::new(suite_plugins()).await;

  let not_found = suite.get(&[extensions_param(HASH)]).await;
  assert_eq!(not_found.status, StatusCode::OK);
  assert_eq!(
    not_found.json_body::<Value>().unwrap(),
    json!({
      "errors": [
        { "message": "PersistedQueryNotFound", "extensions": { "category": "request" } }
      ]
    })
  );
  assert_eq!(suite.upstream_calls(), 0);

  let registered = suite
    .post(json!({ "query": QUERY, "extensions": persisted_query(HASH) }))
    .await;
  assert_eq!(registered.status, StatusCode::OK);
  assert_eq!(
    registered.json_body::<Value>().unwrap()["data"]["operation"],
    json!(QUERY)
  );

  let replayed = suite.get(&[extensions_param(HASH)]).await;
  assert_eq!(replayed.status, StatusCode::OK);
  assert_eq!(
    replayed.json_body::<Value>().unwrap()["data"]["operation"],
    json!(QUERY)
  );
  assert_eq!(suite.upstream_calls(), 2);
}

#[test]
async fn hash_only_post_replays_registered_query() {
  let suite = TestSuite::new(suite_plugins()).await;

  suite
    .post(json!({ "query": QUERY, "extensions": persisted_query(HASH) }))
    .await;
  let replayed = suite
    .post(json!({ "extensions": persisted_query(HASH), "variables": { "id": 1 } }))
    .await;

  assert_eq!(
    replayed.json_body::<Value>().unwrap()["data"],
    json!({ "operation": QUERY, "variables": { "id": 1 } })
  );
}

#[test]
async fn mismatched_hash_is_rejected_without_registering() {
  let suite = TestSuite::new(suite_plugins()).await;

  let rejected = suite
    .post(json!({ "query": QUERY, "extensions": persisted_query(OTHER_HASH) }))
    .await;
  assert_eq!(rejected.status, StatusCode::OK);
  assert_eq!(
    rejected.json_body::<Value>().unwrap(),
    json!({
      "errors": [
        { "message": "Provided sha does not match query", "extensions": { "category": "graphql" } }
      ]
    })
  );
  assert_eq!(suite.upstream_calls(), 0);

  for hash in [HASH, OTHER_HASH] {
    let lookup = suite.get(&[extensions_param(hash)]).await;
    assert_eq!(
      first_error_message(&lookup).as_deref(),
      Some("PersistedQueryNotFound")
    );
  }
}

#[test]
async fn hash_comparison_is_case_sensitive() {
  let suite = TestSuite::new(suite_plugins()).await;

  let rejected = suite
    .post(json!({ "query": QUERY, "extensions": persisted_query(&HASH.to_uppercase()) }))
    .await;

  assert_eq!(
    first_error_message(&rejected).as_deref(),
    Some("Provided sha does not match query")
  );
}

#[test]
async fn plain_queries_skip_persistence() {
  let suite = TestSuite::new(suite_plugins()).await;

  let response = suite.post(json!({ "query": QUERY })).await;
  assert_eq!(
    response.json_body::<Value>().unwrap()["data"]["operation"],
    json!(QUERY)
  );

  let lookup = suite.get(&[extensions_param(HASH)]).await;
  assert_eq!(
    first_error_message(&lookup).as_deref(),
    Some("PersistedQueryNotFound")
  );
}

#[test]
async fn disabled_plugin_does_not_register() {
  let suite = TestSuite::new(vec![
    http_get(),
    apq_config::PluginDefinition::AutomaticPersistedQueriesPlugin {
      enabled: Some(false),
      config: None,
    },
  ])
  .await;

  let executed = suite
    .post(json!({ "query": QUERY, "extensions": persisted_query(OTHER_HASH) }))
    .await;
  assert_eq!(
    executed.json_body::<Value>().unwrap()["data"]["operation"],
    json!(QUERY)
  );

  let lookup = suite.get(&[extensions_param(OTHER_HASH)]).await;
  assert_eq!(
    first_error_message(&lookup).as_deref(),
    Some("PersistedQueryNotFound")
  );
}

#[test]
async fn request_without_query_or_hash_is_bad_request() {
  let suite = TestSuite::new(suite_plugins()).await;

  let response = suite.post(json!({ "variables": {} })).await;

  assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[test]
async fn registered_query_survives_unrelated_registration() {
  let suite = TestSuite::new(suite_plugins()).await;
  let unicode_query = "query { greeting(lang: \"日本語\") { text } }  \n";
  let unicode_hash = "346045a8ce8d15e2e90245e245067be0f8ce0f9c4c3721886f9f2b9a8eb260d9";

  suite
    .post(json!({ "query": unicode_query, "extensions": persisted_query(unicode_hash) }))
    .await;
  suite
    .post(json!({ "query": QUERY, "extensions": persisted_query(HASH) }))
    .await;

  let replayed = suite
    .post(json!({ "extensions": persisted_query(unicode_hash) }))
    .await;
  assert_eq!(
    replayed.json_body::<Value>().unwrap()["data"]["operation"],
    json!(unicode_query)
  );

  let other = suite.post(json!({ "extensions": persisted_query(HASH) })).await;
  assert_eq!(
    other.json_body::<Value>().unwrap()["data"]["operation"],
    json!(QUERY)
  );
}
