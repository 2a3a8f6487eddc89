use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use apq_cache::{
  config::{CacheStoreConfig, InMemoryConfig},
  CacheManager,
};
use apq_common::{
  execute::RequestExecutionContext,
  graphql::GraphQLResponse,
  http::{Bytes, GatewayHttpRequest, GatewayHttpResponse, HttpHeadersMap, Method, CONTENT_TYPE},
};
use apq_config::PluginDefinition;
use apq_engine::{
  gateway::{Gateway, GatewayRouteData},
  source::runtime::{SourceError, SourceRuntime},
};
use automatic_persisted_queries_plugin::ResponseCachePolicy;
use futures::future::LocalBoxFuture;
use serde_json::{json, Value};

pub const APQ_STORE: &str = "apq";
pub const PAGE_STORE: &str = "pages";

/// Answers every operation with its own text and variables, and counts the calls.
#[derive(Debug, Default)]
pub struct EchoSource {
  calls: AtomicUsize,
}

impl EchoSource {
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl SourceRuntime for EchoSource {
  fn execute<'a>(
    &'a self,
    _route_data: &'a GatewayRouteData,
    request_context: &'a mut RequestExecutionContext,
  ) -> LocalBoxFuture<'a, Result<GraphQLResponse, SourceError>> {
    Box::pin(async move {
      let request = request_context
        .downstream_graphql_request
        .as_ref()
        .ok_or(SourceError::MissingOperation)?;
      let operation = request
        .operation
        .clone()
        .ok_or(SourceError::MissingOperation)?;

      self.calls.fetch_add(1, Ordering::SeqCst);

      Ok(GraphQLResponse::new_data(json!({
        "operation": operation,
        "variables": request.variables,
      })))
    })
  }
}

pub fn cache_manager() -> Arc<CacheManager> {
  Arc::new(CacheManager::new(&[
    CacheStoreConfig::InMemory {
      id: APQ_STORE.to_string(),
      config: InMemoryConfig::default(),
    },
    CacheStoreConfig::InMemory {
      id: PAGE_STORE.to_string(),
      config: InMemoryConfig::default(),
    },
  ]))
}

pub fn http_get() -> PluginDefinition {
  PluginDefinition::HttpGetPlugin {
    enabled: Some(true),
    config: None,
  }
}

pub fn persisted_queries(not_found_policy: ResponseCachePolicy) -> PluginDefinition {
  PluginDefinition::AutomaticPersistedQueriesPlugin {
    enabled: Some(true),
    config: Some(automatic_persisted_queries_plugin::Config {
      store_id: APQ_STORE.to_string(),
      not_found_policy,
    }),
  }
}

pub fn page_cache() -> PluginDefinition {
  PluginDefinition::HttpCachingPlugin {
    enabled: Some(true),
    config: http_caching_plugin::Config {
      store_id: PAGE_STORE.to_string(),
      max_age: 60,
      contexts: http_caching_plugin::config::default_contexts(),
      expose_cache_tags: true,
    },
  }
}

/// The full chain: GET support, persisted queries and a page cache.
pub fn default_plugins() -> Vec<PluginDefinition> {
  vec![
    http_get(),
    persisted_queries(ResponseCachePolicy::CacheTag),
    page_cache(),
  ]
}

pub struct TestSuite {
  pub route: GatewayRouteData,
  pub source: Arc<EchoSource>,
  pub cache_manager: Arc<CacheManager>,
}

impl TestSuite {
  pub async fn new(plugins: Vec<PluginDefinition>) -> Self {
    let source = Arc::new(EchoSource::default());
    let cache_manager = cache_manager();
    let route = build_route(&plugins, source.clone(), cache_manager.clone()).await;

    Self {
      route,
      source,
      cache_manager,
    }
  }

  pub async fn run(&self, request: GatewayHttpRequest) -> GatewayHttpResponse {
    Gateway::execute(request, &self.route).await
  }

  pub async fn get(&self, params: &[(&str, String)]) -> GatewayHttpResponse {
    self.run(get_request(params)).await
  }

  pub async fn post(&self, body: Value) -> GatewayHttpResponse {
    self.run(post_request(body)).await
  }

  pub fn upstream_calls(&self) -> usize {
    self.source.calls()
  }
}

pub async fn build_route(
  plugins: &[PluginDefinition],
  source: Arc<dyn SourceRuntime>,
  cache_manager: Arc<CacheManager>,
) -> GatewayRouteData {
  GatewayRouteData::build("/graphql", plugins, source, cache_manager)
    .await
    .expect("failed to build test route")
}

pub fn persisted_query(hash: &str) -> Value {
  json!({ "persistedQuery": { "version": 1, "sha256Hash": hash } })
}

pub fn extensions_param(hash: &str) -> (&'static str, String) {
  ("extensions", persisted_query(hash).to_string())
}

pub fn get_request(params: &[(&str, String)]) -> GatewayHttpRequest {
  let query_string = params
    .iter()
    .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
    .collect::<Vec<_>>()
    .join("&");

  GatewayHttpRequest {
    method: Method::GET,
    uri: format!("/graphql?{}", query_string),
    query_string,
    headers: HttpHeadersMap::new(),
    body: Bytes::new(),
  }
}

pub fn post_request(body: Value) -> GatewayHttpRequest {
  let mut headers = HttpHeadersMap::new();
  headers.append(CONTENT_TYPE, "application/json".parse().unwrap());

  GatewayHttpRequest {
    method: Method::POST,
    uri: "/graphql".to_string(),
    query_string: "".to_string(),
    headers,
    body: body.to_string().into(),
  }
}

pub fn header<'a>(response: &'a GatewayHttpResponse, name: &str) -> Option<&'a str> {
  response.headers.get(name).and_then(|v| v.to_str().ok())
}

pub fn first_error_message(response: &GatewayHttpResponse) -> Option<String> {
  response.json_body::<Value>().ok().and_then(|body| {
    body["errors"][0]["message"]
      .as_str()
      .map(ToString::to_string)
  })
}
