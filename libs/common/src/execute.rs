use std::collections::HashSet;

use crate::{
  cacheability::CacheabilityMetadata,
  graphql::GraphQLRequest,
  http::{GatewayHttpRequest, GatewayHttpResponse},
};
use serde_json::{Map, Value};

type Context = Map<String, Value>;

#[derive(Debug)]
pub struct RequestExecutionContext {
  pub downstream_http_request: GatewayHttpRequest,
  pub downstream_graphql_request: Option<GraphQLRequest>,
  pub short_circuit_response: Option<GatewayHttpResponse>,
  /// Cacheability collected while the request is processed, merged into the final response.
  pub cacheability: CacheabilityMetadata,
  capabilities: HashSet<String>,
  page_cache_disabled: bool,
  context: Context,
}

impl RequestExecutionContext {
  pub fn new(downstream_http_request: GatewayHttpRequest) -> Self {
    RequestExecutionContext {
      downstream_http_request,
      downstream_graphql_request: None,
      short_circuit_response: None,
      cacheability: CacheabilityMetadata::default(),
      capabilities: HashSet::new(),
      page_cache_disabled: false,
      context: Context::new(),
    }
  }

  pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self
      .capabilities
      .extend(capabilities.into_iter().map(Into::into));
    self
  }

  /// Whether the endpoint serving this request has the named capability enabled.
  pub fn has_capability(&self, capability: &str) -> bool {
    self.capabilities.contains(capability)
  }

  pub fn short_circuit(&mut self, response: GatewayHttpResponse) {
    self.short_circuit_response = Some(response);
  }

  pub fn is_short_circuit(&self) -> bool {
    self.short_circuit_response.is_some()
  }

  pub fn has_failed_extraction(&self) -> bool {
    self.downstream_graphql_request.is_none()
  }

  /// Page-cache kill switch: once triggered, no page-level cache may store the response
  /// of this request.
  pub fn disable_page_cache(&mut self) {
    self.page_cache_disabled = true;
  }

  pub fn is_page_cache_disabled(&self) -> bool {
    self.page_cache_disabled
  }

  pub fn ctx_insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
    self.context.insert(key.into(), value.into())
  }

  pub fn ctx_get(&self, key: impl Into<String>) -> Option<&Value> {
    self.context.get(&key.into())
  }
}
