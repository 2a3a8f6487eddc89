use std::fmt::Debug;

use crate::{
  execute::RequestExecutionContext, graphql::GraphQLRequest, http::GatewayHttpResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
  #[error("Plugin init error: {source}")]
  InitError { source: anyhow::Error },
}

#[async_trait::async_trait(?Send)]
pub trait CreatablePlugin: Plugin {
  type Config;

  async fn create(config: Self::Config) -> Result<Box<Self>, PluginError>;
}

#[async_trait::async_trait(?Send)]
pub trait Plugin: Sync + Send + Debug {
  // From: on_downstream_http_request -> on_downstream_graphql_request -> on_upstream_graphql_request
  // To: on_downstream_http_response
  // Step 1: An HTTP request send from the client to the gateway
  async fn on_downstream_http_request(&self, _ctx: &mut RequestExecutionContext) {}
  // Step 2: An incoming GraphQL operation, right before it is executed
  async fn on_downstream_graphql_request(&self, _ctx: &mut RequestExecutionContext) {}
  // Step 3: A GraphQL request send from the gateway to the upstream GraphQL server
  async fn on_upstream_graphql_request(&self, _req: &mut GraphQLRequest) {}
  // Step 4: A final HTTP response send from the gateway to the client
  async fn on_downstream_http_response(
    &self,
    _ctx: &mut RequestExecutionContext,
    _response: &mut GatewayHttpResponse,
  ) {
  }

  /// Response hooks run from the highest priority to the lowest.
  /// Plugins that decorate responses must outrank plugins that persist them.
  fn response_priority(&self) -> i32 {
    0
  }
}
