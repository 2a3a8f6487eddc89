use apq_common::{execute::RequestExecutionContext, graphql::GraphQLResponse};
use apq_config::MockedSourceConfig;
use futures::future::LocalBoxFuture;

use super::runtime::{SourceError, SourceRuntime};
use crate::gateway::GatewayRouteData;

#[derive(Debug)]
pub struct MockedSourceRuntime {
  pub config: MockedSourceConfig,
}

impl MockedSourceRuntime {
  pub fn new(config: MockedSourceConfig) -> Self {
    Self { config }
  }
}

impl SourceRuntime for MockedSourceRuntime {
  fn execute<'a>(
    &'a self,
    _route_data: &'a GatewayRouteData,
    _request_context: &'a mut RequestExecutionContext,
  ) -> LocalBoxFuture<'a, Result<GraphQLResponse, SourceError>> {
    Box::pin(async move {
      Ok(serde_json::from_slice::<GraphQLResponse>(
        self.config.response_data.contents.as_bytes(),
      )?)
    })
  }
}
