use apq_common::{
  execute::RequestExecutionContext,
  graphql::GraphQLResponse,
  http::{Bytes, HeaderValue, CONTENT_TYPE},
};
use apq_config::GraphQLSourceConfig;
use futures::future::LocalBoxFuture;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::gateway::GatewayRouteData;

use super::runtime::{SourceError, SourceRuntime};

#[derive(Debug)]
pub struct GraphQLSourceRuntime {
  pub fetcher: Client,
  pub config: GraphQLSourceConfig,
}

impl GraphQLSourceRuntime {
  pub fn new(config: GraphQLSourceConfig) -> Result<Self, SourceError> {
    let fetcher = Client::builder().build()?;

    Ok(Self { fetcher, config })
  }
}

impl SourceRuntime for GraphQLSourceRuntime {
  #[tracing::instrument(
    skip(self, route_data, request_context),
    name = "GraphQLSourceRuntime::execute"
  )]
  fn execute<'a>(
    &'a self,
    route_data: &'a GatewayRouteData,
    request_context: &'a mut RequestExecutionContext,
  ) -> LocalBoxFuture<'a, Result<GraphQLResponse, SourceError>> {
    Box::pin(async move {
      let mut source_req = request_context
        .downstream_graphql_request
        .clone()
        .ok_or(SourceError::MissingOperation)?;

      route_data
        .plugin_manager
        .on_upstream_graphql_request(&mut source_req)
        .await;

      debug!(
        "going to send upstream request to {:?}: {}",
        self.config.endpoint, source_req
      );

      let response = self
        .fetcher
        .post(&self.config.endpoint)
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(Bytes::from(&source_req))
        .send()
        .await?;

      match response.status() {
        StatusCode::OK => {
          let body = response.bytes().await?;

          Ok(serde_json::from_slice::<GraphQLResponse>(&body)?)
        }
        code => Err(SourceError::UnexpectedHTTPStatusError(code)),
      }
    })
  }
}
