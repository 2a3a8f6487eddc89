use std::fmt::Debug;

use apq_common::{
  execute::RequestExecutionContext,
  graphql::GraphQLResponse,
  http::StatusCode,
};
use futures::future::LocalBoxFuture;

use crate::gateway::GatewayRouteData;

pub trait SourceRuntime: Debug + Send + Sync + 'static {
  fn execute<'a>(
    &'a self,
    route_data: &'a GatewayRouteData,
    request_context: &'a mut RequestExecutionContext,
  ) -> LocalBoxFuture<'a, Result<GraphQLResponse, SourceError>>;
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
  #[error("unexpected HTTP status: {0}")]
  UnexpectedHTTPStatusError(StatusCode),
  #[error("network error: {0}")]
  NetworkError(#[from] reqwest::Error),
  #[error("invalid upstream response: {0}")]
  InvalidResponse(#[from] serde_json::Error),
  #[error("no operation to execute")]
  MissingOperation,
}

impl From<SourceError> for GraphQLResponse {
  fn from(error: SourceError) -> Self {
    GraphQLResponse::new_error_with_code(&error.to_string(), StatusCode::BAD_GATEWAY)
  }
}
