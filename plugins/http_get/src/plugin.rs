use crate::config::HttpGetPluginConfig;

use apq_common::execute::RequestExecutionContext;
use apq_common::{
  graphql::{persisted_query_hash_from_extensions, ExtractGraphQLOperationError, GraphQLRequest},
  http::{extract_accept, parse_query_string, GatewayHttpRequest, Method, Mime},
  json::parse_and_extract_json_map_value,
};
use tracing::debug;

use apq_common::plugin::{CreatablePlugin, Plugin, PluginError};

#[derive(Debug)]
pub struct HttpGetPlugin;

#[async_trait::async_trait(?Send)]
impl CreatablePlugin for HttpGetPlugin {
  type Config = HttpGetPluginConfig;

  async fn create(_config: Self::Config) -> Result<Box<Self>, PluginError> {
    Ok(Box::new(Self))
  }
}

#[async_trait::async_trait(?Send)]
impl Plugin for HttpGetPlugin {
  async fn on_downstream_http_request(&self, ctx: &mut RequestExecutionContext) {
    if ctx.downstream_http_request.method != Method::GET
      || ctx.downstream_graphql_request.is_some()
    {
      return;
    }

    let (accept, result) = extract_graphql_from_get_request(&ctx.downstream_http_request);

    match result {
      Ok(gql_request) => {
        debug!("extracted GraphQL request from GET query string");

        ctx.downstream_graphql_request = Some(gql_request);
      }
      Err(ExtractGraphQLOperationError::EmptyExtraction) => {
        // nothing to do here, the request is not a GraphQL GET request
      }
      Err(e) => {
        ctx.short_circuit(e.into_response(accept));
      }
    }
  }
}

pub type ExtractionResult = (
  Option<Mime>,
  Result<GraphQLRequest, ExtractGraphQLOperationError>,
);

/// Reads `query`, `operationName`, `variables` and `extensions` from the query string.
///
/// A request with neither `query` nor `extensions` is not a GraphQL request. A request with
/// `extensions` but no `query` must declare a persisted query hash.
pub fn extract_graphql_from_get_request(downstream_request: &GatewayHttpRequest) -> ExtractionResult {
  let accept = extract_accept(&downstream_request.headers);
  let params = parse_query_string(&downstream_request.query_string);

  if !params.contains_key("query") && !params.contains_key("extensions") {
    return (accept, Err(ExtractGraphQLOperationError::EmptyExtraction));
  }

  let variables = match params.get("variables") {
    Some(v) => match parse_and_extract_json_map_value(v) {
      Ok(v) => Some(v),
      Err(e) => {
        return (
          accept,
          Err(ExtractGraphQLOperationError::InvalidVariablesJsonFormat(e)),
        )
      }
    },
    None => None,
  };
  let extensions = match params.get("extensions") {
    Some(v) => match parse_and_extract_json_map_value(v) {
      Ok(v) => Some(v),
      Err(e) => {
        return (
          accept,
          Err(ExtractGraphQLOperationError::InvalidExtensionsJsonFormat(e)),
        )
      }
    },
    None => None,
  };

  let operation = params.get("query").cloned();
  let has_hash = extensions
    .as_ref()
    .and_then(persisted_query_hash_from_extensions)
    .is_some();

  if operation.is_none() && !has_hash {
    return (
      accept,
      Err(ExtractGraphQLOperationError::MissingQueryParameter),
    );
  }

  (
    accept,
    Ok(GraphQLRequest {
      operation,
      operation_name: params.get("operationName").cloned(),
      variables,
      extensions,
    }),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use apq_common::http::StatusCode;
  use serde_json::json;

  fn get(query_string: &str) -> GatewayHttpRequest {
    GatewayHttpRequest {
      method: Method::GET,
      uri: format!("/graphql?{}", query_string),
      query_string: query_string.to_string(),
      ..Default::default()
    }
  }

  fn encode(value: serde_json::Value) -> String {
    urlencoding::encode(&value.to_string()).into_owned()
  }

  #[test]
  fn extracts_full_request() {
    let (_, result) = extract_graphql_from_get_request(&get(&format!(
      "query=query%20Q%20%7B%20a%20%7D&operationName=Q&variables={}",
      encode(json!({"id": 1}))
    )));
    let request = result.unwrap();

    assert_eq!(request.operation.as_deref(), Some("query Q { a }"));
    assert_eq!(request.operation_name.as_deref(), Some("Q"));
    assert_eq!(request.variables.unwrap().get("id"), Some(&json!(1)));
  }

  #[test]
  fn hash_only_request() {
    let (_, result) = extract_graphql_from_get_request(&get(&format!(
      "extensions={}",
      encode(json!({"persistedQuery": {"version": 1, "sha256Hash": "abc"}}))
    )));
    let request = result.unwrap();

    assert_eq!(request.operation, None);
    assert_eq!(request.persisted_query_hash(), Some("abc"));
  }

  #[test]
  fn extensions_without_hash_need_query() {
    let (_, result) =
      extract_graphql_from_get_request(&get(&format!("extensions={}", encode(json!({})))));

    assert!(matches!(
      result,
      Err(ExtractGraphQLOperationError::MissingQueryParameter)
    ));
  }

  #[test]
  fn unrelated_get_is_empty() {
    let (_, result) = extract_graphql_from_get_request(&get("foo=bar"));

    assert!(matches!(
      result,
      Err(ExtractGraphQLOperationError::EmptyExtraction)
    ));
  }

  #[test]
  fn invalid_variables() {
    let (_, result) = extract_graphql_from_get_request(&get("query=%7Ba%7D&variables=nope"));

    assert!(matches!(
      result,
      Err(ExtractGraphQLOperationError::InvalidVariablesJsonFormat(_))
    ));
  }

  #[tokio::test]
  async fn plugin_sets_request_or_short_circuits() {
    let plugin = HttpGetPlugin::create(Default::default()).await.unwrap();

    let mut ok = RequestExecutionContext::new(get("query=%7Ba%7D"));
    plugin.on_downstream_http_request(&mut ok).await;
    assert!(ok.downstream_graphql_request.is_some());

    let mut broken = RequestExecutionContext::new(get("query=%7Ba%7D&extensions=nope"));
    plugin.on_downstream_http_request(&mut broken).await;
    assert!(broken.downstream_graphql_request.is_none());
    assert_eq!(
      broken.short_circuit_response.map(|r| r.status),
      Some(StatusCode::OK)
    );
  }
}
