use std::fmt::{Display, Formatter};

use bytes::Bytes;
use mime::{Mime, APPLICATION_JSON};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Error as SerdeError, Map, Value};

use crate::{
  cacheability::CacheabilityMetadata,
  http::{
    extract_accept, extract_content_type, GatewayHttpRequest, GatewayHttpResponse,
    HeaderValue, HttpHeadersMap, StatusCode, CONTENT_TYPE,
  },
  json::deserialize_json_map_or_string,
};

pub const APPLICATION_GRAPHQL_JSON: &str = "application/graphql-response+json";
pub static APPLICATION_GRAPHQL_JSON_MIME: Lazy<Mime> = Lazy::new(|| {
  APPLICATION_GRAPHQL_JSON
    .parse::<Mime>()
    // @expected: we're parsing a statically defined constant, we know it works ;)
    .unwrap()
});

/// Error message shared with GraphQL clients: a hash-only request hit an unknown hash.
/// Clients match on it verbatim to retry with the full query attached.
pub const PERSISTED_QUERY_NOT_FOUND: &str = "PersistedQueryNotFound";
pub const PERSISTED_QUERY_EXTENSION: &str = "persistedQuery";
pub const PERSISTED_QUERY_HASH_FIELD: &str = "sha256Hash";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct GraphQLRequest {
  // The GraphQL operation, as string. Absent for hash-only persisted query requests.
  #[serde(rename = "query", default, skip_serializing_if = "Option::is_none")]
  pub operation: Option<String>,
  // The operation name, if specified
  #[serde(
    rename = "operationName",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub operation_name: Option<String>,
  // GraphQL operation variables, in JSON format
  #[serde(
    default,
    deserialize_with = "deserialize_json_map_or_string",
    skip_serializing_if = "Option::is_none"
  )]
  pub variables: Option<Map<String, Value>>,
  // GraphQL execution extensions, in JSON format
  #[serde(
    default,
    deserialize_with = "deserialize_json_map_or_string",
    skip_serializing_if = "Option::is_none"
  )]
  pub extensions: Option<Map<String, Value>>,
}

impl Display for GraphQLRequest {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}",
      serde_json::to_string(self)
        .unwrap_or_else(|e| ExtractGraphQLOperationError::SerializationError(e).to_string())
    )
  }
}

impl GraphQLRequest {
  /// The non-empty `extensions.persistedQuery.sha256Hash` value, if the request declares one.
  pub fn persisted_query_hash(&self) -> Option<&str> {
    self
      .extensions
      .as_ref()
      .and_then(persisted_query_hash_from_extensions)
  }

  pub fn new_from_http_post(
    http_request: &GatewayHttpRequest,
  ) -> (
    Option<Mime>,
    Option<Mime>,
    Result<GraphQLRequest, ExtractGraphQLOperationError>,
  ) {
    // Extract the content-type and default to application/json when it's not set
    // see https://graphql.github.io/graphql-over-http/draft/#sec-POST
    let content_type = extract_content_type(&http_request.headers).unwrap_or(APPLICATION_JSON);
    let accept = extract_accept(&http_request.headers);

    if content_type.type_() != mime::APPLICATION_JSON.type_() {
      return (
        Some(content_type),
        accept,
        Err(ExtractGraphQLOperationError::InvalidContentTypeHeader),
      );
    }

    match http_request.json_body::<GraphQLRequest>() {
      Ok(body) if body.operation.is_none() && body.persisted_query_hash().is_none() => (
        Some(content_type),
        accept,
        Err(ExtractGraphQLOperationError::EmptyExtraction),
      ),
      Ok(body) => (Some(content_type), accept, Ok(body)),
      Err(e) => (
        Some(content_type),
        accept,
        Err(ExtractGraphQLOperationError::InvalidBodyJsonFormat(e)),
      ),
    }
  }
}

pub fn persisted_query_hash_from_extensions(extensions: &Map<String, Value>) -> Option<&str> {
  extensions
    .get(PERSISTED_QUERY_EXTENSION)
    .and_then(|v| v.get(PERSISTED_QUERY_HASH_FIELD))
    .and_then(Value::as_str)
    .filter(|hash| !hash.is_empty())
}

impl From<&GraphQLRequest> for Bytes {
  fn from(request: &GraphQLRequest) -> Self {
    serde_json::to_vec(&request)
      .unwrap_or_else(|e| {
        ExtractGraphQLOperationError::SerializationError(e)
          .to_string()
          .into_bytes()
      })
      .into()
  }
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractGraphQLOperationError {
  #[error("missing query parameter")]
  MissingQueryParameter,
  #[error("invalid content-type header")]
  InvalidContentTypeHeader,
  #[error("invalid body json format")]
  InvalidBodyJsonFormat(SerdeError),
  #[error("invalid variables json format")]
  InvalidVariablesJsonFormat(SerdeError),
  #[error("invalid extensions json format")]
  InvalidExtensionsJsonFormat(SerdeError),
  #[error("failed to locate any GraphQL operation in request")]
  EmptyExtraction,
  #[error("serialization error")]
  SerializationError(SerdeError),
}

impl ExtractGraphQLOperationError {
  pub fn into_response(&self, accept: Option<Mime>) -> GatewayHttpResponse {
    let status = match accept {
      Some(accept_header) if accept_header == *APPLICATION_GRAPHQL_JSON_MIME => {
        StatusCode::BAD_REQUEST
      }
      _ => StatusCode::OK,
    };

    GraphQLResponse::new_error(self.to_string().as_str()).into_with_status_code(status)
  }
}

/// An error with a message and optional extensions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GraphQLError {
  /// The error message.
  pub message: String,
  /// Extensions to the error.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Map<String, Value>>,
}

impl std::fmt::Display for GraphQLError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.message)
  }
}

impl GraphQLError {
  pub fn new(message: &str) -> Self {
    GraphQLError {
      message: message.to_string(),
      extensions: None,
    }
  }

  /// An error carrying `extensions.category`, the classification clients use to tell
  /// request-level protocol errors from execution errors.
  pub fn new_with_category(message: &str, category: &str) -> Self {
    let mut extensions = Map::new();
    extensions.insert("category".to_string(), Value::String(category.to_string()));

    GraphQLError {
      message: message.to_string(),
      extensions: Some(extensions),
    }
  }

  pub fn category(&self) -> Option<&str> {
    self
      .extensions
      .as_ref()
      .and_then(|ext| ext.get("category"))
      .and_then(Value::as_str)
  }
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct GraphQLResponse {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub errors: Option<Vec<GraphQLError>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Value>,

  #[serde(skip)]
  downstream_http_code: Option<StatusCode>,
}

impl GraphQLResponse {
  pub fn new_data(data: Value) -> Self {
    GraphQLResponse {
      data: Some(data),
      ..Default::default()
    }
  }

  pub fn new_error(error: &str) -> Self {
    GraphQLResponse {
      errors: Some(vec![GraphQLError::new(error)]),
      ..Default::default()
    }
  }

  pub fn new_error_with_code(error: &str, status_code: StatusCode) -> Self {
    GraphQLResponse {
      errors: Some(vec![GraphQLError::new(error)]),
      downstream_http_code: Some(status_code),
      ..Default::default()
    }
  }

  pub fn new_error_with_category(error: &str, category: &str) -> Self {
    GraphQLResponse {
      errors: Some(vec![GraphQLError::new_with_category(error, category)]),
      ..Default::default()
    }
  }

  /// The response produced when a hash-only request references an unknown persisted query.
  pub fn persisted_query_not_found() -> Self {
    Self::new_error_with_category(PERSISTED_QUERY_NOT_FOUND, "request")
  }

  pub fn into_with_status_code(self, code: StatusCode) -> GatewayHttpResponse {
    GatewayHttpResponse {
      body: self.into(),
      status: code,
      headers: json_headers(),
      cacheability: CacheabilityMetadata::default(),
    }
  }
}

fn json_headers() -> HttpHeadersMap {
  let mut headers = HttpHeadersMap::new();
  headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

  headers
}

impl From<GraphQLResponse> for Bytes {
  fn from(response: GraphQLResponse) -> Self {
    serde_json::to_vec(&response)
      .unwrap_or_else(|e| {
        ExtractGraphQLOperationError::SerializationError(e)
          .to_string()
          .into_bytes()
      })
      .into()
  }
}

impl From<GraphQLResponse> for GatewayHttpResponse {
  fn from(response: GraphQLResponse) -> Self {
    let status = response.downstream_http_code.unwrap_or(StatusCode::OK);

    response.into_with_status_code(status)
  }
}
