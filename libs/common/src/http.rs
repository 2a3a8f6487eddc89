use std::collections::HashMap;

pub use bytes::Bytes;
use http::{HeaderMap, StatusCode as RawStatusCode};
use serde::{Deserialize, Serialize};

pub use http::header;
pub use http::header::{HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
pub use http::Method;
pub use mime::{Mime, APPLICATION_JSON, APPLICATION_WWW_FORM_URLENCODED};
use serde::de::DeserializeOwned;
use serde_json::from_slice;

use crate::cacheability::CacheabilityMetadata;

pub type StatusCode = RawStatusCode;
pub type HttpHeadersMap = HeaderMap<HeaderValue>;

#[derive(Debug, Clone)]
pub struct GatewayHttpRequest {
  pub headers: HeaderMap<HeaderValue>,
  pub method: Method,
  pub uri: String,
  pub query_string: String,
  pub body: Bytes,
}

#[cfg(feature = "test_utils")]
impl Default for GatewayHttpRequest {
  fn default() -> Self {
    Self {
      headers: HeaderMap::new(),
      method: Method::GET,
      uri: "/".to_string(),
      query_string: "".to_string(),
      body: serde_json::json!({
          "query": "query { __typename }",
      })
      .to_string()
      .into(),
    }
  }
}

impl GatewayHttpRequest {
  pub fn json_body<T>(&self) -> Result<T, serde_json::Error>
  where
    T: DeserializeOwned,
  {
    from_slice::<T>(&self.body)
  }

  /// The request path, without the query string.
  pub fn path(&self) -> &str {
    self.uri.split('?').next().unwrap_or_default()
  }

  pub fn query_param(&self, name: &str) -> Option<String> {
    parse_query_string(&self.query_string).remove(name)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayHttpResponse {
  pub body: Bytes,
  #[serde(with = "http_serde::status_code")]
  pub status: StatusCode,
  #[serde(with = "http_serde::header_map")]
  pub headers: HeaderMap,
  #[serde(default)]
  pub cacheability: CacheabilityMetadata,
}

impl GatewayHttpResponse {
  pub fn json_body<T>(&self) -> Result<T, serde_json::Error>
  where
    T: DeserializeOwned,
  {
    from_slice::<T>(&self.body)
  }
}

pub fn extract_content_type(headers_map: &HttpHeadersMap) -> Option<Mime> {
  let content_type = headers_map
    .get(CONTENT_TYPE)
    .and_then(|value| value.to_str().ok())
    .map(ToString::to_string);

  content_type.and_then(|content_type| content_type.parse().ok())
}

pub fn extract_accept(headers_map: &HeaderMap) -> Option<Mime> {
  let content_type = headers_map
    .get(ACCEPT)
    .and_then(|value| value.to_str().ok())
    .map(ToString::to_string);

  content_type.and_then(|content_type| content_type.parse().ok())
}

/// Parses an `application/x-www-form-urlencoded` query string, decoding keys and values.
/// Pairs that are not valid UTF-8 after decoding are kept in their raw form.
pub fn parse_query_string(input: &str) -> HashMap<String, String> {
  querystring::querify(input)
    .iter()
    .map(|(k, v)| (decode_component(k), decode_component(v)))
    .collect()
}

fn decode_component(raw: &str) -> String {
  let with_spaces = raw.replace('+', " ");

  match urlencoding::decode(&with_spaces) {
    Ok(decoded) => decoded.into_owned(),
    Err(_) => with_spaces,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn query_string_values_are_decoded() {
    let params = parse_query_string(
      "extensions=%7B%22persistedQuery%22%3A%7B%22sha256Hash%22%3A%22abc%22%7D%7D&operationName=my+op",
    );

    assert_eq!(
      params.get("extensions").map(String::as_str),
      Some(r#"{"persistedQuery":{"sha256Hash":"abc"}}"#)
    );
    assert_eq!(params.get("operationName").map(String::as_str), Some("my op"));
  }

  #[test]
  fn request_path_strips_query() {
    let request = GatewayHttpRequest {
      headers: Default::default(),
      method: Method::GET,
      uri: "/graphql?query=x".to_string(),
      query_string: "query=x".to_string(),
      body: Bytes::new(),
    };

    assert_eq!(request.path(), "/graphql");
    assert_eq!(request.query_param("query"), Some("x".to_string()));
    assert_eq!(request.query_param("variables"), None);
  }
}
