use apq_common::{
  execute::RequestExecutionContext, graphql::PERSISTED_QUERY_NOT_FOUND,
  http::GatewayHttpResponse,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::invalidator::cache_tag;

/// How a `PersistedQueryNotFound` response is kept from outliving the registration of its query.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
pub enum ResponseCachePolicy {
  /// The response is tagged with `apq:<hash>`. It may be cached, and registering the
  /// query invalidates it.
  #[default]
  #[serde(rename = "cache_tag")]
  CacheTag,
  /// The response is never stored by the page cache.
  #[serde(rename = "kill_switch")]
  KillSwitch,
}

impl ResponseCachePolicy {
  pub fn apply(
    &self,
    ctx: &mut RequestExecutionContext,
    response: &mut GatewayHttpResponse,
    hash: Option<&str>,
  ) {
    match self {
      ResponseCachePolicy::CacheTag => match hash {
        Some(hash) => {
          debug!("tagging not-found response with {:?}", cache_tag(hash));

          response.cacheability.add_cache_tags([cache_tag(hash)]);
        }
        None => debug!("not-found response has no hash to tag, leaving it untouched"),
      },
      ResponseCachePolicy::KillSwitch => {
        debug!("not-found response must not be cached, disabling page cache");

        ctx.disable_page_cache();
      }
    }
  }
}

/// Whether the response body carries a `PersistedQueryNotFound` error.
///
/// Bodies that are not JSON, or lack an `errors` array, never match.
pub fn is_persisted_query_not_found(response: &GatewayHttpResponse) -> bool {
  let body = match response.json_body::<Value>() {
    Ok(body) => body,
    Err(_) => return false,
  };

  body
    .get("errors")
    .and_then(Value::as_array)
    .is_some_and(|errors| {
      errors
        .iter()
        .any(|error| error.get("message").and_then(Value::as_str) == Some(PERSISTED_QUERY_NOT_FOUND))
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use apq_common::{
    graphql::GraphQLResponse,
    http::{GatewayHttpRequest, StatusCode},
  };
  use serde_json::json;

  fn response_with_body(body: &str) -> GatewayHttpResponse {
    GatewayHttpResponse {
      body: body.to_string().into(),
      status: StatusCode::OK,
      headers: Default::default(),
      cacheability: Default::default(),
    }
  }

  #[test]
  fn detects_not_found() {
    let response: GatewayHttpResponse = GraphQLResponse::persisted_query_not_found().into();
    assert!(is_persisted_query_not_found(&response));

    let response = response_with_body(
      r#"{"errors":[{"message":"other"},{"message":"PersistedQueryNotFound"}]}"#,
    );
    assert!(is_persisted_query_not_found(&response));
  }

  #[test]
  fn ignores_unrelated_bodies() {
    for body in [
      "",
      "not json",
      r#"{"data":{"a":1}}"#,
      r#"{"errors":"PersistedQueryNotFound"}"#,
      r#"{"errors":[{"code":"PersistedQueryNotFound"}]}"#,
      r#"["PersistedQueryNotFound"]"#,
    ] {
      assert!(!is_persisted_query_not_found(&response_with_body(body)), "{}", body);
    }
  }

  #[test]
  fn cache_tag_policy_tags_response() {
    let mut ctx = RequestExecutionContext::new(GatewayHttpRequest::default());
    let mut response: GatewayHttpResponse = GraphQLResponse::persisted_query_not_found().into();

    ResponseCachePolicy::CacheTag.apply(&mut ctx, &mut response, Some("abc"));

    assert!(response.cacheability.tags.contains("apq:abc"));
    assert!(!ctx.is_page_cache_disabled());
  }

  #[test]
  fn cache_tag_policy_without_hash_is_noop() {
    let mut ctx = RequestExecutionContext::new(GatewayHttpRequest::default());
    let mut response: GatewayHttpResponse = GraphQLResponse::persisted_query_not_found().into();

    ResponseCachePolicy::CacheTag.apply(&mut ctx, &mut response, None);

    assert!(response.cacheability.is_empty());
    assert!(!ctx.is_page_cache_disabled());
  }

  #[test]
  fn kill_switch_policy_disables_page_cache() {
    let mut ctx = RequestExecutionContext::new(GatewayHttpRequest::default());
    let mut response: GatewayHttpResponse = GraphQLResponse::persisted_query_not_found().into();

    ResponseCachePolicy::KillSwitch.apply(&mut ctx, &mut response, Some("abc"));

    assert!(ctx.is_page_cache_disabled());
    assert!(response.cacheability.is_empty());
  }

  #[test]
  fn policy_names() {
    assert_eq!(
      serde_json::from_value::<ResponseCachePolicy>(json!("kill_switch")).unwrap(),
      ResponseCachePolicy::KillSwitch
    );
    assert_eq!(ResponseCachePolicy::default(), ResponseCachePolicy::CacheTag);
  }
}
