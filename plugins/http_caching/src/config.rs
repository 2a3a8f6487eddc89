use apq_common::serde_utils::{
  JsonSchemaExample, JsonSchemaExampleMetadata, JsonSchemaExampleWrapperType,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The `http_caching` plugin caches whole HTTP responses of GraphQL `GET` requests.
///
/// A response is cached per combination of the configured cache contexts. Responses may declare
/// additional contexts they vary by, which are added to the key of that response only.
///
/// Cached responses are dropped as soon as one of their cache tags is invalidated.
///
/// Supported cache contexts:
///
/// - `url.path`: the request path
/// - `url.query_args`: the whole query string
/// - `url.query_args:<name>`: a single query string argument
/// - `headers:<name>`: a single request header
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[schemars(example = "http_caching_example_1")]
pub struct HttpCachePluginConfig {
  /// The identifier of the cache store holding the responses.
  #[serde(rename = "cache")]
  pub store_id: String,
  /// The number of seconds a response is served from cache.
  #[serde(default = "default_max_age")]
  pub max_age: u64,
  /// Cache contexts every response varies by.
  #[serde(default = "default_contexts")]
  pub contexts: Vec<String>,
  /// Expose the cache tags of a response in the `x-cache-tags` header.
  #[serde(default)]
  pub expose_cache_tags: bool,
}

fn default_max_age() -> u64 {
  60
}

pub fn default_contexts() -> Vec<String> {
  vec![
    "url.path".to_string(),
    "url.query_args:query".to_string(),
    "url.query_args:extensions".to_string(),
    "url.query_args:operationName".to_string(),
    "url.query_args:variables".to_string(),
  ]
}

fn http_caching_example_1() -> JsonSchemaExample<HttpCachePluginConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new(
      "Vary by language",
      Some("Responses are cached for two minutes, separately for each Accept-Language header."),
    ),
    wrapper: Some(JsonSchemaExampleWrapperType::Plugin {
      name: "http_caching".to_string(),
    }),
    example: HttpCachePluginConfig {
      store_id: "pages".to_string(),
      max_age: 120,
      contexts: {
        let mut contexts = default_contexts();
        contexts.push("headers:accept-language".to_string());
        contexts
      },
      expose_cache_tags: false,
    },
  }
}
