use apq_common::serde_utils::{
  JsonSchemaExample, JsonSchemaExampleMetadata, JsonSchemaExampleWrapperType,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::policy::ResponseCachePolicy;

/// The `automatic_persisted_queries` plugin lets clients send a SHA-256 hash of a query instead
/// of the query text.
///
/// A client first sends the hash alone, in `extensions.persistedQuery.sha256Hash`. When the
/// gateway does not know the hash, it answers with a `PersistedQueryNotFound` error and the
/// client retries with both the query and the hash. The gateway verifies the hash, stores the
/// query, and every later request can again carry only the hash.
///
/// Requests can be sent over `POST`, or over `GET` when the `http_get` plugin is enabled.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[schemars(example = "apq_example_1")]
#[schemars(example = "apq_example_2")]
pub struct AutomaticPersistedQueriesPluginConfig {
  /// The identifier of the cache store holding the registered queries.
  #[serde(rename = "cache", default = "default_store_id")]
  pub store_id: String,
  /// What happens to `PersistedQueryNotFound` responses, so that a page cache never keeps
  /// serving them after the query was registered.
  #[serde(default)]
  pub not_found_policy: ResponseCachePolicy,
}

impl Default for AutomaticPersistedQueriesPluginConfig {
  fn default() -> Self {
    Self {
      store_id: default_store_id(),
      not_found_policy: ResponseCachePolicy::default(),
    }
  }
}

fn default_store_id() -> String {
  "apq".to_string()
}

fn apq_example_1() -> JsonSchemaExample<AutomaticPersistedQueriesPluginConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new("Simple", None),
    wrapper: Some(JsonSchemaExampleWrapperType::Plugin {
      name: "automatic_persisted_queries".to_string(),
    }),
    example: AutomaticPersistedQueriesPluginConfig::default(),
  }
}

fn apq_example_2() -> JsonSchemaExample<AutomaticPersistedQueriesPluginConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new(
      "Never cache unknown hashes",
      Some("Responses for unknown hashes are never stored by the page cache."),
    ),
    wrapper: Some(JsonSchemaExampleWrapperType::Plugin {
      name: "automatic_persisted_queries".to_string(),
    }),
    example: AutomaticPersistedQueriesPluginConfig {
      store_id: "persisted_queries".to_string(),
      not_found_policy: ResponseCachePolicy::KillSwitch,
    },
  }
}
