use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum CacheStoreConfig {
  /// A process-local store. Entries are lost on restart and are not shared between gateway instances.
  #[serde(rename = "in_memory")]
  #[schemars(title = "in_memory")]
  InMemory {
    /// The identifier of the store, referenced by plugins through their `cache` field.
    id: String,
    #[serde(default)]
    config: InMemoryConfig,
  },
}

impl CacheStoreConfig {
  pub fn id(&self) -> &str {
    match self {
      CacheStoreConfig::InMemory { id, .. } => id,
    }
  }
}

/// Configuration for In-Memory caching, it internally works using an LRU (Least Recently Used) eviction policy
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct InMemoryConfig {
  /// The maximum number of cache entries. Default is 1000 entries.
  /// When the cache reaches this size, it will start evicting entries
  /// based on the eviction policy.
  #[serde(default = "in_memory_default_max_size")]
  pub max_size: Option<usize>,

  /// Time-to-live for cache entries in seconds. Default is 600 seconds (10 minutes).
  /// This is the duration after which a cache entry will be automatically removed.
  #[serde(default = "in_memory_default_cache_ttl_seconds")]
  pub cache_ttl_seconds: Option<u64>,
}

impl Default for InMemoryConfig {
  fn default() -> Self {
    Self {
      max_size: in_memory_default_max_size(),
      cache_ttl_seconds: in_memory_default_cache_ttl_seconds(),
    }
  }
}

fn in_memory_default_max_size() -> Option<usize> {
  Some(1000)
}

fn in_memory_default_cache_ttl_seconds() -> Option<u64> {
  Some(600)
}
