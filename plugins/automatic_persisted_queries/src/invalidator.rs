use std::{fmt::Debug, sync::Arc};

use apq_cache::{CacheManager, CacheStoreError};
use tracing::debug;

pub const CACHE_TAG_PREFIX: &str = "apq:";

/// The tag carried by every cached response that depends on the given persisted query.
pub fn cache_tag(hash: &str) -> String {
  format!("{}{}", CACHE_TAG_PREFIX, hash)
}

/// Drops cached responses that were produced for a hash.
#[async_trait::async_trait(?Send)]
pub trait CacheTagInvalidator: Sync + Send + Debug {
  async fn invalidate(&self, hash: &str) -> Result<(), CacheStoreError>;
}

/// Invalidates the hash tag in every store known to the cache manager.
#[derive(Debug, Clone)]
pub struct CacheManagerTagInvalidator {
  manager: Arc<CacheManager>,
}

impl CacheManagerTagInvalidator {
  pub fn new(manager: Arc<CacheManager>) -> Self {
    Self { manager }
  }
}

#[async_trait::async_trait(?Send)]
impl CacheTagInvalidator for CacheManagerTagInvalidator {
  async fn invalidate(&self, hash: &str) -> Result<(), CacheStoreError> {
    let tag = cache_tag(hash);
    debug!("invalidating cache tag {:?}", tag);

    self.manager.invalidate_tags(&[tag]).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use apq_cache::config::{CacheStoreConfig, InMemoryConfig};
  use serde_json::json;

  #[test]
  fn tag_format() {
    assert_eq!(cache_tag("abc123"), "apq:abc123");
  }

  #[tokio::test]
  async fn invalidates_tagged_entries_in_all_stores() {
    let manager = Arc::new(CacheManager::new(&[
      CacheStoreConfig::InMemory {
        id: "apq".to_string(),
        config: InMemoryConfig::default(),
      },
      CacheStoreConfig::InMemory {
        id: "pages".to_string(),
        config: InMemoryConfig::default(),
      },
    ]));
    let pages = manager.get_store::<serde_json::Value>("pages").unwrap();

    pages
      .set("tagged".to_string(), json!(1), &[cache_tag("abc")])
      .await
      .unwrap();
    pages
      .set("other".to_string(), json!(2), &[cache_tag("def")])
      .await
      .unwrap();

    CacheManagerTagInvalidator::new(manager)
      .invalidate("abc")
      .await
      .unwrap();

    assert_eq!(pages.get("tagged").await.unwrap(), None);
    assert_eq!(pages.get("other").await.unwrap(), Some(json!(2)));
  }
}
