use std::fmt;
use std::sync::{Mutex, MutexGuard};

use cached::{Cached, TimedSizedCache};
use serde_json::Value;
use tracing::debug;

use crate::{
  cache_manager::{CacheStore, CacheStoreError},
  config::InMemoryConfig,
};

#[derive(Debug, Clone)]
struct Entry {
  value: Value,
  tags: Vec<String>,
}

pub struct InMemoryCacheStore {
  pub id: String,
  entries: Mutex<TimedSizedCache<String, Entry>>,
}

impl fmt::Debug for InMemoryCacheStore {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("InMemoryCacheStore")
      .field("id", &self.id)
      .finish()
  }
}

impl InMemoryCacheStore {
  pub fn new(id: String, config: &InMemoryConfig) -> Self {
    let entries = TimedSizedCache::with_size_and_lifespan(
      config.max_size.unwrap_or(1000),
      config.cache_ttl_seconds.unwrap_or(600),
    );

    InMemoryCacheStore {
      id,
      entries: Mutex::new(entries),
    }
  }

  fn lock(&self) -> Result<MutexGuard<'_, TimedSizedCache<String, Entry>>, CacheStoreError> {
    self.entries.lock().map_err(|e| CacheStoreError::Unavailable {
      store: self.id.clone(),
      reason: e.to_string(),
    })
  }
}

#[async_trait::async_trait(?Send)]
impl CacheStore for InMemoryCacheStore {
  async fn get(&self, key: &str) -> Result<Option<Value>, CacheStoreError> {
    let mut entries = self.lock()?;

    Ok(entries.cache_get(key).map(|entry| entry.value.clone()))
  }

  async fn set(&self, key: String, value: Value, tags: &[String]) -> Result<(), CacheStoreError> {
    let mut entries = self.lock()?;

    entries.cache_set(
      key,
      Entry {
        value,
        tags: tags.to_vec(),
      },
    );

    Ok(())
  }

  // Evicts every live entry carrying one of the tags. Nothing is recorded for the tags themselves,
  // so entries written later are unaffected.
  async fn invalidate_tags(&self, tags: &[String]) -> Result<(), CacheStoreError> {
    let mut entries = self.lock()?;

    let store = entries.get_store();
    let stale = store
      .key_order()
      .zip(store.value_order())
      .filter(|(_, (_, entry))| entry.tags.iter().any(|tag| tags.contains(tag)))
      .map(|(key, _)| key.clone())
      .collect::<Vec<_>>();

    for key in stale.iter() {
      entries.cache_remove(key);
    }

    if !stale.is_empty() {
      debug!(
        "invalidated {} entries in store {:?} for tags {:?}",
        stale.len(),
        self.id,
        tags
      );
    }

    Ok(())
  }

  fn id(&self) -> &str {
    &self.id
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn store() -> InMemoryCacheStore {
    InMemoryCacheStore::new("test".to_string(), &InMemoryConfig::default())
  }

  #[tokio::test]
  async fn set_overwrites_and_get_returns_latest() {
    let store = store();

    store.set("k".to_string(), json!(1), &[]).await.unwrap();
    store.set("k".to_string(), json!(2), &[]).await.unwrap();

    assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
  }

  #[tokio::test]
  async fn invalidation_only_affects_entries_written_before_it() {
    let store = store();
    let tags = vec!["apq:1".to_string()];

    store.set("old".to_string(), json!("old"), &tags).await.unwrap();
    store.invalidate_tags(&tags).await.unwrap();
    store.set("new".to_string(), json!("new"), &tags).await.unwrap();

    assert_eq!(store.get("old").await.unwrap(), None);
    assert_eq!(store.get("new").await.unwrap(), Some(json!("new")));
  }

  #[tokio::test]
  async fn unrelated_tags_are_untouched() {
    let store = store();

    store
      .set("a".to_string(), json!("a"), &["apq:a".to_string()])
      .await
      .unwrap();
    store
      .set("b".to_string(), json!("b"), &["apq:b".to_string(), "other".to_string()])
      .await
      .unwrap();

    store.invalidate_tags(&["apq:a".to_string()]).await.unwrap();

    assert_eq!(store.get("a").await.unwrap(), None);
    assert_eq!(store.get("b").await.unwrap(), Some(json!("b")));
  }

  #[tokio::test]
  async fn invalidating_many_tags_keeps_store_bounded() {
    let store = InMemoryCacheStore::new(
      "tiny".to_string(),
      &InMemoryConfig {
        max_size: Some(10),
        cache_ttl_seconds: Some(600),
      },
    );

    for i in 0..20 {
      let tags = vec![format!("apq:{}", i)];
      store.set(i.to_string(), json!(i), &tags).await.unwrap();
    }
    for i in 0..10_000 {
      store
        .invalidate_tags(&[format!("apq:unrelated-{}", i)])
        .await
        .unwrap();
    }

    assert!(store.lock().unwrap().cache_size() <= 10);
    assert_eq!(store.get("19").await.unwrap(), Some(json!(19)));

    store.invalidate_tags(&["apq:19".to_string()]).await.unwrap();
    assert_eq!(store.get("19").await.unwrap(), None);
    assert_eq!(store.get("18").await.unwrap(), Some(json!(18)));
  }

  #[tokio::test]
  async fn size_limit_evicts_entries() {
    let store = InMemoryCacheStore::new(
      "tiny".to_string(),
      &InMemoryConfig {
        max_size: Some(1),
        cache_ttl_seconds: Some(600),
      },
    );

    store.set("a".to_string(), json!("a"), &[]).await.unwrap();
    store.set("b".to_string(), json!("b"), &[]).await.unwrap();

    assert_eq!(store.get("a").await.unwrap(), None);
    assert_eq!(store.get("b").await.unwrap(), Some(json!("b")));
  }
}
