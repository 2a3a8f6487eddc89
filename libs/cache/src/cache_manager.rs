use crate::config::CacheStoreConfig;
use crate::stores::in_memory::InMemoryCacheStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
  #[error("cache store \"{store}\" is unavailable: {reason}")]
  Unavailable { store: String, reason: String },
  #[error("failed to encode or decode cache value: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// A key/value cache backend with tag-based invalidation.
///
/// Every entry is written together with its cache tags. Invalidating a tag makes every entry
/// that was written with it unreachable; the backend decides when the memory is reclaimed.
#[async_trait::async_trait(?Send)]
pub trait CacheStore: fmt::Debug + Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<Value>, CacheStoreError>;
  async fn set(&self, key: String, value: Value, tags: &[String]) -> Result<(), CacheStoreError>;
  async fn invalidate_tags(&self, tags: &[String]) -> Result<(), CacheStoreError>;

  fn id(&self) -> &str;
}

#[derive(Clone, Default)]
pub struct CacheManager {
  stores: HashMap<String, Arc<dyn CacheStore>>,
}

impl fmt::Debug for CacheManager {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("CacheManager")
      .field("stores", &self.stores.keys().collect::<Vec<_>>())
      .finish()
  }
}

impl CacheManager {
  pub fn new(config: &[CacheStoreConfig]) -> Self {
    let mut manager = CacheManager::default();

    for store_config in config {
      match store_config {
        CacheStoreConfig::InMemory { id, config } => {
          debug!("creating in-memory cache store with id {:?}", id);

          manager.register_store(Arc::new(InMemoryCacheStore::new(id.clone(), config)));
        }
      }
    }

    manager
  }

  pub fn register_store(&mut self, store: Arc<dyn CacheStore>) {
    self.stores.insert(store.id().to_string(), store);
  }

  pub fn get_store<T>(&self, store_id: &str) -> Option<CacheStoreProxy<T>>
  where
    T: DeserializeOwned + Serialize,
  {
    self
      .stores
      .get(store_id)
      .map(|store| CacheStoreProxy::new(store.clone()))
  }

  /// Cache tags are global: invalidation reaches every registered store.
  pub async fn invalidate_tags(&self, tags: &[String]) -> Result<(), CacheStoreError> {
    for store in self.stores.values() {
      if let Err(e) = store.invalidate_tags(tags).await {
        error!(
          "failed to invalidate tags {:?} in cache store {:?}: {}",
          tags,
          store.id(),
          e
        );

        return Err(e);
      }
    }

    Ok(())
  }
}

#[derive(Debug)]
pub struct CacheStoreProxy<T>
where
  T: DeserializeOwned + Serialize,
{
  store: Arc<dyn CacheStore>,
  _phantom: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned + Serialize> Clone for CacheStoreProxy<T> {
  fn clone(&self) -> Self {
    CacheStoreProxy::new(self.store.clone())
  }
}

impl<T: DeserializeOwned + Serialize> CacheStoreProxy<T> {
  pub fn new(store: Arc<dyn CacheStore>) -> Self {
    CacheStoreProxy {
      store,
      _phantom: std::marker::PhantomData,
    }
  }

  pub fn id(&self) -> &str {
    self.store.id()
  }

  pub async fn get(&self, key: &str) -> Result<Option<T>, CacheStoreError> {
    match self.store.get(key).await? {
      Some(value) => Ok(Some(serde_json::from_value(value)?)),
      None => Ok(None),
    }
  }

  pub async fn set(&self, key: String, value: T, tags: &[String]) -> Result<(), CacheStoreError> {
    self
      .store
      .set(key, serde_json::to_value(value)?, tags)
      .await
  }

  pub async fn invalidate_tags(&self, tags: &[String]) -> Result<(), CacheStoreError> {
    self.store.invalidate_tags(tags).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::InMemoryConfig;

  fn manager_with_two_stores() -> CacheManager {
    CacheManager::new(&[
      CacheStoreConfig::InMemory {
        id: "first".to_string(),
        config: InMemoryConfig::default(),
      },
      CacheStoreConfig::InMemory {
        id: "second".to_string(),
        config: InMemoryConfig::default(),
      },
    ])
  }

  #[tokio::test]
  async fn typed_proxy_roundtrip() {
    let manager = manager_with_two_stores();
    let proxy = manager.get_store::<String>("first").unwrap();

    proxy
      .set("key".to_string(), "query { a }".to_string(), &[])
      .await
      .unwrap();

    assert_eq!(
      proxy.get("key").await.unwrap(),
      Some("query { a }".to_string())
    );
    assert_eq!(proxy.get("other").await.unwrap(), None);
    assert!(manager.get_store::<String>("missing").is_none());
  }

  #[tokio::test]
  async fn tag_invalidation_reaches_all_stores() {
    let manager = manager_with_two_stores();
    let first = manager.get_store::<String>("first").unwrap();
    let second = manager.get_store::<String>("second").unwrap();
    let tags = vec!["apq:abc".to_string()];

    first.set("a".to_string(), "1".to_string(), &tags).await.unwrap();
    second.set("b".to_string(), "2".to_string(), &tags).await.unwrap();
    second.set("c".to_string(), "3".to_string(), &[]).await.unwrap();

    manager.invalidate_tags(&tags).await.unwrap();

    assert_eq!(first.get("a").await.unwrap(), None);
    assert_eq!(second.get("b").await.unwrap(), None);
    assert_eq!(second.get("c").await.unwrap(), Some("3".to_string()));
  }

  #[tokio::test]
  async fn decode_failure_is_an_error() {
    let manager = manager_with_two_stores();
    let raw = manager.get_store::<String>("first").unwrap();
    let typed = manager.get_store::<u64>("first").unwrap();

    raw
      .set("key".to_string(), "not a number".to_string(), &[])
      .await
      .unwrap();

    assert!(matches!(
      typed.get("key").await,
      Err(CacheStoreError::Serialization(_))
    ));
  }
}
