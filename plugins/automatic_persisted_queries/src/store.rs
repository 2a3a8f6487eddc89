use std::fmt::Debug;

use apq_cache::{CacheStoreError, CacheStoreProxy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Content-addressed storage of query texts, keyed by their SHA-256 hash.
#[async_trait::async_trait(?Send)]
pub trait PersistedQueryStore: Sync + Send + Debug {
  async fn get(&self, hash: &str) -> Result<Option<String>, CacheStoreError>;
  /// Writing the same hash twice with the same query is harmless.
  async fn put(&self, hash: &str, query: &str) -> Result<(), CacheStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedQueryRecord {
  pub hash: String,
  pub query: String,
}

/// Persists records in one of the gateway cache stores.
#[derive(Debug, Clone)]
pub struct CachePersistedQueryStore {
  cache: CacheStoreProxy<PersistedQueryRecord>,
}

impl CachePersistedQueryStore {
  pub fn new(cache: CacheStoreProxy<PersistedQueryRecord>) -> Self {
    Self { cache }
  }
}

#[async_trait::async_trait(?Send)]
impl PersistedQueryStore for CachePersistedQueryStore {
  async fn get(&self, hash: &str) -> Result<Option<String>, CacheStoreError> {
    match self.cache.get(hash).await? {
      Some(record) if record.hash == hash => {
        debug!("persisted query {:?} found in store {:?}", hash, self.cache.id());

        Ok(Some(record.query))
      }
      Some(record) => {
        warn!(
          "store {:?} returned a record for {:?} under key {:?}, ignoring it",
          self.cache.id(),
          record.hash,
          hash
        );

        Ok(None)
      }
      None => Ok(None),
    }
  }

  async fn put(&self, hash: &str, query: &str) -> Result<(), CacheStoreError> {
    debug!("storing persisted query {:?} in store {:?}", hash, self.cache.id());

    self
      .cache
      .set(
        hash.to_string(),
        PersistedQueryRecord {
          hash: hash.to_string(),
          query: query.to_string(),
        },
        &[],
      )
      .await
  }
}
