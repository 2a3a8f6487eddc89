pub mod cache_manager;
pub mod config;
pub mod stores;

pub use cache_manager::{CacheManager, CacheStore, CacheStoreError, CacheStoreProxy};
