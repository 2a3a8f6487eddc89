use std::{
  collections::BTreeSet,
  sync::Arc,
  time::{SystemTime, UNIX_EPOCH},
};

use crate::{config::HttpCachePluginConfig, contexts::cache_key};
use apq_cache::cache_manager::{CacheManager, CacheStoreProxy};
use apq_common::{
  execute::RequestExecutionContext,
  http::{GatewayHttpRequest, GatewayHttpResponse, HeaderName, HeaderValue, Method, StatusCode},
  plugin::{CreatablePlugin, Plugin, PluginError},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_TAGS: HeaderName = HeaderName::from_static("x-cache-tags");

static HIT_MARKER: &str = "http_caching.hit";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageEntry {
  /// Points to the final entry, keyed by the base contexts plus these.
  Redirect { contexts: BTreeSet<String> },
  Response(GatewayHttpResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPage {
  expires_at: u64,
  entry: PageEntry,
}

#[derive(Debug)]
pub struct HttpCachingPlugin {
  config: HttpCachePluginConfig,
  base_contexts: BTreeSet<String>,
  store: Option<CacheStoreProxy<CachedPage>>,
}

impl HttpCachingPlugin {
  pub fn configure_caching(&mut self, mgr: Arc<CacheManager>) -> Result<(), PluginError> {
    if let Some(store) = mgr.get_store(&self.config.store_id) {
      self.store = Some(store);
      Ok(())
    } else {
      Err(PluginError::InitError {
        source: anyhow::anyhow!("Cache store not found: {}", self.config.store_id),
      })
    }
  }

  async fn load(store: &CacheStoreProxy<CachedPage>, key: &str) -> Option<CachedPage> {
    match store.get(key).await {
      Ok(Some(page)) if page.expires_at > now() => Some(page),
      Ok(_) => None,
      Err(e) => {
        warn!("failed to read page cache entry {:?}: {}", key, e);

        None
      }
    }
  }

  async fn lookup(
    &self,
    store: &CacheStoreProxy<CachedPage>,
    request: &GatewayHttpRequest,
  ) -> Option<GatewayHttpResponse> {
    let mut page = Self::load(store, &cache_key(&self.base_contexts, request)).await?;

    if let PageEntry::Redirect { contexts } = &page.entry {
      let final_key = cache_key(self.base_contexts.union(contexts), request);
      page = Self::load(store, &final_key).await?;
    }

    match page.entry {
      PageEntry::Response(response) => Some(response),
      PageEntry::Redirect { .. } => None,
    }
  }

  async fn persist(
    &self,
    store: &CacheStoreProxy<CachedPage>,
    request: &GatewayHttpRequest,
    response: &GatewayHttpResponse,
  ) {
    let expires_at = now() + self.config.max_age;
    let tags = response.cacheability.tags.iter().cloned().collect::<Vec<_>>();
    let extra_contexts = response
      .cacheability
      .contexts
      .difference(&self.base_contexts)
      .cloned()
      .collect::<BTreeSet<_>>();
    let base_key = cache_key(&self.base_contexts, request);

    let result = if extra_contexts.is_empty() {
      let page = CachedPage {
        expires_at,
        entry: PageEntry::Response(response.clone()),
      };

      store.set(base_key, page, &tags).await
    } else {
      let final_key = cache_key(self.base_contexts.union(&extra_contexts), request);
      let redirect = CachedPage {
        expires_at,
        entry: PageEntry::Redirect {
          contexts: extra_contexts,
        },
      };
      let page = CachedPage {
        expires_at,
        entry: PageEntry::Response(response.clone()),
      };

      match store.set(base_key, redirect, &[]).await {
        Ok(_) => store.set(final_key, page, &tags).await,
        Err(e) => Err(e),
      }
    };

    if let Err(e) = result {
      warn!("failed to store response in page cache: {}", e);
    }
  }
}

#[async_trait::async_trait(?Send)]
impl CreatablePlugin for HttpCachingPlugin {
  type Config = HttpCachePluginConfig;

  async fn create(config: Self::Config) -> Result<Box<Self>, PluginError> {
    let base_contexts = config.contexts.iter().cloned().collect();

    Ok(Box::new(Self {
      config,
      base_contexts,
      store: None,
    }))
  }
}

#[async_trait::async_trait(?Send)]
impl Plugin for HttpCachingPlugin {
  async fn on_downstream_http_request(&self, ctx: &mut RequestExecutionContext) {
    if ctx.downstream_http_request.method != Method::GET {
      return;
    }

    if let Some(store) = &self.store {
      if let Some(mut response) = self.lookup(store, &ctx.downstream_http_request).await {
        debug!("serving response from page cache");

        response
          .headers
          .insert(X_CACHE, HeaderValue::from_static("HIT"));
        ctx.ctx_insert(HIT_MARKER, true);
        ctx.short_circuit(response);
      }
    } else {
      warn!(
        "Cache store '{}' is not configured correctly for http_caching plugin, plugin is skipped.",
        self.config.store_id
      );
    }
  }

  async fn on_downstream_http_response(
    &self,
    ctx: &mut RequestExecutionContext,
    response: &mut GatewayHttpResponse,
  ) {
    if ctx.downstream_http_request.method != Method::GET || ctx.ctx_get(HIT_MARKER).is_some() {
      return;
    }

    let store = match &self.store {
      Some(store) => store,
      None => return,
    };

    if self.config.expose_cache_tags && !response.cacheability.tags.is_empty() {
      let tags = response
        .cacheability
        .tags
        .iter()
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

      match HeaderValue::from_str(&tags) {
        Ok(value) => {
          response.headers.insert(X_CACHE_TAGS, value);
        }
        Err(e) => warn!("cache tags {:?} are not a valid header value: {}", tags, e),
      }
    }

    let cacheable = response.status == StatusCode::OK
      && !ctx.is_page_cache_disabled()
      && !ctx.has_failed_extraction();

    if !cacheable {
      debug!(
        "response is not cacheable, status: {}, kill switch: {}",
        response.status,
        ctx.is_page_cache_disabled()
      );

      response
        .headers
        .insert(X_CACHE, HeaderValue::from_static("UNCACHEABLE"));

      return;
    }

    self
      .persist(store, &ctx.downstream_http_request, response)
      .await;
    response
      .headers
      .insert(X_CACHE, HeaderValue::from_static("MISS"));
  }
}

fn now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or_default()
}
