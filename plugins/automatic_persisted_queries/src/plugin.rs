use std::sync::Arc;

use apq_cache::CacheManager;
use apq_common::{
  execute::RequestExecutionContext,
  http::GatewayHttpResponse,
  plugin::{CreatablePlugin, Plugin, PluginError},
};
use tracing::{debug, error, warn};

use crate::{
  config::AutomaticPersistedQueriesPluginConfig,
  invalidator::CacheManagerTagInvalidator,
  pipeline::{ApqError, ApqPipeline, OperationContext},
  store::CachePersistedQueryStore,
};

/// Capability name checked on the request context.
pub const APQ_CAPABILITY: &str = "automatic_persisted_queries";

#[derive(Debug)]
pub struct AutomaticPersistedQueriesPlugin {
  config: AutomaticPersistedQueriesPluginConfig,
  pipeline: Option<ApqPipeline>,
}

impl AutomaticPersistedQueriesPlugin {
  pub fn configure_caching(&mut self, mgr: Arc<CacheManager>) -> Result<(), PluginError> {
    let store = mgr
      .get_store(&self.config.store_id)
      .ok_or_else(|| PluginError::InitError {
        source: anyhow::anyhow!("Cache store not found: {}", self.config.store_id),
      })?;

    self.pipeline = Some(ApqPipeline::new(
      Arc::new(CachePersistedQueryStore::new(store)),
      Arc::new(CacheManagerTagInvalidator::new(mgr)),
      self.config.not_found_policy,
    ));

    Ok(())
  }
}

#[async_trait::async_trait(?Send)]
impl CreatablePlugin for AutomaticPersistedQueriesPlugin {
  type Config = AutomaticPersistedQueriesPluginConfig;

  async fn create(config: Self::Config) -> Result<Box<Self>, PluginError> {
    debug!("creating automatic persisted queries plugin");

    Ok(Box::new(Self {
      config,
      pipeline: None,
    }))
  }
}

#[async_trait::async_trait(?Send)]
impl Plugin for AutomaticPersistedQueriesPlugin {
  async fn on_downstream_graphql_request(&self, ctx: &mut RequestExecutionContext) {
    let pipeline = match &self.pipeline {
      Some(pipeline) => pipeline,
      None => {
        warn!(
          "Cache store '{}' is not configured correctly for automatic_persisted_queries plugin, plugin is skipped.",
          self.config.store_id
        );

        return;
      }
    };

    let request = match &ctx.downstream_graphql_request {
      Some(request) => request,
      None => return,
    };

    let mut operation = OperationContext {
      query: request.operation.clone(),
      hash: request.persisted_query_hash().map(String::from),
      enabled: ctx.has_capability(APQ_CAPABILITY),
      cache_contexts: Default::default(),
    };

    match pipeline.on_before_operation(&mut operation).await {
      Ok(outcome) => {
        debug!("persisted query stage finished with {:?}", outcome);

        if let Some(request) = ctx.downstream_graphql_request.as_mut() {
          request.operation = operation.query;
        }
        ctx.cacheability.add_cache_contexts(operation.cache_contexts);
      }
      Err(e @ ApqError::HashMismatch { .. }) => {
        ctx.disable_page_cache();
        ctx.short_circuit(e.into_response());
      }
      Err(e) => {
        error!("persisted query stage failed: {}", e);

        ctx.disable_page_cache();
        ctx.short_circuit(e.into_response());
      }
    }
  }

  async fn on_downstream_http_response(
    &self,
    ctx: &mut RequestExecutionContext,
    response: &mut GatewayHttpResponse,
  ) {
    if let Some(pipeline) = &self.pipeline {
      pipeline.on_response(ctx, response);
    }
  }

  // Tags must be on the response before a page cache persists it.
  fn response_priority(&self) -> i32 {
    100
  }
}
