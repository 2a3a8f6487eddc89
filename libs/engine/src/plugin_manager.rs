use std::sync::Arc;

use apq_cache::CacheManager;
use apq_common::{
  execute::RequestExecutionContext,
  graphql::GraphQLRequest,
  http::GatewayHttpResponse,
  plugin::{CreatablePlugin, Plugin, PluginError},
};
use apq_config::PluginDefinition;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PluginManager {
  plugins: Vec<Box<dyn Plugin>>,
  // Indices into `plugins`, highest response priority first. Ties keep registration order.
  response_order: Vec<usize>,
}

impl PluginManager {
  pub fn new_from_vec(plugins: Vec<Box<dyn Plugin>>) -> Self {
    let mut pm = Self::default();

    for plugin in plugins {
      pm.register_boxed_plugin(plugin);
    }

    pm
  }

  pub async fn create_plugin<T: CreatablePlugin>(config: T::Config) -> Result<Box<T>, PluginError> {
    T::create(config).await
  }

  pub async fn new(
    plugins_config: &[PluginDefinition],
    cache_manager: Arc<CacheManager>,
  ) -> Result<Self, PluginError> {
    let mut instance = PluginManager::default();

    // Disabled plugins are skipped.
    for plugin_def in plugins_config.iter().filter(|p| p.is_enabled()) {
      debug!("creating plugin {:?}", plugin_def.name());

      let plugin: Box<dyn Plugin> = match plugin_def {
        PluginDefinition::AutomaticPersistedQueriesPlugin { config, .. } => {
          let mut plugin = Self::create_plugin::<automatic_persisted_queries_plugin::Plugin>(
            config.clone().unwrap_or_default(),
          )
          .await?;
          plugin.configure_caching(cache_manager.clone())?;

          plugin
        }
        PluginDefinition::HttpCachingPlugin { config, .. } => {
          let mut plugin = Self::create_plugin::<http_caching_plugin::Plugin>(config.clone()).await?;
          plugin.configure_caching(cache_manager.clone())?;

          plugin
        }
        PluginDefinition::HttpGetPlugin { config, .. } => {
          Self::create_plugin::<http_get_plugin::Plugin>(config.clone().unwrap_or_default()).await?
        }
      };

      instance.register_boxed_plugin(plugin);
    }

    Ok(instance)
  }

  pub fn register_boxed_plugin(&mut self, plugin: Box<dyn Plugin>) {
    self.plugins.push(plugin);

    let plugins = &self.plugins;
    let mut order = (0..plugins.len()).collect::<Vec<_>>();
    order.sort_by_key(|index| std::cmp::Reverse(plugins[*index].response_priority()));
    self.response_order = order;
  }

  pub fn len(&self) -> usize {
    self.plugins.len()
  }

  pub fn is_empty(&self) -> bool {
    self.plugins.is_empty()
  }

  #[tracing::instrument(level = "debug", skip(self, context))]
  pub async fn on_downstream_http_request(&self, context: &mut RequestExecutionContext) {
    for plugin in self.plugins.iter() {
      plugin.on_downstream_http_request(context).await;

      if context.is_short_circuit() {
        return;
      }
    }
  }

  #[tracing::instrument(level = "debug", skip(self, context))]
  pub async fn on_downstream_graphql_request(&self, context: &mut RequestExecutionContext) {
    for plugin in self.plugins.iter() {
      plugin.on_downstream_graphql_request(context).await;

      if context.is_short_circuit() {
        return;
      }
    }
  }

  #[tracing::instrument(level = "debug", skip(self, req))]
  pub async fn on_upstream_graphql_request(&self, req: &mut GraphQLRequest) {
    for plugin in self.plugins.iter() {
      plugin.on_upstream_graphql_request(req).await;
    }
  }

  #[tracing::instrument(level = "debug", skip(self, context, response))]
  pub async fn on_downstream_http_response(
    &self,
    context: &mut RequestExecutionContext,
    response: &mut GatewayHttpResponse,
  ) {
    for index in self.response_order.iter() {
      self.plugins[*index]
        .on_downstream_http_response(context, response)
        .await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use apq_common::http::{GatewayHttpRequest, HeaderValue};
  use std::sync::Mutex;

  #[derive(Debug)]
  struct Recorder {
    name: &'static str,
    priority: i32,
    journal: Arc<Mutex<Vec<String>>>,
  }

  #[async_trait::async_trait(?Send)]
  impl Plugin for Recorder {
    async fn on_downstream_http_request(&self, _ctx: &mut RequestExecutionContext) {
      self
        .journal
        .lock()
        .unwrap()
        .push(format!("request {}", self.name));
    }

    async fn on_downstream_http_response(
      &self,
      _ctx: &mut RequestExecutionContext,
      response: &mut GatewayHttpResponse,
    ) {
      self
        .journal
        .lock()
        .unwrap()
        .push(format!("response {}", self.name));
      response
        .headers
        .append("x-seen", HeaderValue::from_static(self.name));
    }

    fn response_priority(&self) -> i32 {
      self.priority
    }
  }

  #[tokio::test]
  async fn response_hooks_follow_priority() {
    let journal = Arc::new(Mutex::new(vec![]));
    let recorder = |name, priority| Recorder {
      name,
      priority,
      journal: journal.clone(),
    };
    let pm = PluginManager::new_from_vec(vec![
      Box::new(recorder("cache", 0)),
      Box::new(recorder("apq", 100)),
      Box::new(recorder("other", 0)),
    ]);
    let mut ctx = RequestExecutionContext::new(GatewayHttpRequest::default());
    let mut response = GatewayHttpResponse {
      body: Default::default(),
      status: Default::default(),
      headers: Default::default(),
      cacheability: Default::default(),
    };

    pm.on_downstream_http_request(&mut ctx).await;
    pm.on_downstream_http_response(&mut ctx, &mut response).await;

    assert_eq!(
      *journal.lock().unwrap(),
      vec![
        "request cache",
        "request apq",
        "request other",
        "response apq",
        "response cache",
        "response other",
      ]
    );
  }

  #[tokio::test]
  async fn disabled_plugins_are_skipped() {
    let definitions = vec![
      PluginDefinition::HttpGetPlugin {
        enabled: Some(false),
        config: None,
      },
      PluginDefinition::HttpGetPlugin {
        enabled: Some(true),
        config: None,
      },
    ];

    let pm = PluginManager::new(&definitions, Arc::new(CacheManager::default()))
      .await
      .unwrap();

    assert_eq!(pm.len(), 1);
    assert!(!pm.is_empty());
    assert!(PluginManager::default().is_empty());
  }

  #[tokio::test]
  async fn missing_cache_store_fails() {
    let definitions = vec![PluginDefinition::AutomaticPersistedQueriesPlugin {
      enabled: Some(true),
      config: None,
    }];

    assert!(
      PluginManager::new(&definitions, Arc::new(CacheManager::default()))
        .await
        .is_err()
    );
  }
}
