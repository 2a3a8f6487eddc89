use std::{
  collections::HashSet,
  fmt::{Debug, Formatter},
  sync::Arc,
};

use apq_cache::CacheManager;
use apq_common::{
  execute::RequestExecutionContext,
  graphql::{ExtractGraphQLOperationError, GraphQLRequest, GraphQLResponse},
  http::{GatewayHttpRequest, GatewayHttpResponse, Method, StatusCode},
  plugin::PluginError,
};
use apq_config::{ConfigError, GatewayConfig, PluginDefinition, SourceDefinition};
use tracing::{debug, error, info};

use crate::{
  plugin_manager::PluginManager,
  source::{
    graphql_source::GraphQLSourceRuntime,
    mock_source::MockedSourceRuntime,
    runtime::{SourceError, SourceRuntime},
  },
};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
  #[error("invalid configuration: {0}")]
  Config(#[from] ConfigError),
  #[error("failed to create plugin: {0}")]
  Plugin(#[from] PluginError),
  #[error("failed to create source: {0}")]
  Source(#[from] SourceError),
  #[error("endpoint {endpoint:?} refers to unknown source {source_id:?}")]
  UnknownSource { endpoint: String, source_id: String },
}

pub struct GatewayRouteData {
  pub endpoint: String,
  pub plugin_manager: Arc<PluginManager>,
  pub to: Arc<dyn SourceRuntime>,
  /// Names of the plugins enabled for this endpoint.
  pub capabilities: HashSet<String>,
}

impl Debug for GatewayRouteData {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GatewayRouteData")
      .field("endpoint", &self.endpoint)
      .field("plugins", &self.plugin_manager.len())
      .field("capabilities", &self.capabilities)
      .finish()
  }
}

impl GatewayRouteData {
  /// Builds the route of one endpoint. Global plugins come first, then the endpoint plugins.
  pub async fn build(
    endpoint: &str,
    plugins: &[PluginDefinition],
    source: Arc<dyn SourceRuntime>,
    cache_manager: Arc<CacheManager>,
  ) -> Result<Self, GatewayError> {
    let capabilities = plugins
      .iter()
      .filter(|p| p.is_enabled())
      .map(|p| p.name().to_string())
      .collect();
    let plugin_manager = PluginManager::new(plugins, cache_manager).await?;

    Ok(Self {
      endpoint: endpoint.to_string(),
      plugin_manager: Arc::new(plugin_manager),
      to: source,
      capabilities,
    })
  }
}

#[derive(Debug)]
pub struct GatewayRoute {
  pub base_path: String,
  pub route_data: Arc<GatewayRouteData>,
}

#[derive(Debug)]
pub struct Gateway {
  pub routes: Vec<GatewayRoute>,
}

impl Gateway {
  pub async fn new(
    config_object: &GatewayConfig,
    cache_manager: Arc<CacheManager>,
  ) -> Result<Self, GatewayError> {
    config_object.validate()?;

    let global_plugins = &config_object.plugins;
    let mut routes = Vec::with_capacity(config_object.endpoints.len());

    for endpoint_config in config_object.endpoints.iter() {
      let combined_plugins = global_plugins
        .iter()
        .chain(&endpoint_config.plugins)
        .flat_map(|vec| vec.iter())
        .cloned()
        .collect::<Vec<_>>();

      let source: Arc<dyn SourceRuntime> = match config_object
        .sources
        .iter()
        .find(|source_def| source_def.id() == endpoint_config.from)
      {
        Some(SourceDefinition::GraphQL { config, .. }) => {
          Arc::new(GraphQLSourceRuntime::new(config.clone())?)
        }
        Some(SourceDefinition::Mock { config, .. }) => {
          Arc::new(MockedSourceRuntime::new(config.clone()))
        }
        None => {
          return Err(GatewayError::UnknownSource {
            endpoint: endpoint_config.path.clone(),
            source_id: endpoint_config.from.clone(),
          })
        }
      };

      let route_data = GatewayRouteData::build(
        &endpoint_config.path,
        &combined_plugins,
        source,
        cache_manager.clone(),
      )
      .await?;

      info!(
        "endpoint {:?} is ready, serving source {:?} with capabilities {:?}",
        endpoint_config.path, endpoint_config.from, route_data.capabilities
      );

      routes.push(GatewayRoute {
        base_path: endpoint_config.path.clone(),
        route_data: Arc::new(route_data),
      });
    }

    Ok(Self { routes })
  }

  pub fn match_route(&self, path: &str) -> Option<&Arc<GatewayRouteData>> {
    let path = path.split('?').next().unwrap_or_default();

    self
      .routes
      .iter()
      .find(|route| route.base_path.trim_end_matches('/') == path.trim_end_matches('/'))
      .map(|route| &route.route_data)
  }

  async fn respond(
    route_data: &GatewayRouteData,
    request_ctx: &mut RequestExecutionContext,
    mut response: GatewayHttpResponse,
  ) -> GatewayHttpResponse {
    response.cacheability.merge(&request_ctx.cacheability);

    route_data
      .plugin_manager
      .on_downstream_http_response(request_ctx, &mut response)
      .await;

    response
  }

  #[tracing::instrument(
    skip(request, route_data),
    name = "Gateway::execute",
    fields(endpoint = %route_data.endpoint)
  )]
  pub async fn execute(
    request: GatewayHttpRequest,
    route_data: &GatewayRouteData,
  ) -> GatewayHttpResponse {
    let mut request_ctx = RequestExecutionContext::new(request)
      .with_capabilities(route_data.capabilities.iter().cloned());

    // Step 1: Trigger "on_downstream_http_request" on all plugins
    route_data
      .plugin_manager
      .on_downstream_http_request(&mut request_ctx)
      .await;

    // Step 1.5: In case of short circuit, return the response right now.
    if let Some(sc_response) = request_ctx.short_circuit_response.take() {
      return Self::respond(route_data, &mut request_ctx, sc_response).await;
    }

    // Step 2: Default handling flow for GraphQL request using POST
    // Plugins might have set it before, so we can avoid extraction.
    if request_ctx.downstream_graphql_request.is_none()
      && request_ctx.downstream_http_request.method == Method::POST
    {
      debug!("captured POST request, trying to handle as GraphQL POST flow");
      let (_, accept, result) =
        GraphQLRequest::new_from_http_post(&request_ctx.downstream_http_request);

      match result {
        Ok(gql_request) => {
          request_ctx.downstream_graphql_request = Some(gql_request);
        }
        // Neither a query nor a persisted query hash, handled as a failed extraction below.
        Err(ExtractGraphQLOperationError::EmptyExtraction) => {}
        Err(e) => {
          error!(
            "error while trying to extract GraphQL request from POST request: {:?}",
            e
          );

          let error_response = e.into_response(accept);
          return Self::respond(route_data, &mut request_ctx, error_response).await;
        }
      }
    }

    // Step 2.5: In case of invalid request at this point, we can fail and return an error.
    if request_ctx.has_failed_extraction() {
      let error_response = GraphQLResponse::new_error_with_code(
        "failed to extract GraphQL request from HTTP request",
        StatusCode::BAD_REQUEST,
      )
      .into();

      return Self::respond(route_data, &mut request_ctx, error_response).await;
    }

    // Step 3: Execute plugins on the extracted GraphQL request.
    route_data
      .plugin_manager
      .on_downstream_graphql_request(&mut request_ctx)
      .await;

    // Step 3.5: In case of short circuit, return the response right now.
    if let Some(sc_response) = request_ctx.short_circuit_response.take() {
      return Self::respond(route_data, &mut request_ctx, sc_response).await;
    }

    // Step 4: An operation that is still missing its text could not be resolved.
    let unresolved = request_ctx
      .downstream_graphql_request
      .as_ref()
      .filter(|request| request.operation.is_none())
      .map(|request| request.persisted_query_hash().is_some());

    match unresolved {
      Some(true) => {
        debug!("persisted query was not resolved, responding with PersistedQueryNotFound");

        let response = GraphQLResponse::persisted_query_not_found().into();
        return Self::respond(route_data, &mut request_ctx, response).await;
      }
      Some(false) => {
        let response = GraphQLResponse::new_error_with_code(
          "failed to extract GraphQL request from HTTP request",
          StatusCode::BAD_REQUEST,
        )
        .into();
        return Self::respond(route_data, &mut request_ctx, response).await;
      }
      None => {}
    }

    // Step 5: Execute the operation.
    let final_response = match route_data.to.execute(route_data, &mut request_ctx).await {
      Ok(response) => response,
      Err(e) => {
        error!("failed to execute operation: {}", e);

        e.into()
      }
    };

    Self::respond(route_data, &mut request_ctx, final_response.into()).await
  }
}
