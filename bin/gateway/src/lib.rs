use std::sync::Arc;

use actix_web::{
  dev::Response,
  route,
  web::{self, Bytes},
  App, HttpRequest, HttpResponse, HttpServer, Responder, Scope,
};
use anyhow::Context;
use apq_cache::CacheManager;
use apq_common::http::{
  GatewayHttpRequest, GatewayHttpResponse, HeaderName, HeaderValue, HttpHeadersMap, Method,
};
use apq_config::{load_config, GatewayConfig, LoggerConfig};
use apq_engine::gateway::{Gateway, GatewayRouteData};
use apq_logger::logger_layer::build_logger;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;

/// Loads the config file, logging with the default logger until the configured one is installed.
pub fn load_and_install_logger(config_file_path: &str) -> anyhow::Result<GatewayConfig> {
  let default_logger_config = LoggerConfig::default();
  let default_logger = build_logger(
    &default_logger_config.format,
    &default_logger_config.filter,
    default_logger_config.print_performance_info,
  )?;

  let config_object = {
    let _guard =
      tracing::subscriber::set_default(tracing_subscriber::registry().with(default_logger));
    info!("Gateway process started, loading {:?}", config_file_path);

    load_config(config_file_path, |key: &str| std::env::var(key).ok())?
  };

  let logger_config = config_object.logger.clone().unwrap_or_default();
  let logger = build_logger(
    &logger_config.format,
    &logger_config.filter,
    logger_config.print_performance_info,
  )
  .with_context(|| format!("invalid logger filter {:?}", logger_config.filter))?;
  tracing::subscriber::set_global_default(tracing_subscriber::registry().with(logger))?;

  info!("Configuration loaded and parsed");

  Ok(config_object)
}

pub async fn run_services(config_object: GatewayConfig) -> anyhow::Result<()> {
  let cache_manager = Arc::new(CacheManager::new(&config_object.cache_stores));

  debug!("building gateway from configuration...");
  let gateway = Arc::new(
    Gateway::new(&config_object, cache_manager)
      .await
      .context("failed to initialize gateway")?,
  );

  let http_server = HttpServer::new(move || {
    let mut router = App::new();

    for gateway_route in gateway.routes.iter() {
      let child_router = Scope::new(gateway_route.base_path.as_str())
        .app_data(web::Data::new(gateway_route.route_data.clone()))
        .route("", web::route().to(handler));

      router = router.service(child_router)
    }

    router.service(health_handler)
  });

  let server_config = config_object.server.clone().unwrap_or_default();
  info!(
    "server is listening on {}:{}",
    server_config.host, server_config.port
  );

  http_server
    .bind((server_config.host, server_config.port))?
    .run()
    .await?;

  Ok(())
}

#[route("/_health", method = "GET", method = "HEAD")]
async fn health_handler() -> impl Responder {
  Response::ok()
}

#[tracing::instrument(level = "debug", skip(req, body))]
fn transform_req(req: HttpRequest, body: Bytes) -> anyhow::Result<GatewayHttpRequest> {
  let mut headers_map = HttpHeadersMap::new();

  for (key, value) in req.headers().iter() {
    match (
      HeaderName::from_bytes(key.as_str().as_bytes()),
      HeaderValue::from_bytes(value.as_bytes()),
    ) {
      (Ok(key), Ok(value)) => {
        headers_map.append(key, value);
      }
      _ => warn!("dropping invalid request header {:?}", key),
    }
  }

  Ok(GatewayHttpRequest {
    body,
    headers: headers_map,
    method: Method::from_bytes(req.method().as_str().as_bytes())?,
    uri: req.uri().to_string(),
    query_string: req.query_string().to_string(),
  })
}

#[tracing::instrument(level = "debug", skip(gateway_response))]
fn transform_res(gateway_response: GatewayHttpResponse) -> HttpResponse {
  let status = actix_web::http::StatusCode::from_u16(gateway_response.status.as_u16())
    .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
  let mut response = HttpResponse::build(status);

  for (key, value) in gateway_response.headers.iter() {
    response.append_header((key.as_str(), value.as_bytes()));
  }

  response.body(gateway_response.body)
}

#[tracing::instrument(
  level = "debug",
  skip(req, body, route_data),
  name = "gateway_bin::handler",
  fields(endpoint = %route_data.endpoint)
)]
async fn handler(
  req: HttpRequest,
  body: Bytes,
  route_data: web::Data<Arc<GatewayRouteData>>,
) -> impl Responder {
  match transform_req(req, body) {
    Ok(gateway_request) => {
      let gateway_response = Gateway::execute(gateway_request, &route_data).await;

      transform_res(gateway_response)
    }
    Err(e) => {
      warn!("failed to read incoming request: {}", e);

      HttpResponse::BadRequest().finish()
    }
  }
}
