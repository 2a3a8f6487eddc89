pub mod interpolate;

use std::{collections::HashSet, fs::read_to_string, path::Path};

use apq_cache::config::{CacheStoreConfig, InMemoryConfig};
use apq_common::serde_utils::{JsonSchemaExample, JsonSchemaExampleMetadata, LocalFileReference, BASE_PATH};
use apq_logger::config::LoggerConfigFormat;
use interpolate::{interpolate, EnvVars};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// This section describes the top-level configuration object of the gateway.
///
/// The gateway supports both YAML and JSON format for the configuration file.
///
/// ## Loading the config file
///
/// Pass the configuration file path as the first argument of the binary:
///
/// ```sh
///
/// gateway my-config-file.yaml
///
/// ```
///
/// > By default, the gateway looks for a file named `config.json` in the current directory.
///
/// ### Configuration Interpolation with Environment Variables
///
/// Environment variables can be inserted anywhere in the config file:
/// - `${VAR_NAME}` inserts the value of `VAR_NAME`, or an empty string (with a warning) when it is not set.
/// - `${VAR_NAME:-default_value}` falls back to `default_value` when `VAR_NAME` is unset or empty.
/// - `${VAR_NAME:?message}` fails loading when `VAR_NAME` is unset or empty.
/// - `$$` is a literal dollar sign.
///
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[schemars(example = "gateway_config_example1")]
pub struct GatewayConfig {
  #[serde(
    default = "default_server_config",
    skip_serializing_if = "Option::is_none"
  )]
  /// Configuration for the HTTP server.
  pub server: Option<ServerConfig>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  /// Gateway logger configuration.
  pub logger: Option<LoggerConfig>,
  /// Cache stores shared by all endpoints. Plugins refer to a store by its `id`.
  ///
  /// Cache tags are global: invalidating a tag affects every store.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cache_stores: Vec<CacheStoreConfig>,
  /// List of sources to be used by the gateway.
  pub sources: Vec<SourceDefinition>,
  /// List of GraphQL endpoints to be exposed by the gateway.
  /// Each endpoint is backed by a source and can have a unique set of plugins applied to it.
  pub endpoints: Vec<EndpointDefinition>,
  /// List of global plugins to be applied to all endpoints. Global plugins are applied before endpoint-specific plugins.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub plugins: Option<Vec<PluginDefinition>>,
}

fn default_server_config() -> Option<ServerConfig> {
  Some(ServerConfig {
    port: default_server_port(),
    host: default_server_host(),
  })
}

fn gateway_config_example1() -> JsonSchemaExample<GatewayConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new(
      "Persisted queries with page caching",
      Some("Exposes a GraphQL source over POST and GET, with automatic persisted queries and a page cache in front of it."),
    ),
    wrapper: None,
    example: GatewayConfig {
      server: None,
      logger: None,
      cache_stores: vec![
        CacheStoreConfig::InMemory {
          id: "apq".to_string(),
          config: InMemoryConfig::default(),
        },
        CacheStoreConfig::InMemory {
          id: "pages".to_string(),
          config: InMemoryConfig::default(),
        },
      ],
      sources: vec![SourceDefinition::GraphQL {
        id: "my-source".to_string(),
        config: GraphQLSourceConfig {
          endpoint: "https://my-source.com/graphql".to_string(),
        },
      }],
      endpoints: vec![EndpointDefinition {
        path: "/graphql".to_string(),
        from: "my-source".to_string(),
        plugins: Some(vec![
          PluginDefinition::HttpGetPlugin {
            enabled: default_plugin_enabled(),
            config: None,
          },
          PluginDefinition::AutomaticPersistedQueriesPlugin {
            enabled: default_plugin_enabled(),
            config: None,
          },
          PluginDefinition::HttpCachingPlugin {
            enabled: default_plugin_enabled(),
            config: http_caching_plugin::Config {
              store_id: "pages".to_string(),
              max_age: 60,
              contexts: http_caching_plugin::config::default_contexts(),
              expose_cache_tags: false,
            },
          },
        ]),
      }],
      plugins: None,
    },
  }
}

/// The `Endpoint` object exposes a GraphQL source with set of plugins applied to it.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct EndpointDefinition {
  /// A valid HTTP path to listen on for this endpoint.
  pub path: String,
  /// The identifier of the `Source` to be used.
  ///
  /// This must match the `id` field of a `Source` definition.
  pub from: String,
  /// A list of unique plugins to be applied to this endpoint. These plugins will be applied after the global plugins.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub plugins: Option<Vec<PluginDefinition>>,
}

fn default_plugin_enabled() -> Option<bool> {
  Some(true)
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum PluginDefinition {
  #[serde(rename = "automatic_persisted_queries")]
  AutomaticPersistedQueriesPlugin {
    #[serde(
      default = "default_plugin_enabled",
      skip_serializing_if = "Option::is_none"
    )]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<automatic_persisted_queries_plugin::Config>,
  },

  #[serde(rename = "http_caching")]
  HttpCachingPlugin {
    #[serde(
      default = "default_plugin_enabled",
      skip_serializing_if = "Option::is_none"
    )]
    enabled: Option<bool>,
    config: http_caching_plugin::Config,
  },

  #[serde(rename = "http_get")]
  HttpGetPlugin {
    #[serde(
      default = "default_plugin_enabled",
      skip_serializing_if = "Option::is_none"
    )]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<http_get_plugin::Config>,
  },
}

impl PluginDefinition {
  /// The plugin type name, which is also the capability an enabled plugin grants its endpoint.
  pub fn name(&self) -> &'static str {
    match self {
      PluginDefinition::AutomaticPersistedQueriesPlugin { .. } => "automatic_persisted_queries",
      PluginDefinition::HttpCachingPlugin { .. } => "http_caching",
      PluginDefinition::HttpGetPlugin { .. } => "http_get",
    }
  }

  pub fn is_enabled(&self) -> bool {
    let enabled = match self {
      PluginDefinition::AutomaticPersistedQueriesPlugin { enabled, .. } => enabled,
      PluginDefinition::HttpCachingPlugin { enabled, .. } => enabled,
      PluginDefinition::HttpGetPlugin { enabled, .. } => enabled,
    };

    enabled.unwrap_or(true)
  }

  fn cache_store_id(&self) -> Option<String> {
    match self {
      PluginDefinition::AutomaticPersistedQueriesPlugin { config, .. } => {
        Some(config.clone().unwrap_or_default().store_id)
      }
      PluginDefinition::HttpCachingPlugin { config, .. } => Some(config.store_id.clone()),
      PluginDefinition::HttpGetPlugin { .. } => None,
    }
  }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LoggerConfig {
  /// Environment filter configuration as a string.
  ///
  /// - `info` logs all messages at info level and higher across all modules.
  ///
  /// - `automatic_persisted_queries_plugin=debug,info` logs every registration and lookup of
  ///   persisted queries, and everything else at info level.
  ///
  /// See [tracing_subscriber::EnvFilter](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html) for the directive syntax.
  #[serde(default = "default_log_filter")]
  pub filter: String,
  /// The logger output format.
  #[serde(default)]
  pub format: LoggerConfigFormat,
  /// Emits span timings of the request lifecycle. Look for `close` spans printed in the logs.
  #[serde(default)]
  pub print_performance_info: bool,
}

impl Default for LoggerConfig {
  fn default() -> Self {
    Self {
      filter: default_log_filter(),
      format: LoggerConfigFormat::default(),
      print_performance_info: false,
    }
  }
}

fn default_log_filter() -> String {
  "info".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ServerConfig {
  #[serde(default = "default_server_port")]
  /// The port to listen on, default to 9000
  pub port: u16,
  #[serde(default = "default_server_host")]
  /// The host to listen on, default to 127.0.0.1
  pub host: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      port: default_server_port(),
      host: default_server_host(),
    }
  }
}

fn default_server_port() -> u16 {
  9000
}

fn default_server_host() -> String {
  "127.0.0.1".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
/// A source definition for a GraphQL endpoint.
pub enum SourceDefinition {
  #[serde(rename = "graphql")]
  /// A simple, single GraphQL endpoint
  GraphQL {
    /// The identifier of the source. This is used to reference the source in the `from` field of an endpoint definition.
    id: String,
    /// The configuration for the GraphQL source.
    config: GraphQLSourceConfig,
  },
  #[serde(rename = "mock")]
  /// A source answering every operation with the same static response
  Mock {
    /// The identifier of the source. This is used to reference the source in the `from` field of an endpoint definition.
    id: String,
    /// The configuration for the mocked source.
    config: MockedSourceConfig,
  },
}

impl SourceDefinition {
  pub fn id(&self) -> &str {
    match self {
      SourceDefinition::GraphQL { id, .. } => id,
      SourceDefinition::Mock { id, .. } => id,
    }
  }
}

/// An upstream based on a simple, single GraphQL endpoint.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct GraphQLSourceConfig {
  /// The HTTP(S) endpoint URL for the GraphQL source.
  pub endpoint: String,
}

/// A mocked upstream with a static response for all executed operations.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct MockedSourceConfig {
  /// A JSON file with the response body, relative to the config file.
  pub response_data: LocalFileReference,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file {path:?}: {source}")]
  Read {
    path: String,
    source: std::io::Error,
  },
  #[error("unsupported config file extension for {0:?}, expected .json, .yaml or .yml")]
  UnsupportedFormat(String),
  #[error("failed to interpolate config file: {}", .0.join("; "))]
  Interpolation(Vec<String>),
  #[error("failed to parse JSON config file: {0}")]
  Json(#[from] serde_json::Error),
  #[error("failed to parse YAML config file: {0}")]
  Yaml(#[from] serde_yaml::Error),
  #[error("invalid config: {0}")]
  Invalid(String),
}

impl GatewayConfig {
  /// Checks references between sections: endpoint sources and plugin cache stores.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut store_ids = HashSet::new();

    for store in &self.cache_stores {
      if !store_ids.insert(store.id()) {
        return Err(ConfigError::Invalid(format!(
          "cache store {:?} is defined more than once",
          store.id()
        )));
      }
    }

    for endpoint in &self.endpoints {
      if !self.sources.iter().any(|s| s.id() == endpoint.from) {
        return Err(ConfigError::Invalid(format!(
          "endpoint {:?} refers to unknown source {:?}",
          endpoint.path, endpoint.from
        )));
      }

      let plugins = self
        .plugins
        .iter()
        .chain(&endpoint.plugins)
        .flat_map(|vec| vec.iter())
        .filter(|p| p.is_enabled());

      for plugin in plugins {
        if let Some(store_id) = plugin.cache_store_id() {
          if !store_ids.contains(store_id.as_str()) {
            return Err(ConfigError::Invalid(format!(
              "plugin {:?} on endpoint {:?} refers to unknown cache store {:?}",
              plugin.name(),
              endpoint.path,
              store_id
            )));
          }
        }
      }
    }

    Ok(())
  }
}

#[tracing::instrument(level = "trace", skip(get_env_value))]
pub fn load_config(
  file_path: &str,
  get_env_value: impl EnvVars,
) -> Result<GatewayConfig, ConfigError> {
  let path = Path::new(file_path);
  let format = ConfigFormat::from_path(path)?;

  let raw_contents = read_to_string(file_path).map_err(|source| ConfigError::Read {
    path: file_path.to_string(),
    source,
  })?;

  let base_path = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
  BASE_PATH.with(|bp| {
    *bp.borrow_mut() = base_path;
  });

  parse_config_contents(raw_contents, format, get_env_value)
}

pub fn parse_config_contents(
  contents: String,
  format: ConfigFormat,
  get_env_value: impl EnvVars,
) -> Result<GatewayConfig, ConfigError> {
  let (config_string, warnings) =
    interpolate(&contents, get_env_value).map_err(ConfigError::Interpolation)?;

  for warning in warnings {
    warn!("{}", warning);
  }

  let config = match format {
    ConfigFormat::Json => serde_json::from_str::<GatewayConfig>(&config_string)?,
    ConfigFormat::Yaml => serde_yaml::from_str::<GatewayConfig>(&config_string)?,
  };
  config.validate()?;

  Ok(config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
  Json,
  Yaml,
}

impl ConfigFormat {
  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
      Some("json") => Ok(ConfigFormat::Json),
      Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
      _ => Err(ConfigError::UnsupportedFormat(
        path.to_string_lossy().into_owned(),
      )),
    }
  }
}
