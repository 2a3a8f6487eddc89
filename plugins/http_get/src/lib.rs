mod config;
mod plugin;

pub use crate::config::HttpGetPluginConfig as Config;
pub use crate::plugin::{extract_graphql_from_get_request, HttpGetPlugin as Plugin};
