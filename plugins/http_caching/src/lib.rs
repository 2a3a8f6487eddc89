pub mod config;
pub mod contexts;
pub mod plugin;

pub use crate::config::HttpCachePluginConfig as Config;
pub use crate::plugin::HttpCachingPlugin as Plugin;
