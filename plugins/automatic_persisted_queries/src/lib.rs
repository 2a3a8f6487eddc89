mod config;
pub mod hasher;
pub mod invalidator;
pub mod pipeline;
mod plugin;
pub mod policy;
pub mod store;

pub use crate::config::AutomaticPersistedQueriesPluginConfig as Config;
pub use crate::plugin::AutomaticPersistedQueriesPlugin as Plugin;
pub use crate::plugin::APQ_CAPABILITY;
pub use crate::policy::ResponseCachePolicy;
