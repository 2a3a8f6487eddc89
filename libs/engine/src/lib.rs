pub mod gateway;
pub mod plugin_manager;
pub mod source;
