pub mod file_config_adapter;
pub mod import;
pub mod sqlite_adapter;
#[cfg(feature = "web")]
pub mod web;
