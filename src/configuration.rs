pub mod config_flow;
pub mod config_store;
pub mod device_api;
pub mod form;
pub mod main_configuration;
pub mod post_data;
