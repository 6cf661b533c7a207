pub mod app_config;
pub mod dataset;
pub mod error;
pub mod naming;
pub mod store_model;
