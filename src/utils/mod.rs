//! Utility functions and helpers.

pub mod data_api;
pub mod env;

pub use data_api::{DataApiConfig, DataApiTable};
pub use env::{get_env_with_prefix, parse_env_with_prefix};
