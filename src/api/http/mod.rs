mod client;
mod config;
mod error;

pub use client::HttpSessionApi;
pub use config::HttpApiConfig;
pub use error::{HttpApiError, HttpResult};
