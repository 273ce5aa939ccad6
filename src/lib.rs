pub mod config;
pub mod error;
pub mod geocode;
pub mod http_client;
pub mod hydraulics;
pub mod models;
pub mod pdf_import;
pub mod photos;
pub mod services;
pub mod storage;
pub mod upload;

pub use config::Config;
pub use error::{AppError, AppResult};
