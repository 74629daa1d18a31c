pub mod config;
pub mod database;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod swagger;
#[cfg(test)]
pub mod test_support;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
