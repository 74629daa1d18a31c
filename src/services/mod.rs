pub mod auth_service;
pub mod campaign_service;
pub mod payment_service;
pub mod user_service;

pub use auth_service::*;
pub use campaign_service::*;
pub use payment_service::*;
pub use user_service::*;
