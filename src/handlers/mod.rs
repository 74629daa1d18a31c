pub mod admin;
pub mod auth;
pub mod campaign;
pub mod payment;
pub mod user;
pub mod webhook;

pub use admin::admin_config;
pub use auth::auth_config;
pub use campaign::campaign_config;
pub use payment::payment_config;
pub use user::user_config;
pub use webhook::webhook_config;
