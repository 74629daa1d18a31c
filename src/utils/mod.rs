pub mod amount;
pub mod email;
pub mod jwt;
pub mod password;

pub use email::*;
pub use jwt::*;
pub use password::*;
