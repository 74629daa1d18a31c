pub mod campaign;
pub mod pagination;
pub mod transaction;
pub mod user;

pub use campaign::*;
pub use pagination::*;
pub use transaction::*;
pub use user::*;
