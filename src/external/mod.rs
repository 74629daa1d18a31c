pub mod gateway;
pub mod konnect;
pub mod sandbox;

pub use gateway::*;
pub use konnect::*;
pub use sandbox::*;
