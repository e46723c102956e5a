pub mod repositories;
pub mod services;

pub use repositories::*;
pub use services::*;
