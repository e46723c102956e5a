pub mod scope;
pub mod status;

pub use scope::*;
pub use status::*;
