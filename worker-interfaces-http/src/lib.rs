pub mod error;
pub mod handlers;

pub use error::HttpError;
pub use handlers::build_router;
