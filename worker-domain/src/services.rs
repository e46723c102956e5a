pub mod canonical;
pub mod predicate;

pub use canonical::*;
pub use predicate::*;
