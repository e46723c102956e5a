pub mod process_event;

pub use process_event::process_event;
