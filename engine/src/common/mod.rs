pub mod errors;

pub use errors::{ApplyError, EngineError, EngineResult, WatcherError};
