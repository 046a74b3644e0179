mod cancel;
mod classify;
mod result;

pub mod prelude {
    pub use crate::cancel::{CancelHandle, CancelListener, CancelledError};
    pub use crate::classify::{short_type_name, ErrorClassifier, ErrorProbe, TaggedError};
    pub use crate::result::{Args, IterationError, IterationResult, RunResult};
}
