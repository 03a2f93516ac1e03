//! Deferred Execution
//!
//! Time enters the engine in exactly two places: debounced inputs and the
//! one-tick deferral of a stream-backed property's first value. Both go
//! through a host [`Clock`].

mod clock;
mod debounce;

pub use clock::{Clock, ManualClock, Task, TimerId, TokioClock};
pub use debounce::DebouncingTimer;
