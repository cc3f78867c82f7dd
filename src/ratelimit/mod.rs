//! Sliding-window rate limiting logic and state management.

mod clock;
mod limiter;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{Admission, SlidingWindowLimiter};
pub use window::WindowRecord;
