//! Fixed-window rate limiting for sensitive operations.

mod clock;
mod key;
mod limiter;
mod policy;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::RateLimitKey;
pub use limiter::{Limiters, RateLimiter};
pub use policy::{PolicyError, RateLimitingConfig, WindowPolicy};
pub use window::{Admission, WindowRecord};
