//! System session for oxidized-gekko
//!
//! Ties guest memory, the CPU and the system clock together and drives them
//! in fixed cycle slices.

pub mod session;
pub mod timing;

pub use session::{Session, SessionState};
pub use timing::FixedTiming;
