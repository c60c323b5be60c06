//! Calendar and interval scheduling.
//!
//! - [`ScheduleSpec`]: declarative schedule description, plus [`presets`]
//! - [`next_run_time`]: pure next-trigger computation
//! - [`ScheduledTimer`]: cancellable sequence of trigger timestamps

pub mod calculator;
pub mod schedule;
pub mod timer;

pub use calculator::next_run_time;
pub use schedule::{ScheduleSpec, presets};
pub use timer::{ScheduledTimer, wait_until_next};
