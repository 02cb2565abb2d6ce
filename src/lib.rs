//! levelup: XP and leveling daemon
//!
//! The engine itself lives in `levelup-engine`; this crate adds the
//! newline-delimited JSON event protocol and the loop that drives it.

pub mod driver;
pub mod events;

pub use driver::{apply, run, DriverStats};
pub use events::{parse_line, ActivityEvent, DriverReply};
