//! WindowTracker service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for reporting the focused
//! window (title/class/geometry depending on platform). It MUST NOT decide whether
//! scanning or approval happens; those decisions belong to the StateMachine and
//! the Scheduler, using `is_target_window()`.

mod kdotool;
mod sway;
mod wmctrl;
mod xdotool;
mod window_tracker;
mod r#trait;

pub use self::r#trait::{create_window_tracker, WindowTracker};
pub use self::sway::parse_rect as parse_sway_rect;
