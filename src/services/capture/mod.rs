//! CaptureProvider service: reads screen pixels for a rectangle and nothing else.
//! Clipping to the screen happens in `CaptureProvider::capture`, so every backend
//! only ever sees a non-empty, on-screen rectangle.

mod grim;
mod import;
mod maim;
mod screen_capture;
mod r#trait;

use std::time::Duration;

/// Снимок большой области медленнее обычного запроса к утилите
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

pub use self::r#trait::{CaptureProvider, Snapshot};
pub use self::screen_capture::ScreenCapture;
