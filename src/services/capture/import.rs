use crate::error::Result;
use crate::events::Rect;
use crate::utils::command::{run_command_with_timeout, tool_command};
use image::DynamicImage;
use tracing::debug;

use super::maim::x11_geometry;
use super::CAPTURE_TIMEOUT;

/// Снимки через `import` из ImageMagick (запасной вариант для X11)
pub struct ImportCapture;

impl ImportCapture {
    pub fn new() -> Self {
        Self
    }

    pub async fn grab(&self, rect: Rect) -> Result<DynamicImage> {
        let geometry = x11_geometry(&rect);
        debug!("import -window root -crop {}", geometry);

        let cmd = tool_command("import", &["-silent", "-window", "root", "-crop", &geometry, "png:-"]);
        let png = run_command_with_timeout("import", cmd, CAPTURE_TIMEOUT).await?;
        Ok(image::load_from_memory(&png)?)
    }
}
