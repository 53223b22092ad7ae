use crate::error::Result;
use crate::events::Rect;
use crate::utils::command::{run_command_with_timeout, tool_command};
use image::DynamicImage;
use tracing::debug;

use super::CAPTURE_TIMEOUT;

/// Снимки через grim (wlroots Wayland)
pub struct GrimCapture;

impl GrimCapture {
    pub fn new() -> Self {
        Self
    }

    pub async fn grab(&self, rect: Rect) -> Result<DynamicImage> {
        let geometry = grim_geometry(&rect);
        debug!("grim -g '{}'", geometry);

        let cmd = tool_command("grim", &["-t", "png", "-g", &geometry, "-"]);
        let png = run_command_with_timeout("grim", cmd, CAPTURE_TIMEOUT).await?;
        Ok(image::load_from_memory(&png)?)
    }
}

/// Формат области grim: `X,Y WxH`
pub fn grim_geometry(rect: &Rect) -> String {
    format!("{},{} {}x{}", rect.x, rect.y, rect.width, rect.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grim_geometry() {
        assert_eq!(grim_geometry(&Rect::new(-10, 20, 300, 40)), "-10,20 300x40");
    }
}
