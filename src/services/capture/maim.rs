use crate::error::Result;
use crate::events::Rect;
use crate::utils::command::{run_command_with_timeout, tool_command};
use image::DynamicImage;
use tracing::debug;

use super::CAPTURE_TIMEOUT;

/// Снимки через maim (X11)
pub struct MaimCapture;

impl MaimCapture {
    pub fn new() -> Self {
        Self
    }

    pub async fn grab(&self, rect: Rect) -> Result<DynamicImage> {
        let geometry = x11_geometry(&rect);
        debug!("maim -g {}", geometry);

        let cmd = tool_command("maim", &["--hidecursor", "-f", "png", "-g", &geometry]);
        let png = run_command_with_timeout("maim", cmd, CAPTURE_TIMEOUT).await?;
        Ok(image::load_from_memory(&png)?)
    }
}

/// Геометрия X11: `WxH+X+Y` (знак смещения обязателен)
pub fn x11_geometry(rect: &Rect) -> String {
    format!("{}x{}{:+}{:+}", rect.width, rect.height, rect.x, rect.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x11_geometry() {
        assert_eq!(x11_geometry(&Rect::new(96, 540, 1440, 486)), "1440x486+96+540");
        assert_eq!(x11_geometry(&Rect::new(-5, 0, 10, 10)), "10x10-5+0");
    }
}
