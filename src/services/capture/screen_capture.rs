use crate::error::{AppError, Result};
use crate::events::Rect;
use crate::services::window_tracker::parse_sway_rect;
use crate::utils::command::{is_available, run_tool, run_tool_text};
use image::DynamicImage;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::grim::GrimCapture;
use super::import::ImportCapture;
use super::maim::MaimCapture;
use super::r#trait::CaptureProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureBackend {
    Grim,
    Maim,
    Import,
}

pub struct ScreenCapture {
    /// `None`: утилит нет, каждый тик завершится ошибкой захвата
    backend: Option<CaptureBackend>,
    grim: GrimCapture,
    maim: MaimCapture,
    import: ImportCapture,
}

impl ScreenCapture {
    pub fn new() -> Self {
        let backend = match Self::detect_backend() {
            Ok(backend) => {
                info!("Снимки экрана через {:?}", backend);
                Some(backend)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

        Self {
            backend,
            grim: GrimCapture::new(),
            maim: MaimCapture::new(),
            import: ImportCapture::new(),
        }
    }

    fn backend(&self) -> Result<CaptureBackend> {
        self.backend.ok_or_else(|| {
            AppError::ServiceUnavailable("нет утилиты для снимков экрана".to_string())
        })
    }

    fn detect_backend() -> Result<CaptureBackend> {
        let wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();

        if wayland && is_available("grim") {
            return Ok(CaptureBackend::Grim);
        }
        if is_available("maim") {
            return Ok(CaptureBackend::Maim);
        }
        if is_available("import") {
            return Ok(CaptureBackend::Import);
        }
        if is_available("grim") {
            return Ok(CaptureBackend::Grim);
        }

        Err(AppError::ServiceUnavailable(
            "Не найдена утилита для снимков экрана: установите maim, grim или imagemagick".to_string(),
        ))
    }

    async fn x11_screen_bounds() -> Result<Rect> {
        match run_tool_text("xdotool", &["getdisplaygeometry"]).await {
            Ok(text) => {
                if let Some(rect) = parse_display_geometry(&text) {
                    return Ok(rect);
                }
                debug!("Не удалось разобрать xdotool getdisplaygeometry: '{}'", text);
            }
            Err(e) => debug!("xdotool getdisplaygeometry: {}", e),
        }

        let text = run_tool_text("xdpyinfo", &[]).await?;
        parse_xdpyinfo_dimensions(&text)
            .ok_or_else(|| AppError::Internal("xdpyinfo не сообщил размеры экрана".to_string()))
    }

    async fn wayland_screen_bounds() -> Result<Rect> {
        let stdout = run_tool("swaymsg", &["-t", "get_outputs"]).await?;
        let outputs: Value = serde_json::from_slice(&stdout)?;
        parse_outputs(&outputs)
            .ok_or_else(|| AppError::Internal("swaymsg не вернул активных выходов".to_string()))
    }
}

#[async_trait::async_trait]
impl CaptureProvider for ScreenCapture {
    async fn screen_bounds(&self) -> Result<Rect> {
        match self.backend()? {
            CaptureBackend::Grim => match Self::wayland_screen_bounds().await {
                Ok(rect) => Ok(rect),
                // XWayland тоже знает размер корневого окна
                Err(e) => {
                    debug!("Границы экрана через swaymsg недоступны: {}", e);
                    Self::x11_screen_bounds().await
                }
            },
            CaptureBackend::Maim | CaptureBackend::Import => Self::x11_screen_bounds().await,
        }
    }

    async fn grab(&self, rect: Rect) -> Result<DynamicImage> {
        match self.backend()? {
            CaptureBackend::Grim => self.grim.grab(rect).await,
            CaptureBackend::Maim => self.maim.grab(rect).await,
            CaptureBackend::Import => self.import.grab(rect).await,
        }
    }
}

/// `xdotool getdisplaygeometry`: `1920 1080`
pub fn parse_display_geometry(text: &str) -> Option<Rect> {
    let mut parts = text.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some(Rect::new(0, 0, width, height))
}

/// Строка xdpyinfo `  dimensions:    3840x1080 pixels (1016x286 millimeters)`
pub fn parse_xdpyinfo_dimensions(text: &str) -> Option<Rect> {
    let line = text
        .lines()
        .find_map(|line| line.trim().strip_prefix("dimensions:"))?;
    let size = line.split_whitespace().next()?;
    let (width, height) = size.split_once('x')?;
    Some(Rect::new(0, 0, width.parse().ok()?, height.parse().ok()?))
}

/// Объединение прямоугольников активных выходов из `swaymsg -t get_outputs`
pub fn parse_outputs(outputs: &Value) -> Option<Rect> {
    outputs
        .as_array()?
        .iter()
        .filter(|output| output.get("active").and_then(Value::as_bool).unwrap_or(true))
        .filter_map(|output| output.get("rect").and_then(parse_sway_rect))
        .reduce(|acc, rect| acc.union(&rect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_display_geometry() {
        assert_eq!(parse_display_geometry("1920 1080\n"), Some(Rect::new(0, 0, 1920, 1080)));
        assert_eq!(parse_display_geometry("oops"), None);
    }

    #[test]
    fn test_parse_xdpyinfo_dimensions() {
        let text = "name of display:    :0\nscreen #0:\n  dimensions:    3840x1080 pixels (1016x286 millimeters)\n";
        assert_eq!(parse_xdpyinfo_dimensions(text), Some(Rect::new(0, 0, 3840, 1080)));
    }

    #[test]
    fn test_parse_outputs_skips_inactive() {
        let outputs = json!([
            {"name": "eDP-1", "active": true, "rect": {"x": 0, "y": 0, "width": 1920, "height": 1080}},
            {"name": "HDMI-A-1", "active": true, "rect": {"x": 1920, "y": 0, "width": 2560, "height": 1440}},
            {"name": "DP-2", "active": false, "rect": {"x": 0, "y": 0, "width": 0, "height": 0}}
        ]);
        assert_eq!(parse_outputs(&outputs), Some(Rect::new(0, 0, 4480, 1440)));
        assert_eq!(parse_outputs(&json!([])), None);
    }
}
