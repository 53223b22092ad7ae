use crate::error::{AppError, Result};
use crate::events::{Rect, WindowInfo};
use crate::utils::command::{run_command, tool_command};
use tokio::process::Command;
use tracing::debug;

pub struct KdotoolTracker;

impl KdotoolTracker {
    pub fn new() -> Self {
        Self
    }

    /// Под sudo kdotool запускается от имени исходного пользователя, иначе KWin его не пустит
    fn create_command(args: &[&str]) -> Command {
        if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            let mut sudo_args = vec!["-E", "-u", sudo_user.as_str(), "kdotool"];
            sudo_args.extend_from_slice(args);
            tool_command("sudo", &sudo_args)
        } else {
            tool_command("kdotool", args)
        }
    }

    async fn run(args: &[&str]) -> Result<String> {
        let stdout = run_command("kdotool", Self::create_command(args)).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    pub async fn test(&self) -> Result<()> {
        debug!("=== Тестируем kdotool ===");
        let window_id = Self::run(&["getactivewindow"]).await?;
        debug!("kdotool получил window_id: '{}'", window_id);
        debug!("=== kdotool работает ===");
        Ok(())
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        // Получаем ID окна
        let window_id = Self::run(&["getactivewindow"]).await?;
        if window_id.is_empty() {
            return Err(AppError::NoWindowFocused);
        }

        // Получаем название и геометрию окна по ID
        let title = Self::run(&["getwindowname", &window_id]).await?;
        let geometry_text = Self::run(&["getwindowgeometry", &window_id]).await?;

        let mut window = WindowInfo::new(title).with_class("KDE".to_string());
        if let Some(geometry) = parse_position_geometry(&geometry_text) {
            window = window.with_geometry(geometry);
        } else {
            debug!("kdotool: не удалось разобрать геометрию: '{}'", geometry_text);
        }
        Ok(window)
    }
}

/// Разбор вывода вида `Position: 10,20` / `Geometry: 800x600`.
/// KWin может отдавать дробные координаты, они округляются.
pub fn parse_position_geometry(text: &str) -> Option<Rect> {
    let mut position = None;
    let mut size = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Position:") {
            let rest = rest.split_whitespace().next()?;
            let (x, y) = rest.split_once(',')?;
            position = Some((parse_coord(x)? as i32, parse_coord(y)? as i32));
        } else if let Some(rest) = line.strip_prefix("Geometry:") {
            let (w, h) = rest.trim().split_once('x')?;
            size = Some((parse_coord(w)?.max(0.0) as u32, parse_coord(h)?.max(0.0) as u32));
        }
    }

    let (x, y) = position?;
    let (width, height) = size?;
    Some(Rect::new(x, y, width, height))
}

fn parse_coord(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().map(f64::round)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position_geometry() {
        let text = "Window {5c8d2a8e-2f3a-4b7e-9d3c-2b1e6a0f9c11}\n  Position: 0,27\n  Geometry: 1280x1013\n";
        assert_eq!(parse_position_geometry(text), Some(Rect::new(0, 27, 1280, 1013)));
    }

    #[test]
    fn test_parse_fractional_and_xdotool_style() {
        let kwin = "Position: 10.6,-4.2\nGeometry: 640.4x480.5";
        assert_eq!(parse_position_geometry(kwin), Some(Rect::new(11, -4, 640, 481)));

        let xdotool = "Window 62914567\n  Position: 1920,27 (screen: 0)\n  Geometry: 1280x1013\n";
        assert_eq!(parse_position_geometry(xdotool), Some(Rect::new(1920, 27, 1280, 1013)));
    }

    #[test]
    fn test_parse_position_geometry_missing_size() {
        assert_eq!(parse_position_geometry("Position: 1,2"), None);
    }
}
