use crate::error::{AppError, Result};
use crate::events::{Rect, WindowInfo};
use crate::utils::command::run_tool_text;

/// EWMH-детектор: активное окно из xprop, заголовок и геометрия из `wmctrl -lG`
pub struct WmctrlTracker;

impl WmctrlTracker {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        run_tool_text("wmctrl", &["-m"]).await?;
        run_tool_text("xprop", &["-root", "_NET_ACTIVE_WINDOW"]).await?;
        Ok(())
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        let active = run_tool_text("xprop", &["-root", "_NET_ACTIVE_WINDOW"]).await?;
        let active_id = parse_active_window_id(&active).ok_or(AppError::NoWindowFocused)?;

        let listing = run_tool_text("wmctrl", &["-lG"]).await?;
        find_window(&listing, active_id)
            .ok_or_else(|| AppError::Internal("Активное окно не найдено в списке wmctrl".to_string()))
    }
}

/// `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00007`; нулевой id означает отсутствие фокуса
pub fn parse_active_window_id(text: &str) -> Option<u64> {
    let hex = text.rsplit('#').next()?.trim();
    let hex = hex.split(',').next()?.trim();
    let id = u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok()?;
    (id != 0).then_some(id)
}

/// Строка `wmctrl -lG`: `id desktop x y w h host title...`
pub fn find_window(listing: &str, window_id: u64) -> Option<WindowInfo> {
    for line in listing.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 7 {
            continue;
        }

        let id = u64::from_str_radix(parts[0].trim_start_matches("0x"), 16).ok();
        if id != Some(window_id) {
            continue;
        }

        let rect = Rect::new(
            parts[2].parse().ok()?,
            parts[3].parse().ok()?,
            parts[4].parse().ok()?,
            parts[5].parse().ok()?,
        );
        let title = parts[7..].join(" ");
        return Some(WindowInfo::new(title).with_geometry(rect));
    }

    None
}
