use crate::error::{AppError, Result};
use crate::events::{Rect, WindowInfo};
use crate::utils::command::{run_tool, run_tool_text};
use tracing::debug;

pub struct XdotoolTracker;

impl XdotoolTracker {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        // getdisplaygeometry требует соединения с X-сервером, но не окна в фокусе
        run_tool("xdotool", &["getdisplaygeometry"]).await.map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        debug!("Попытка получить активное окно через xdotool");

        // Ненулевой код возврата getactivewindow означает, что фокуса нет
        let window_id = run_tool_text("xdotool", &["getactivewindow"])
            .await
            .map_err(|e| match e {
                AppError::Internal(msg) => {
                    debug!("xdotool getactivewindow: {}", msg);
                    AppError::NoWindowFocused
                }
                other => other,
            })?;
        if window_id.is_empty() {
            return Err(AppError::NoWindowFocused);
        }

        let title = run_tool_text("xdotool", &["getwindowname", &window_id]).await?;
        debug!("xdotool получил заголовок окна: '{}'", title);

        let geometry_text =
            run_tool_text("xdotool", &["getwindowgeometry", "--shell", &window_id]).await?;
        let geometry = parse_shell_geometry(&geometry_text);

        let class = match run_tool_text("xdotool", &["getwindowclassname", &window_id]).await {
            Ok(class_name) => class_name,
            Err(e) => {
                debug!("Не удалось получить класс окна: {}", e);
                "Unknown".to_string()
            }
        };

        let mut window = WindowInfo::new(title).with_class(class);
        if let Some(geometry) = geometry {
            window = window.with_geometry(geometry);
        }
        Ok(window)
    }
}

/// Разбор вывода `xdotool getwindowgeometry --shell`
pub fn parse_shell_geometry(text: &str) -> Option<Rect> {
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "X" => x = value.parse::<i32>().ok(),
            "Y" => y = value.parse::<i32>().ok(),
            "WIDTH" => width = value.parse::<u32>().ok(),
            "HEIGHT" => height = value.parse::<u32>().ok(),
            _ => {}
        }
    }

    Some(Rect::new(x?, y?, width?, height?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shell_geometry() {
        let text = "WINDOW=62914567\nX=1920\nY=27\nWIDTH=1280\nHEIGHT=1013\nSCREEN=0\n";
        assert_eq!(parse_shell_geometry(text), Some(Rect::new(1920, 27, 1280, 1013)));
    }

    #[test]
    fn test_parse_shell_geometry_incomplete() {
        assert_eq!(parse_shell_geometry("X=1\nY=2\nWIDTH=3\n"), None);
        assert_eq!(parse_shell_geometry(""), None);
    }
}
