use crate::error::{AppError, Result};
use crate::events::{Rect, WindowInfo};
use crate::utils::command::run_tool;
use serde_json::Value;

pub struct SwayTracker;

impl SwayTracker {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        run_tool("swaymsg", &["-t", "get_version"]).await.map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        let stdout = run_tool("swaymsg", &["-t", "get_tree"]).await?;
        let tree: Value = serde_json::from_slice(&stdout)?;
        focused_window(&tree)
    }
}

/// Поиск узла с `"focused": true` в дереве sway
pub fn focused_window(tree: &Value) -> Result<WindowInfo> {
    let node = find_focused(tree)
        .ok_or_else(|| AppError::Internal("Активное окно в Sway не найдено".to_string()))?;

    // Фокус на пустом рабочем столе или выходе
    match node.get("type").and_then(Value::as_str) {
        Some("con") | Some("floating_con") => {}
        _ => return Err(AppError::NoWindowFocused),
    }

    let title = node
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let class = node
        .get("app_id")
        .and_then(Value::as_str)
        .or_else(|| {
            node.pointer("/window_properties/class")
                .and_then(Value::as_str)
        })
        .unwrap_or("Unknown")
        .to_string();

    let mut window = WindowInfo::new(title).with_class(class);
    if let Some(rect) = node.get("rect").and_then(parse_rect) {
        window = window.with_geometry(rect);
    }
    Ok(window)
}

fn find_focused(node: &Value) -> Option<&Value> {
    if node.get("focused").and_then(Value::as_bool) == Some(true) {
        return Some(node);
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(find_focused)
}

/// `{"x": .., "y": .., "width": .., "height": ..}` из ответов swaymsg
pub fn parse_rect(value: &Value) -> Option<Rect> {
    Some(Rect::new(
        value.get("x")?.as_i64()? as i32,
        value.get("y")?.as_i64()? as i32,
        value.get("width")?.as_u64()? as u32,
        value.get("height")?.as_u64()? as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_focused_window_in_tree() {
        let tree = json!({
            "type": "root", "focused": false,
            "nodes": [{
                "type": "output", "focused": false,
                "nodes": [{
                    "type": "workspace", "focused": false,
                    "nodes": [
                        {"type": "con", "focused": false, "name": "Firefox", "app_id": "firefox",
                         "rect": {"x": 0, "y": 0, "width": 960, "height": 1080}},
                        {"type": "con", "focused": true, "name": "\u{2733} session", "app_id": "foot",
                         "rect": {"x": 960, "y": 0, "width": 960, "height": 1080}}
                    ]
                }]
            }]
        });

        let window = focused_window(&tree).unwrap();
        assert_eq!(window.title, "\u{2733} session");
        assert_eq!(window.class, "foot");
        assert_eq!(window.geometry, Some(Rect::new(960, 0, 960, 1080)));
    }

    #[test]
    fn test_focused_floating_xwayland_window() {
        let tree = json!({
            "type": "workspace", "focused": false, "nodes": [],
            "floating_nodes": [
                {"type": "floating_con", "focused": true, "name": "xterm",
                 "window_properties": {"class": "XTerm"},
                 "rect": {"x": 10, "y": 20, "width": 300, "height": 200}}
            ]
        });

        let window = focused_window(&tree).unwrap();
        assert_eq!(window.class, "XTerm");
        assert_eq!(window.geometry, Some(Rect::new(10, 20, 300, 200)));
    }

    #[test]
    fn test_focused_empty_workspace() {
        let tree = json!({"type": "workspace", "focused": true, "nodes": []});
        assert!(matches!(focused_window(&tree), Err(AppError::NoWindowFocused)));
    }
}
