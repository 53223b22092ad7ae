use crate::events::WindowInfo;

/// Источник информации об окне в фокусе
#[async_trait::async_trait]
pub trait WindowTracker: Send + Sync {
    /// Окно в фокусе или `None`, если фокуса нет или запрос не удался.
    /// Каждый внешний вызов ограничен по времени.
    async fn focused_window(&self) -> Option<WindowInfo>;
}

/// Factory function to create the window tracker for the current session
pub fn create_window_tracker() -> Box<dyn WindowTracker> {
    Box::new(super::window_tracker::RealWindowTracker::new())
}
