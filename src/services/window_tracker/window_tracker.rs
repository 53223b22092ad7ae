use crate::trace_if_enabled;
use crate::error::{AppError, Result};
use crate::events::WindowInfo;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::kdotool::KdotoolTracker;
use super::r#trait::WindowTracker;
use super::sway::SwayTracker;
use super::wmctrl::WmctrlTracker;
use super::xdotool::XdotoolTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DesktopEnvironment {
    KDE,
    X11Generic,
    WaylandGeneric,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkingMethod {
    Kdotool,
    Xdotool,
    Wmctrl,
    Sway,
}

pub struct RealWindowTracker {
    desktop_env: DesktopEnvironment,
    working_method: RwLock<Option<WorkingMethod>>,
    // Чтобы не засорять лог на каждом тике, пока ни один метод не работает
    detection_warned: AtomicBool,

    // Детекторы утилит
    kdotool: KdotoolTracker,
    xdotool: XdotoolTracker,
    wmctrl: WmctrlTracker,
    sway: SwayTracker,
}

impl RealWindowTracker {
    pub fn new() -> Self {
        info!("Инициализация RealWindowTracker");

        let desktop_env = Self::detect_desktop_environment();
        info!("Обнаружена среда рабочего стола: {:?}", desktop_env);

        Self {
            desktop_env,
            working_method: RwLock::new(None),
            detection_warned: AtomicBool::new(false),
            kdotool: KdotoolTracker::new(),
            xdotool: XdotoolTracker::new(),
            wmctrl: WmctrlTracker::new(),
            sway: SwayTracker::new(),
        }
    }

    fn detect_desktop_environment() -> DesktopEnvironment {
        if let Ok(desktop) = std::env::var("XDG_CURRENT_DESKTOP") {
            if desktop.to_lowercase().contains("kde") {
                return DesktopEnvironment::KDE;
            }
        }

        if let Ok(session) = std::env::var("XDG_SESSION_TYPE") {
            match session.as_str() {
                "wayland" => return DesktopEnvironment::WaylandGeneric,
                "x11" => return DesktopEnvironment::X11Generic,
                _ => {}
            }
        }

        if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            return DesktopEnvironment::WaylandGeneric;
        }
        if std::env::var_os("DISPLAY").is_some() {
            return DesktopEnvironment::X11Generic;
        }

        DesktopEnvironment::Unknown
    }

    /// Порядок проверки методов зависит от среды
    fn candidate_methods(&self) -> &'static [WorkingMethod] {
        match self.desktop_env {
            DesktopEnvironment::KDE => &[
                WorkingMethod::Kdotool,
                WorkingMethod::Xdotool,
                WorkingMethod::Wmctrl,
            ],
            DesktopEnvironment::WaylandGeneric => &[
                WorkingMethod::Sway,
                WorkingMethod::Kdotool,
                WorkingMethod::Xdotool,
            ],
            DesktopEnvironment::X11Generic | DesktopEnvironment::Unknown => &[
                WorkingMethod::Xdotool,
                WorkingMethod::Wmctrl,
                WorkingMethod::Kdotool,
                WorkingMethod::Sway,
            ],
        }
    }

    async fn detect_working_method(&self) -> Result<WorkingMethod> {
        debug!("Определяем рабочий метод детекции окон...");

        for method in self.candidate_methods() {
            let result = match method {
                WorkingMethod::Kdotool => self.kdotool.test().await,
                WorkingMethod::Xdotool => self.xdotool.test().await,
                WorkingMethod::Wmctrl => self.wmctrl.test().await,
                WorkingMethod::Sway => self.sway.test().await,
            };

            match result {
                Ok(()) => {
                    info!("Используем {:?}", method);
                    return Ok(*method);
                }
                Err(e) => debug!("{:?} не подходит: {}", method, e),
            }
        }

        Err(AppError::ServiceUnavailable(
            "Ни один метод детекции окон не работает".to_string(),
        ))
    }

    async fn get_window_by_method(&self, method: WorkingMethod) -> Result<WindowInfo> {
        match method {
            WorkingMethod::Kdotool => self.kdotool.get_active_window().await,
            WorkingMethod::Xdotool => self.xdotool.get_active_window().await,
            WorkingMethod::Wmctrl => self.wmctrl.get_active_window().await,
            WorkingMethod::Sway => self.sway.get_active_window().await,
        }
    }

    async fn current_method(&self) -> Option<WorkingMethod> {
        let cached = *self.working_method.read();
        if cached.is_some() {
            return cached;
        }

        match self.detect_working_method().await {
            Ok(method) => {
                *self.working_method.write() = Some(method);
                self.detection_warned.store(false, Ordering::Relaxed);
                Some(method)
            }
            Err(e) => {
                if !self.detection_warned.swap(true, Ordering::Relaxed) {
                    warn!("{}. Установите xdotool, wmctrl, kdotool или swaymsg", e);
                }
                None
            }
        }
    }
}

impl Drop for RealWindowTracker {
    fn drop(&mut self) {
        info!("RealWindowTracker завершает работу");
    }
}

#[async_trait::async_trait]
impl WindowTracker for RealWindowTracker {
    async fn focused_window(&self) -> Option<WindowInfo> {
        let method = self.current_method().await?;

        match self.get_window_by_method(method).await {
            Ok(window) => {
                trace_if_enabled!("Окно в фокусе: {}", window);
                Some(window)
            }
            Err(AppError::NoWindowFocused) => {
                trace_if_enabled!("Нет окна в фокусе");
                None
            }
            Err(e) => {
                warn!("Рабочий метод {:?} перестал работать: {}. Переопределяем...", method, e);
                *self.working_method.write() = None;
                None
            }
        }
    }
}
