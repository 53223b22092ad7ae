use serde::{Deserialize, Serialize};
use std::fmt;

/// Информация об окне в фокусе
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub title: String,
    pub class: String,
    pub geometry: Option<Rect>,
}

impl WindowInfo {
    pub fn new(title: String) -> Self {
        Self {
            title,
            class: String::new(),
            geometry: None,
        }
    }

    pub fn with_class(mut self, class: String) -> Self {
        self.class = class;
        self
    }

    pub fn with_geometry(mut self, geometry: Rect) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Окно целевого приложения: заголовок начинается с маркера
    pub fn is_target(&self, prefix: &str) -> bool {
        is_target_window(&self.title, prefix)
    }
}

/// Предикат целевого окна. Пустой маркер не совпадает ни с чем,
/// иначе любое окно считалось бы целевым.
pub fn is_target_window(title: &str, prefix: &str) -> bool {
    !prefix.is_empty() && title.starts_with(prefix)
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            write!(f, "\"{}\"", self.title)
        } else {
            write!(f, "\"{}\" ({})", self.title, self.class)
        }
    }
}

/// Прямоугольник в координатах экрана
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Пересечение двух прямоугольников; `None`, если оно пустое
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = (self.x as i64).max(other.x as i64);
        let top = (self.y as i64).max(other.y as i64);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return None;
        }

        Some(Rect {
            x: left as i32,
            y: top as i32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }

    /// Наименьший прямоугольник, содержащий оба
    pub fn union(&self, other: &Rect) -> Rect {
        let left = (self.x as i64).min(other.x as i64);
        let top = (self.y as i64).min(other.y as i64);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect {
            x: left as i32,
            y: top as i32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        }
    }

    /// Доля прямоугольника, заданная в процентах от его размеров (0.0..=1.0)
    pub fn fraction(&self, left: f64, top: f64, right: f64, bottom: f64) -> Rect {
        let w = self.width as f64;
        let h = self.height as f64;
        let x0 = (w * left).round() as i64;
        let y0 = (h * top).round() as i64;
        let x1 = (w * right).round() as i64;
        let y1 = (h * bottom).round() as i64;
        Rect {
            x: self.x + x0 as i32,
            y: self.y + y0 as i32,
            width: (x1 - x0).max(0) as u32,
            height: (y1 - y0).max(0) as u32,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} at ({},{})", self.width, self.height, self.x, self.y)
    }
}
