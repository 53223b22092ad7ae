use crate::app_error;
use crate::error::{AppError, Result};
use crate::events::Rect;
use image::DynamicImage;

/// Снимок области экрана
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub image: DynamicImage,
    /// Фактически снятая область после обрезки по границам экрана
    pub region: Rect,
}

/// Источник снимков экрана
#[async_trait::async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Текущие границы экрана (объединение всех мониторов)
    async fn screen_bounds(&self) -> Result<Rect>;

    /// Снять уже обрезанную, непустую область
    async fn grab(&self, rect: Rect) -> Result<DynamicImage>;

    /// Обрезать область по экрану и снять её. Без повторных попыток.
    async fn capture(&self, rect: Rect) -> Result<Snapshot> {
        let screen = self
            .screen_bounds()
            .await
            .map_err(|e| app_error!(capture, "не удалось определить границы экрана: {}", e))?;

        let region = rect
            .intersect(&screen)
            .ok_or_else(|| app_error!(capture, "область {} вне экрана {}", rect, screen))?;

        let image = self.grab(region).await.map_err(|e| match e {
            AppError::Capture(_) => e,
            other => app_error!(capture, "{}", other),
        })?;

        Ok(Snapshot { image, region })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    struct FakeScreen;

    #[async_trait::async_trait]
    impl CaptureProvider for FakeScreen {
        async fn screen_bounds(&self) -> Result<Rect> {
            Ok(Rect::new(0, 0, 100, 50))
        }

        async fn grab(&self, rect: Rect) -> Result<DynamicImage> {
            Ok(DynamicImage::ImageLuma8(GrayImage::new(rect.width, rect.height)))
        }
    }

    #[tokio::test]
    async fn test_capture_clips_to_screen() {
        let snapshot = FakeScreen.capture(Rect::new(80, -10, 50, 30)).await.unwrap();
        assert_eq!(snapshot.region, Rect::new(80, 0, 20, 20));
        assert_eq!(snapshot.image.width(), 20);
        assert_eq!(snapshot.image.height(), 20);
    }

    #[tokio::test]
    async fn test_capture_outside_screen_fails() {
        let err = FakeScreen.capture(Rect::new(200, 0, 10, 10)).await.unwrap_err();
        assert!(matches!(err, AppError::Capture(_)));
    }
}
