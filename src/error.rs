use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ошибка захвата экрана: {0}")]
    Capture(String),

    #[error("Нет окна в фокусе")]
    NoWindowFocused,

    #[error("Не удалось загрузить эталонные изображения: {0}")]
    TemplateLoad(String),

    #[error("Ошибка разбора конфигурации: {0}")]
    ConfigParse(String),

    #[error("ОС отклонила синтетическое нажатие клавиши: {0}")]
    InputInjection(String),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка uinput: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("Ошибка изображения: {0}")]
    Image(#[from] image::ImageError),

    #[error("Ошибка JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Превышено время ожидания: {0}")]
    Timeout(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! app_error {
    (capture, $($arg:tt)*) => {
        $crate::error::AppError::Capture(format!($($arg)*))
    };
    (template_load, $($arg:tt)*) => {
        $crate::error::AppError::TemplateLoad(format!($($arg)*))
    };
    (permission, $($arg:tt)*) => {
        $crate::error::AppError::Permission(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::AppError::ServiceUnavailable(format!($($arg)*))
    };
    (timeout, $($arg:tt)*) => {
        $crate::error::AppError::Timeout(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::AppError::Internal(format!($($arg)*))
    };
}
