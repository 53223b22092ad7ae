use std::path::PathBuf;

const APP_DIR_NAME: &str = "drinking-bird";

/// Каталог настроек: `~/.config/drinking-bird/`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Файл конфигурации: `~/.config/drinking-bird/config.json`
pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

/// Эталонные изображения кнопки: `~/.config/drinking-bird/reference_images/`
pub fn reference_images_dir() -> PathBuf {
    config_dir().join("reference_images")
}

/// Создаёт каталоги приложения. Вызывается при старте.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(reference_images_dir())
}
