use crate::error::{AppError, Result};
use crate::utils::command::is_available;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{info, warn};

const UINPUT_DEVICE: &str = "/dev/uinput";

/// Утилиты захвата экрана: нужна хотя бы одна
const CAPTURE_TOOLS: &[&str] = &["grim", "maim", "import"];

/// Утилиты определения окна в фокусе: нужна хотя бы одна
const WINDOW_TOOLS: &[&str] = &["xdotool", "kdotool", "wmctrl", "swaymsg"];

/// Проверить доступ к /dev/uinput и наличие внешних утилит
pub fn check_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    check_uinput_access(Path::new(UINPUT_DEVICE))?;
    check_tools();
    check_not_root();

    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_uinput_access(device: &Path) -> Result<()> {
    if !device.exists() {
        return Err(AppError::Permission(format!(
            "{} не существует, загрузите модуль: sudo modprobe uinput",
            device.display()
        )));
    }

    // Виртуальная клавиатура открывает устройство на запись
    match OpenOptions::new().write(true).open(device) {
        Ok(_) => {
            info!("Доступ к {} подтвержден", device.display());
            Ok(())
        }
        Err(e) => Err(AppError::Permission(format!(
            "Нет доступа на запись к {}: {}. Добавьте пользователя в группу 'input'",
            device.display(),
            e
        ))),
    }
}

fn first_available<'a>(tools: &[&'a str], available: impl Fn(&str) -> bool) -> Option<&'a str> {
    tools.iter().copied().find(|tool| available(tool))
}

fn check_tools() {
    match first_available(CAPTURE_TOOLS, is_available) {
        Some(tool) => info!("Захват экрана: {}", tool),
        None => warn!("Не найдена утилита захвата экрана ({})", CAPTURE_TOOLS.join(", ")),
    }

    match first_available(WINDOW_TOOLS, is_available) {
        Some(tool) => info!("Определение окна: {}", tool),
        None => warn!("Не найдена утилита определения окна ({})", WINDOW_TOOLS.join(", ")),
    }

    if !is_available("slop") {
        info!("slop не найден, команда 'select' недоступна");
    }
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("⚠️  Приложение запущено от имени root!");
            warn!("   Окна и экран принадлежат сессии пользователя, запускайте без sudo:");
            for command in get_setup_commands() {
                if !command.is_empty() {
                    warn!("   {}", command);
                }
            }
        }
        Ok(user) => {
            info!("Приложение запущено от имени пользователя: {}", user);
        }
        Err(_) => {
            warn!("Не удалось определить пользователя");
        }
    }
}

/// Рекомендуемые команды для настройки окружения
pub fn get_setup_commands() -> Vec<String> {
    vec![
        "# Доступ к /dev/uinput без root:".to_string(),
        "sudo usermod -a -G input $USER".to_string(),
        "sudo modprobe uinput".to_string(),
        "echo 'uinput' | sudo tee /etc/modules-load.d/uinput.conf".to_string(),
        "".to_string(),
        "# Утилиты (X11):".to_string(),
        "sudo apt install xdotool maim slop".to_string(),
        "# Утилиты (Wayland/sway):".to_string(),
        "sudo apt install grim".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_commands() {
        let commands = get_setup_commands();
        assert!(commands.iter().any(|cmd| cmd.contains("usermod")));
        assert!(commands.iter().any(|cmd| cmd.contains("modprobe")));
        assert!(commands.iter().any(|cmd| cmd.contains("xdotool")));
    }

    #[test]
    fn test_missing_uinput_is_permission_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = check_uinput_access(&dir.path().join("uinput")).unwrap_err();
        assert!(matches!(err, AppError::Permission(_)));
    }

    #[test]
    fn test_first_available_keeps_preference_order() {
        let found = first_available(CAPTURE_TOOLS, |tool| tool != "grim");
        assert_eq!(found, Some("maim"));
        assert_eq!(first_available(CAPTURE_TOOLS, |_| false), None);
    }
}
