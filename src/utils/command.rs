use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Предел времени для любого внешнего вызова в цикле сканирования
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(1);

static ENV_OVERRIDES: OnceLock<HashMap<String, String>> = OnceLock::new();

/// Переменные сессии пользователя, если программа запущена через sudo
fn session_env_overrides() -> &'static HashMap<String, String> {
    ENV_OVERRIDES.get_or_init(|| {
        let mut env_vars = HashMap::new();

        if std::env::var("USER").unwrap_or_default() == "root" {
            if let Ok(sudo_user) = std::env::var("SUDO_USER") {
                if let Ok(output) = std::process::Command::new("id").args(["-u", &sudo_user]).output() {
                    if let Ok(uid_str) = String::from_utf8(output.stdout) {
                        let uid = uid_str.trim();
                        let user_runtime_dir = format!("/run/user/{}", uid);
                        let dbus_address = format!("unix:path={}/bus", user_runtime_dir);

                        debug!("Подставляем переменные окружения для пользователя {}: uid={}", sudo_user, uid);
                        env_vars.insert("DBUS_SESSION_BUS_ADDRESS".to_string(), dbus_address);
                        env_vars.insert("XDG_RUNTIME_DIR".to_string(), user_runtime_dir);
                        env_vars.insert("USER".to_string(), sudo_user);
                    }
                }
            }
        }

        env_vars
    })
}

/// Команда внешней утилиты: без stdin, убивается при отмене по таймауту
pub fn tool_command(program: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    for (key, value) in session_env_overrides() {
        cmd.env(key, value);
    }

    cmd
}

/// Запускает утилиту и возвращает stdout; любой сбой превращается в ошибку
pub async fn run_tool(program: &str, args: &[&str]) -> Result<Vec<u8>> {
    run_command(program, tool_command(program, args)).await
}

pub async fn run_command(program: &str, cmd: Command) -> Result<Vec<u8>> {
    run_command_with_timeout(program, cmd, TOOL_TIMEOUT).await
}

pub async fn run_command_with_timeout(
    program: &str,
    mut cmd: Command,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| AppError::Timeout(format!("{} не ответил за {:?}", program, timeout)))?
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::ServiceUnavailable(format!("{} не найден", program))
            }
            _ => AppError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Internal(format!(
            "{} вернул ошибку ({}): {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Вывод утилиты как строка без пробелов по краям
pub async fn run_tool_text(program: &str, args: &[&str]) -> Result<String> {
    let stdout = run_tool(program, args).await?;
    Ok(String::from_utf8_lossy(&stdout).trim().to_string())
}

/// Есть ли исполняемый файл в PATH
pub fn is_available(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(program);
                candidate.is_file()
            })
        })
        .unwrap_or(false)
}
