use crate::app_error;
use crate::error::Result;
use crate::services::matcher::has_image_extension;
use crate::services::TemplateSet;
use crate::utils::command::tool_command;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const MENU: &str = "\
Варианты:
  1 [ПУТЬ]   скопировать эталонное изображение (add ПУТЬ)
  2          открыть каталог эталонов (open)
  3          продолжить после добавления файлов (check)
  4          выйти (exit)";

/// Выбор пользователя на экране первичной настройки
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupRequest {
    /// Путь может прийти следующей строкой
    Add(Option<String>),
    Open,
    Check,
    Exit,
    Help,
    Empty,
    Invalid(String),
}

pub fn parse_setup_line(line: &str) -> SetupRequest {
    let trimmed = line.trim();
    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (trimmed, ""),
    };

    match word.to_lowercase().as_str() {
        "" => SetupRequest::Empty,
        "1" | "add" if rest.is_empty() => SetupRequest::Add(None),
        "1" | "add" => SetupRequest::Add(Some(rest.to_string())),
        "2" | "open" => SetupRequest::Open,
        "3" | "check" | "continue" => SetupRequest::Check,
        "4" | "exit" | "quit" | "q" => SetupRequest::Exit,
        "help" | "?" => SetupRequest::Help,
        _ => SetupRequest::Invalid(format!("неизвестный вариант '{}'", trimmed)),
    }
}

/// `~/` раскрывается в домашний каталог
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None if path == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Свободное имя в каталоге: существующие файлы не перезаписываются
fn free_destination(dir: &Path, file_name: &Path) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file_name
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{}-{}.{}", stem, n, ext)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Копирует изображение в каталог эталонов и возвращает новый путь
pub fn import_reference_image(source: &str, dir: &Path) -> Result<PathBuf> {
    let source = expand_home(source.trim());
    if !source.is_file() {
        return Err(app_error!(template_load, "файл не найден: {}", source.display()));
    }
    if !has_image_extension(&source) {
        return Err(app_error!(
            template_load,
            "{} не PNG/JPEG/BMP",
            source.display()
        ));
    }
    image::open(&source)?;

    let file_name = source
        .file_name()
        .ok_or_else(|| app_error!(template_load, "некорректный путь: {}", source.display()))?;

    std::fs::create_dir_all(dir)?;
    let destination = free_destination(dir, Path::new(file_name));
    std::fs::copy(&source, &destination)?;

    info!("Эталон {} скопирован в {}", source.display(), destination.display());
    Ok(destination)
}

/// Открыть каталог в файловом менеджере, не дожидаясь его закрытия
pub fn open_images_dir(dir: &Path) -> Result<()> {
    let dir_arg = dir.to_string_lossy();
    let mut cmd = tool_command("xdg-open", &[dir_arg.as_ref()]);
    cmd.stdout(Stdio::null()).stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => app_error!(service_unavailable, "xdg-open не найден"),
        _ => e.into(),
    })?;

    tokio::spawn(async move {
        let _ = child.wait().await;
    });
    Ok(())
}

/// Первичная настройка, когда в каталоге нет ни одного пригодного эталона.
/// `None`, если пользователь вышел или stdin закрыт.
pub async fn run_setup(dir: &Path, lines: &mut mpsc::UnboundedReceiver<String>) -> Option<TemplateSet> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!("Не удалось создать каталог эталонов {}: {}", dir.display(), e);
    }

    println!();
    println!("drinking-bird: первичная настройка");
    println!("Эталонные изображения не найдены. Поместите снимки кнопки подтверждения в:");
    println!("  {}", dir.display());
    println!("Можно добавить несколько снимков для разных вариантов кнопки.");
    println!("{}", MENU);

    let mut awaiting_path = false;
    loop {
        let Some(line) = lines.recv().await else {
            debug!("stdin закрыт во время настройки");
            return None;
        };

        let request = if awaiting_path {
            awaiting_path = false;
            match line.trim() {
                "" => SetupRequest::Empty,
                path => SetupRequest::Add(Some(path.to_string())),
            }
        } else {
            parse_setup_line(&line)
        };

        match request {
            SetupRequest::Add(None) => {
                println!("Путь к эталонному изображению:");
                awaiting_path = true;
            }
            SetupRequest::Add(Some(path)) => match import_reference_image(&path, dir) {
                Ok(destination) => println!("Скопировано в {}", destination.display()),
                Err(e) => println!("Не скопировано: {}", e),
            },
            SetupRequest::Open => match open_images_dir(dir) {
                Ok(()) => println!("Открыт каталог {}", dir.display()),
                Err(e) => println!("Не удалось открыть каталог: {}", e),
            },
            SetupRequest::Check => match TemplateSet::load_dir(dir) {
                Ok(templates) => {
                    println!("Найдено эталонов: {}", templates.len());
                    for template in templates.iter() {
                        println!("  - {}", template.name());
                    }
                    return Some(templates);
                }
                Err(e) => println!("Пока нет пригодных эталонов ({}). Добавьте хотя бы один.", e),
            },
            SetupRequest::Exit => return None,
            SetupRequest::Help => println!("{}", MENU),
            SetupRequest::Empty => {}
            SetupRequest::Invalid(message) => println!("{}\n{}", message, MENU),
        }
    }
}
