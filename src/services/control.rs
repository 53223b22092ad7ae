use crate::app_error;
use crate::error::Result;
use crate::events::{Command, Rect};
use crate::services::Status;
use crate::utils::command::{run_command_with_timeout, tool_command};
use std::time::Duration;
use std::io::BufRead;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Минимальная сторона пользовательской области
pub const MIN_REGION_SIDE: u32 = 10;

/// Пользователь выделяет область мышью, поэтому ждём долго
const SELECT_TIMEOUT: Duration = Duration::from_secs(60);

const HELP: &str = "\
Команды:
  toggle            включить/выключить авто-подтверждение (также SIGUSR1)
  area X Y W H      задать область сканирования
  select            выделить область мышью (slop)
  reset             сканировать окно в фокусе
  status            показать состояние
  exit | quit       выйти";

/// Разобранная строка из терминала
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Command(Command),
    Select,
    Status,
    Help,
    Empty,
    Invalid(String),
}

pub fn parse_line(line: &str) -> ControlRequest {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return ControlRequest::Empty;
    };
    let args: Vec<&str> = parts.collect();

    match (word.to_lowercase().as_str(), args.as_slice()) {
        ("toggle" | "t", []) => ControlRequest::Command(Command::ToggleEnabled),
        ("reset", []) => ControlRequest::Command(Command::ResetToDefault),
        ("exit" | "quit" | "q", []) => ControlRequest::Command(Command::Exit),
        ("select", []) => ControlRequest::Select,
        ("status" | "s", []) => ControlRequest::Status,
        ("help" | "?", _) => ControlRequest::Help,
        ("area", [x, y, w, h]) => match parse_rect(x, y, w, h) {
            Some(rect) => match validate_region(rect) {
                Ok(rect) => ControlRequest::Command(Command::SetCustomRegion(rect)),
                Err(e) => ControlRequest::Invalid(e.to_string()),
            },
            None => ControlRequest::Invalid(format!("некорректные числа: {}", args.join(" "))),
        },
        ("area", _) => ControlRequest::Invalid("использование: area X Y W H".to_string()),
        _ => ControlRequest::Invalid(format!("неизвестная команда '{}', см. help", line.trim())),
    }
}

fn parse_rect(x: &str, y: &str, w: &str, h: &str) -> Option<Rect> {
    Some(Rect::new(x.parse().ok()?, y.parse().ok()?, w.parse().ok()?, h.parse().ok()?))
}

/// Область не меньше MIN_REGION_SIDE по обеим сторонам
pub fn validate_region(rect: Rect) -> Result<Rect> {
    if rect.width < MIN_REGION_SIDE || rect.height < MIN_REGION_SIDE {
        return Err(app_error!(
            internal,
            "область {} меньше {}x{}",
            rect,
            MIN_REGION_SIDE,
            MIN_REGION_SIDE
        ));
    }
    Ok(rect)
}

/// Вывод `slop -f "%x %y %w %h"`
pub fn parse_slop_geometry(text: &str) -> Option<Rect> {
    let values: Vec<&str> = text.split_whitespace().collect();
    match values.as_slice() {
        [x, y, w, h] => parse_rect(x, y, w, h),
        _ => None,
    }
}

/// Интерактивный выбор области мышью
pub async fn select_region() -> Result<Rect> {
    let cmd = tool_command("slop", &["-f", "%x %y %w %h"]);
    let stdout = run_command_with_timeout("slop", cmd, SELECT_TIMEOUT).await?;
    let text = String::from_utf8_lossy(&stdout);
    let rect = parse_slop_geometry(&text)
        .ok_or_else(|| app_error!(internal, "неожиданный вывод slop: {}", text.trim()))?;
    validate_region(rect)
}

/// Чтение stdin в отдельном потоке: заблокированное чтение не держит runtime при выходе.
/// Создаётся один раз: строки получают сначала первичная настройка, затем панель управления.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    let spawned = std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Ошибка чтения stdin: {}", e);
                        break;
                    }
                }
            }
        });

    if let Err(e) = spawned {
        warn!("Не удалось запустить чтение stdin: {}", e);
    }

    rx
}

async fn read_line(lines: Option<&mut mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match lines {
        Some(lines) => lines.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_signal(signal: Option<&mut Signal>) -> Option<()> {
    match signal {
        Some(signal) => signal.recv().await,
        None => std::future::pending().await,
    }
}

/// Терминал и сигналы вместо меню в трее. Никогда не ждёт цикл сканирования.
pub struct ControlSurface {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<Status>,
    stdin: Option<mpsc::UnboundedReceiver<String>>,
}

impl ControlSurface {
    pub fn new(
        commands: mpsc::UnboundedSender<Command>,
        status: watch::Receiver<Status>,
        stdin: Option<mpsc::UnboundedReceiver<String>>,
    ) -> Self {
        Self {
            commands,
            status,
            stdin,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut stdin = self.stdin.take();

        let mut toggle_signal = match signal(SignalKind::user_defined1()) {
            Ok(signal) => Some(signal),
            Err(e) => {
                warn!("SIGUSR1 недоступен: {}", e);
                None
            }
        };

        if stdin.is_some() {
            info!("Управление: введите 'help' для списка команд, SIGUSR1 переключает режим");
        }
        self.log_status();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                changed = self.status.changed() => {
                    if changed.is_err() {
                        debug!("Сканер завершился, панель управления остановлена");
                        break;
                    }
                    self.log_status();
                }
                Some(()) = recv_signal(toggle_signal.as_mut()) => {
                    info!("Получен SIGUSR1");
                    self.submit(Command::ToggleEnabled);
                }
                line = read_line(stdin.as_mut()) => match line {
                    Some(line) => self.handle_line(&line).await,
                    None => {
                        debug!("stdin закрыт, команды из терминала больше не читаются");
                        stdin = None;
                    }
                },
            }
        }
    }

    async fn handle_line(&self, line: &str) {
        match parse_line(line) {
            ControlRequest::Command(command) => self.submit(command),
            ControlRequest::Select => {
                info!("Выделите область мышью...");
                match select_region().await {
                    Ok(rect) => self.submit(Command::SetCustomRegion(rect)),
                    Err(e) => warn!("Область не выбрана: {}", e),
                }
            }
            ControlRequest::Status => {
                let status = *self.status.borrow();
                println!(
                    "Состояние: {} ({}), область: {}",
                    status.state,
                    status.state.indicator_color(),
                    status.region
                );
            }
            ControlRequest::Help => println!("{}", HELP),
            ControlRequest::Empty => {}
            ControlRequest::Invalid(message) => warn!("{}", message),
        }
    }

    fn submit(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Сканер уже остановлен, команда {} отброшена", command);
        }
    }

    fn log_status(&self) {
        let status = *self.status.borrow();
        info!(
            "Индикатор: {} [{}], область: {}",
            status.state,
            status.state.indicator_color(),
            status.region
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanRegion;
    use crate::services::AppState;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_line("toggle"), ControlRequest::Command(Command::ToggleEnabled));
        assert_eq!(parse_line("  RESET "), ControlRequest::Command(Command::ResetToDefault));
        assert_eq!(parse_line("quit"), ControlRequest::Command(Command::Exit));
        assert_eq!(parse_line("exit"), ControlRequest::Command(Command::Exit));
        assert_eq!(parse_line("select"), ControlRequest::Select);
        assert_eq!(parse_line("status"), ControlRequest::Status);
        assert_eq!(parse_line("help"), ControlRequest::Help);
        assert_eq!(parse_line("   "), ControlRequest::Empty);
    }

    #[test]
    fn test_parse_area() {
        assert_eq!(
            parse_line("area -100 50 640 200"),
            ControlRequest::Command(Command::SetCustomRegion(Rect::new(-100, 50, 640, 200)))
        );
        assert!(matches!(parse_line("area 0 0 9 100"), ControlRequest::Invalid(_)));
        assert!(matches!(parse_line("area 0 0 -5 100"), ControlRequest::Invalid(_)));
        assert!(matches!(parse_line("area 1 2 3"), ControlRequest::Invalid(_)));
        assert!(matches!(parse_line("dance"), ControlRequest::Invalid(_)));
    }

    #[test]
    fn test_parse_slop_geometry() {
        assert_eq!(parse_slop_geometry("12 34 560 78\n"), Some(Rect::new(12, 34, 560, 78)));
        assert_eq!(parse_slop_geometry(""), None);
        assert_eq!(parse_slop_geometry("12 34 x 78"), None);
    }

    #[test]
    fn test_validate_region_minimum() {
        assert!(validate_region(Rect::new(0, 0, 10, 10)).is_ok());
        assert!(validate_region(Rect::new(0, 0, 10, 9)).is_err());
    }

    #[tokio::test]
    async fn test_control_surface_stops_on_shutdown() {
        let (commands, mut command_rx) = mpsc::unbounded_channel();
        let (_status_tx, status_rx) = watch::channel(Status {
            state: AppState::Paused,
            region: ScanRegion::focused(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let surface = ControlSurface::new(commands, status_rx, None);
        surface.handle_line("area 10 20 300 100").await;
        assert_eq!(
            command_rx.try_recv().unwrap(),
            Command::SetCustomRegion(Rect::new(10, 20, 300, 100))
        );

        let handle = tokio::spawn(surface.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_control_surface_reads_lines_from_shared_stdin() {
        let (commands, mut command_rx) = mpsc::unbounded_channel();
        let (_status_tx, status_rx) = watch::channel(Status {
            state: AppState::Active,
            region: ScanRegion::focused(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(ControlSurface::new(commands, status_rx, Some(lines_rx)).run(shutdown_rx));
        lines_tx.send("toggle".to_string()).unwrap();
        lines_tx.send("reset".to_string()).unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), command_rx.recv()).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), command_rx.recv()).await.unwrap();
        assert_eq!(first, Some(Command::ToggleEnabled));
        assert_eq!(second, Some(Command::ResetToDefault));

        // Закрытый stdin не останавливает панель
        drop(lines_tx);
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
