use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod paths;
mod services;
mod utils;

use config::ConfigStore;
use error::AppError;
use services::control::spawn_stdin_reader;
use services::reference_setup::run_setup;
use services::{
    create_window_tracker,
    ControlSurface,
    KeyActionDispatcher,
    Scheduler,
    ScreenCapture,
    SoundPlayer,
    TemplateSet,
    VirtualDevice,
};

#[derive(Parser, Debug)]
#[command(name = "drinking-bird")]
#[command(about = "Автоматически подтверждает запросы интерактивного CLI, находя кнопку подтверждения на экране")]
struct Args {
    /// Путь к файлу конфигурации (по умолчанию ~/.config/drinking-bird/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Каталог эталонных изображений кнопки
    #[arg(short, long)]
    images: Option<PathBuf>,

    /// Режим сухого запуска (нажатия только логируются)
    #[arg(long)]
    dry_run: bool,

    /// Стартовать в выключенном состоянии
    #[arg(long)]
    disabled: bool,

    /// Уровень логирования
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Не читать команды из stdin
    #[arg(long)]
    no_stdin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Инициализация системы логирования
    init_tracing(&args.log_level)?;

    info!("Запуск drinking-bird v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = paths::ensure_directories() {
        warn!("Не удалось создать каталоги приложения: {}", e);
    }

    // Загрузка конфигурации
    let config_path = args.config.clone().unwrap_or_else(paths::config_file);
    let config_store = ConfigStore::new(&config_path);
    let file_config = config_store.load();
    info!("Конфигурация загружена из: {}", config_path.display());

    // Переменные окружения действуют только на этот запуск
    let mut config = file_config.clone().with_env_overrides().unwrap_or_else(|e| {
        warn!("Переменные окружения DRINKING_BIRD_* проигнорированы: {}", e);
        file_config
    });

    if args.disabled {
        config.enabled = false;
    }

    let mut stdin = (!args.no_stdin).then(spawn_stdin_reader);

    // Без эталонов работать нечего: предлагаем первичную настройку
    let images_dir = args.images.clone().unwrap_or_else(paths::reference_images_dir);
    let templates = match (TemplateSet::load_dir(&images_dir), stdin.as_mut()) {
        (Ok(templates), _) => templates,
        (Err(AppError::TemplateLoad(reason)), Some(lines)) => {
            warn!("Эталоны не загружены: {}", reason);
            match run_setup(&images_dir, lines).await {
                Some(templates) => templates,
                None => bail!("Настройка отменена, эталонов в {} нет", images_dir.display()),
            }
        }
        (Err(e), _) => {
            return Err(e).with_context(|| {
                format!(
                    "Поместите снимки кнопки подтверждения (PNG) в {}",
                    images_dir.display()
                )
            })
        }
    };

    if args.dry_run {
        warn!("Режим сухого запуска - нажатия клавиш отключены");
    } else {
        // Проверка прав доступа
        utils::permissions::check_permissions()?;
    }

    let virtual_device = VirtualDevice::new("drinking-bird virtual keyboard", args.dry_run)?;
    let dispatcher = KeyActionDispatcher::new(virtual_device, SoundPlayer::new(config.play_sound));
    let capture = ScreenCapture::new();
    let tracker = create_window_tracker();

    let scheduler = Scheduler::new(
        config,
        config_store,
        templates,
        tracker,
        Box::new(capture),
        Box::new(dispatcher),
    );
    let control = ControlSurface::new(scheduler.command_sender(), scheduler.subscribe(), stdin);

    info!("Все компоненты инициализированы");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx.clone()));
    let control_handle = tokio::spawn(control.run(shutdown_rx));

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения или выхода по команде
    let scheduler_finished = tokio::select! {
        _ = shutdown_signal() => false,
        result = &mut scheduler_handle => {
            if let Err(e) = result {
                error!("Сканер завершился с ошибкой: {}", e);
            }
            true
        }
    };

    info!("Завершение работы...");
    let _ = shutdown_tx.send(true);

    // Текущий тик доводится до конца, виртуальное устройство закрывается в Drop
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        if !scheduler_finished {
            let _ = scheduler_handle.await;
        }
        let _ = control_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("drinking-bird завершил работу");
    Ok(())
}

async fn shutdown_signal() {
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM недоступен: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
        },
        _ = terminate => info!("Получен сигнал завершения (SIGTERM)"),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
