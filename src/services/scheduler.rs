use crate::config::{Config, ConfigStore, ScanRegion};
use crate::debug_if_enabled;
use crate::app_error;
use crate::error::Result;
use crate::events::{Command, Rect, WindowInfo};
use crate::services::{
    ActionDispatcher, ActionOutcome, AppState, CaptureProvider, CooldownTimer, MatchResult,
    StateMachine, TemplateMatcher, TemplateSet, Transition, WindowTracker,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Область по умолчанию, если у окна в фокусе нет геометрии: доли экрана
const DEFAULT_SCAN_LEFT: f64 = 0.05;
const DEFAULT_SCAN_TOP: f64 = 0.5;
const DEFAULT_SCAN_RIGHT: f64 = 0.8;
const DEFAULT_SCAN_BOTTOM: f64 = 0.95;

/// Снимок состояния для панели управления
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub state: AppState,
    pub region: ScanRegion,
}

/// Что произошло за тик
#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    Disabled,
    /// Целевое окно не в фокусе
    Paused,
    CaptureFailed(String),
    /// Задача сопоставления завершилась аварийно
    MatchFailed(String),
    BelowThreshold(MatchResult),
    CoolingDown(MatchResult),
    Fired(MatchResult, ActionOutcome),
    Exit,
}

/// Периодический драйвер конвейера: один тик за раз, пропущенные тики не копятся
pub struct Scheduler {
    config: Config,
    config_store: ConfigStore,
    templates: Arc<TemplateSet>,
    matcher: TemplateMatcher,
    tracker: Box<dyn WindowTracker>,
    capture: Box<dyn CaptureProvider>,
    dispatcher: Box<dyn ActionDispatcher>,
    state: StateMachine,
    cooldown: CooldownTimer,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<Status>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        config_store: ConfigStore,
        templates: TemplateSet,
        tracker: Box<dyn WindowTracker>,
        capture: Box<dyn CaptureProvider>,
        dispatcher: Box<dyn ActionDispatcher>,
    ) -> Self {
        let state = StateMachine::new(config.enabled);
        let cooldown = CooldownTimer::new(config.cooldown());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(Status {
            state: state.state(),
            region: config.scan_region,
        });

        info!(
            "Планировщик: {} эталон(ов), интервал {}мс, порог {}, cooldown {}с, старт в {}",
            templates.len(),
            config.scan_interval_ms,
            config.confidence_threshold,
            config.cooldown_seconds,
            state.state()
        );

        Self {
            config,
            config_store,
            templates: Arc::new(templates),
            matcher: TemplateMatcher::new(),
            tracker,
            capture,
            dispatcher,
            state,
            cooldown,
            command_tx,
            command_rx,
            status,
        }
    }

    /// Канал команд для панели управления
    pub fn command_sender(&self) -> mpsc::UnboundedSender<Command> {
        self.command_tx.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    pub fn state(&self) -> AppState {
        self.state.state()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Цикл сканирования до сигнала остановки или команды Exit.
    /// Начатый тик всегда доводится до конца.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.scan_interval();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Сканер запущен");

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let report = self.tick(started).await;
            debug_if_enabled!("Тик: {:?}", report);

            if report == TickReport::Exit {
                info!("Получена команда выхода");
                break;
            }

            let elapsed = started.elapsed();
            if elapsed > period {
                debug!("Тик занял {:?}, пропущенные тики не выполняются", elapsed);
            }
        }

        info!("Сканер остановлен");
    }

    /// Один проход конвейера в момент `now`
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        if self.drain_commands() {
            return TickReport::Exit;
        }

        if self.state.state() == AppState::Disabled {
            return TickReport::Disabled;
        }

        let focused = self.tracker.focused_window().await;
        let is_target = focused
            .as_ref()
            .map(|window| window.is_target(&self.config.window_title_prefix))
            .unwrap_or(false);

        if let Some(transition) = self.state.on_focus_observed(is_target) {
            self.on_transition(transition, focused.as_ref());
        }

        if !self.state.is_scanning_allowed() {
            return TickReport::Paused;
        }

        let snapshot = match self.scan_rect(focused.as_ref()).await {
            Ok(rect) => self.capture.capture(rect).await,
            Err(e) => Err(e),
        };
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Тик пропущен: {}", e);
                return TickReport::CaptureFailed(e.to_string());
            }
        };

        // Сопоставление занимает CPU: вне потоков runtime
        let region = snapshot.region;
        let image = snapshot.image;
        let matcher = self.matcher;
        let templates = Arc::clone(&self.templates);
        let result = match tokio::task::spawn_blocking(move || matcher.best_match(&image, &templates)).await {
            Ok(result) => result,
            Err(e) => {
                error!("Сопоставление с эталонами прервано: {}", e);
                return TickReport::MatchFailed(e.to_string());
            }
        };
        let screen_x = region.x + result.location.0 as i32;
        let screen_y = region.y + result.location.1 as i32;

        if !result.meets(self.config.confidence_threshold) {
            debug_if_enabled!(
                "Лучшее совпадение ниже порога: эталон #{} счёт {:.4} в ({}, {})",
                result.template_id,
                result.score,
                screen_x,
                screen_y
            );
            return TickReport::BelowThreshold(result);
        }

        if !self.cooldown.expired(now) {
            debug!(
                "Совпадение {:.4}, но действует cooldown ещё {:?}",
                result.score,
                self.cooldown.remaining(now)
            );
            return TickReport::CoolingDown(result);
        }

        info!(
            "Обнаружен запрос подтверждения: {} счёт {:.4} в ({}, {})",
            self.templates
                .get(result.template_id)
                .map(|t| t.name())
                .unwrap_or("?"),
            result.score,
            screen_x,
            screen_y
        );

        let outcome = self.dispatcher.fire();
        if outcome.is_success() || self.config.consume_cooldown_on_failure {
            self.cooldown.reset(now);
        } else {
            warn!("Подтверждение не состоялось, cooldown не запущен: {}", outcome);
        }

        TickReport::Fired(result, outcome)
    }

    /// Применяет накопленные команды; `true`, если пришла команда выхода
    fn drain_commands(&mut self) -> bool {
        while let Ok(command) = self.command_rx.try_recv() {
            info!("Команда: {}", command);
            match command {
                Command::ToggleEnabled => {
                    let transition = self.state.toggle_enabled();
                    info!("Авто-подтверждение {}", if self.state.is_enabled() { "включено" } else { "выключено" });
                    self.config.enabled = self.state.is_enabled();
                    self.persist_config();
                    self.on_transition(transition, None);
                }
                Command::SetCustomRegion(rect) => {
                    if rect.is_empty() {
                        warn!("Пустая область {} проигнорирована", rect);
                        continue;
                    }
                    self.config.scan_region = ScanRegion::custom(rect);
                    info!("Область сканирования: {}", rect);
                    self.persist_config();
                    self.publish_status();
                }
                Command::ResetToDefault => {
                    self.config.scan_region = ScanRegion::focused();
                    info!("Область сканирования сброшена к окну в фокусе");
                    self.persist_config();
                    self.publish_status();
                }
                Command::Exit => return true,
            }
        }
        false
    }

    async fn scan_rect(&self, focused: Option<&WindowInfo>) -> Result<Rect> {
        if let Some(rect) = self.config.scan_region.custom_rect() {
            return Ok(rect);
        }

        if let Some(geometry) = focused.and_then(|window| window.geometry) {
            return Ok(geometry);
        }

        let screen = self
            .capture
            .screen_bounds()
            .await
            .map_err(|e| app_error!(capture, "не удалось определить границы экрана: {}", e))?;
        Ok(screen.fraction(
            DEFAULT_SCAN_LEFT,
            DEFAULT_SCAN_TOP,
            DEFAULT_SCAN_RIGHT,
            DEFAULT_SCAN_BOTTOM,
        ))
    }

    fn persist_config(&self) {
        if let Err(e) = self.config_store.save(&self.config) {
            error!("Не удалось сохранить конфигурацию: {}", e);
        }
    }

    fn on_transition(&self, transition: Transition, focused: Option<&WindowInfo>) {
        match transition.to {
            AppState::Active => info!(
                "Возобновлено: целевое окно в фокусе {}",
                focused.map(|w| w.to_string()).unwrap_or_default()
            ),
            AppState::Paused if transition.from == AppState::Active => {
                info!("Пауза: целевое окно не в фокусе")
            }
            _ => debug!("{} -> {}", transition.from, transition.to),
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let next = Status {
            state: self.state.state(),
            region: self.config.scan_region,
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
