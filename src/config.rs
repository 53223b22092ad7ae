use crate::error::{AppError, Result};
use crate::events::Rect;
use figment::{
    providers::{Env, Format, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Маркер в начале заголовка окна целевого приложения
pub const DEFAULT_WINDOW_TITLE_PREFIX: &str = "\u{2733}";

/// Неудачная инъекция клавиши не запускает cooldown: следующий тик может повторить попытку
pub const DEFAULT_CONSUME_COOLDOWN_ON_FAILURE: bool = false;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.9;
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 500;
pub const DEFAULT_COOLDOWN_SECONDS: f64 = 1.0;

const MIN_SCAN_INTERVAL_MS: u64 = 50;
const ENV_PREFIX: &str = "DRINKING_BIRD_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionMode {
    /// Область пересчитывается каждый тик по окну в фокусе
    #[default]
    Focused,
    /// Фиксированная область, заданная пользователем
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ScanRegion {
    pub mode: RegionMode,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl ScanRegion {
    pub fn focused() -> Self {
        Self::default()
    }

    pub fn custom(rect: Rect) -> Self {
        Self {
            mode: RegionMode::Custom,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }

    /// Прямоугольник пользовательской области; `None` в режиме окна
    pub fn custom_rect(&self) -> Option<Rect> {
        match self.mode {
            RegionMode::Custom => Some(Rect::new(self.x, self.y, self.width, self.height)),
            RegionMode::Focused => None,
        }
    }
}

impl std::fmt::Display for ScanRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.custom_rect() {
            Some(rect) => write!(f, "{}", rect),
            None => write!(f, "Default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub scan_region: ScanRegion,
    pub confidence_threshold: f64,
    pub scan_interval_ms: u64,
    pub cooldown_seconds: f64,
    pub enabled: bool,
    pub play_sound: bool,
    pub consume_cooldown_on_failure: bool,
    pub window_title_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_region: ScanRegion::focused(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            enabled: true,
            play_sound: true,
            consume_cooldown_on_failure: DEFAULT_CONSUME_COOLDOWN_ON_FAILURE,
            window_title_prefix: DEFAULT_WINDOW_TITLE_PREFIX.to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::ConfigParse(format!(
                "confidence_threshold должно быть в диапазоне [0, 1], получено {}",
                self.confidence_threshold
            )));
        }

        if self.scan_interval_ms < MIN_SCAN_INTERVAL_MS {
            return Err(AppError::ConfigParse(format!(
                "scan_interval_ms должно быть минимум {}",
                MIN_SCAN_INTERVAL_MS
            )));
        }

        if std::time::Duration::try_from_secs_f64(self.cooldown_seconds).is_err() {
            return Err(AppError::ConfigParse(format!(
                "Неверное значение cooldown_seconds: {}",
                self.cooldown_seconds
            )));
        }

        if let Some(rect) = self.scan_region.custom_rect() {
            if rect.is_empty() {
                return Err(AppError::ConfigParse(
                    "Пользовательская область сканирования пуста".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn scan_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scan_interval_ms)
    }

    /// Непредставимое значение отсекает `validate`; здесь только насыщение
    pub fn cooldown(&self) -> std::time::Duration {
        std::time::Duration::try_from_secs_f64(self.cooldown_seconds).unwrap_or(std::time::Duration::MAX)
    }

    /// Переменные `DRINKING_BIRD_*` поверх уже загруженной конфигурации.
    /// Действуют только на текущий запуск и в файл не сохраняются.
    pub fn with_env_overrides(self) -> Result<Config> {
        self.merge_env(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn merge_env(self, env: Env) -> Result<Config> {
        let config: Config = Figment::from(Serialized::defaults(self))
            .merge(env)
            .extract()
            .map_err(|e| AppError::ConfigParse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }
}

/// Загрузка и сохранение конфигурации. Никакой бизнес-логики.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Терпимая загрузка: отсутствующий или повреждённый файл даёт значения по умолчанию
    pub fn load(&self) -> Config {
        match self.try_load() {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Не удалось прочитать конфигурацию {:?}: {}. Используются значения по умолчанию",
                    self.path, e
                );
                Config::default()
            }
        }
    }

    /// Строгая загрузка. Частичный файл дополняется значениями по умолчанию.
    pub fn try_load(&self) -> Result<Config> {
        if !self.path.exists() {
            debug!("Файл конфигурации {:?} не найден", self.path);
        }

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Json::file(&self.path));

        let config: Config = figment
            .extract()
            .map_err(|e| AppError::ConfigParse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Атомарная замена файла: временный файл в том же каталоге + rename
    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), config)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AppError::Io(e.error))?;

        info!("Конфигурация сохранена в {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn create_test_store() -> (ConfigStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path().join("config.json"));
        (store, temp_dir)
    }

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_region.mode, RegionMode::Focused);
        assert_eq!(config.confidence_threshold, 0.9);
        assert_eq!(config.scan_interval_ms, 500);
        assert_eq!(config.cooldown_seconds, 1.0);
        assert!(!config.consume_cooldown_on_failure);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let (store, _temp_dir) = create_test_store();
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn test_truncated_file_falls_back_to_defaults() {
        let (store, _temp_dir) = create_test_store();
        std::fs::write(store.path(), "{\"scan_region\": {\"mode\": \"cus").unwrap();

        assert!(matches!(store.try_load(), Err(AppError::ConfigParse(_))));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let (store, _temp_dir) = create_test_store();
        std::fs::write(store.path(), r#"{"confidence_threshold": 1.5}"#).unwrap();

        assert!(store.try_load().is_err());
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn test_partial_file_is_merged_over_defaults() {
        let (store, _temp_dir) = create_test_store();
        std::fs::write(
            store.path(),
            r#"{"scan_region": {"mode": "custom", "x": 10, "y": 20, "width": 300, "height": 100}}"#,
        )
        .unwrap();

        let config = store.load();
        assert_eq!(config.scan_region.custom_rect(), Some(Rect::new(10, 20, 300, 100)));
        assert_eq!(config.scan_interval_ms, DEFAULT_SCAN_INTERVAL_MS);
        assert_eq!(config.window_title_prefix, DEFAULT_WINDOW_TITLE_PREFIX);
    }

    #[test]
    fn test_save_writes_documented_schema() {
        let (store, _temp_dir) = create_test_store();
        let config = Config {
            scan_region: ScanRegion::custom(Rect::new(5, 6, 70, 80)),
            ..Config::default()
        };
        store.save(&config).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["scan_region"]["mode"], "custom");
        assert_eq!(raw["scan_region"]["width"], 70);
        assert_eq!(raw["scan_interval_ms"], 500);
    }

    #[test]
    fn test_save_rejects_empty_custom_region() {
        let (store, _temp_dir) = create_test_store();
        let config = Config {
            scan_region: ScanRegion::custom(Rect::new(0, 0, 0, 10)),
            ..Config::default()
        };
        assert!(store.save(&config).is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let (store, temp_dir) = create_test_store();
        store.save(&Config::default()).unwrap();

        let updated = Config {
            scan_region: ScanRegion::custom(Rect::new(1, 2, 30, 40)),
            ..Config::default()
        };
        store.save(&updated).unwrap();

        assert_eq!(store.load(), updated);
        // Во временном каталоге не остаётся промежуточных файлов
        let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_unrepresentable_cooldown_is_rejected() {
        for cooldown in [1e20, f64::MAX, f64::INFINITY, f64::NAN, -0.5] {
            let config = Config {
                cooldown_seconds: cooldown,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "cooldown {}", cooldown);
            // Даже без проверки длительность не паникует
            let _ = config.cooldown();
        }
        assert_eq!(
            Config {
                cooldown_seconds: 1e20,
                ..Config::default()
            }
            .cooldown(),
            std::time::Duration::MAX
        );
    }

    #[test]
    fn test_huge_cooldown_in_file_falls_back_to_defaults() {
        let (store, _temp_dir) = create_test_store();
        std::fs::write(store.path(), r#"{"cooldown_seconds": 1e20}"#).unwrap();

        assert!(matches!(store.try_load(), Err(AppError::ConfigParse(_))));
        let config = store.load();
        assert_eq!(config, Config::default());
        assert_eq!(config.cooldown(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_env_does_not_leak_into_saved_config() {
        let (store, _temp_dir) = create_test_store();
        std::env::set_var("DRINKING_BIRD_SCAN_INTERVAL_MS", "750");

        store.save(&Config::default()).unwrap();
        let loaded = store.try_load();
        let overridden = Config::default().with_env_overrides();
        std::env::remove_var("DRINKING_BIRD_SCAN_INTERVAL_MS");

        assert_eq!(loaded.unwrap(), Config::default());
        assert_eq!(overridden.unwrap().scan_interval_ms, 750);
    }

    #[test]
    fn test_env_overrides_apply_over_loaded_config() {
        std::env::set_var("DRINKING_BIRD_ENVTEST_COOLDOWN_SECONDS", "2.5");
        std::env::set_var("DRINKING_BIRD_ENVTEST_SCAN_REGION__MODE", "custom");
        std::env::set_var("DRINKING_BIRD_ENVTEST_SCAN_REGION__WIDTH", "640");
        std::env::set_var("DRINKING_BIRD_ENVTEST_SCAN_REGION__HEIGHT", "200");

        let base = Config {
            confidence_threshold: 0.8,
            ..Config::default()
        };
        let merged = base.merge_env(Env::prefixed("DRINKING_BIRD_ENVTEST_").split("__"));

        std::env::set_var("DRINKING_BIRD_ENVTEST_COOLDOWN_SECONDS", "-1");
        let invalid = Config::default().merge_env(Env::prefixed("DRINKING_BIRD_ENVTEST_").split("__"));

        for key in ["COOLDOWN_SECONDS", "SCAN_REGION__MODE", "SCAN_REGION__WIDTH", "SCAN_REGION__HEIGHT"] {
            std::env::remove_var(format!("DRINKING_BIRD_ENVTEST_{}", key));
        }

        let merged = merged.unwrap();
        assert_eq!(merged.cooldown_seconds, 2.5);
        assert_eq!(merged.confidence_threshold, 0.8);
        assert_eq!(merged.scan_region.custom_rect(), Some(Rect::new(0, 0, 640, 200)));
        assert!(matches!(invalid, Err(AppError::ConfigParse(_))));
    }

    fn arb_scan_region() -> impl Strategy<Value = ScanRegion> {
        prop_oneof![
            Just(ScanRegion::focused()),
            (-4000i32..4000, -4000i32..4000, 1u32..8000, 1u32..8000)
                .prop_map(|(x, y, w, h)| ScanRegion::custom(Rect::new(x, y, w, h))),
        ]
    }

    fn arb_config() -> impl Strategy<Value = Config> {
        (
            arb_scan_region(),
            0.0f64..=1.0,
            MIN_SCAN_INTERVAL_MS..60_000u64,
            0.0f64..600.0,
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            "[^\\x00]{0,4}",
        )
            .prop_map(
                |(scan_region, threshold, interval, cooldown, enabled, sound, consume, prefix)| {
                    Config {
                        scan_region,
                        confidence_threshold: threshold,
                        scan_interval_ms: interval,
                        cooldown_seconds: cooldown,
                        enabled,
                        play_sound: sound,
                        consume_cooldown_on_failure: consume,
                        window_title_prefix: prefix,
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn config_round_trips_through_store(config in arb_config()) {
            let (store, _temp_dir) = create_test_store();
            store.save(&config).unwrap();
            prop_assert_eq!(store.try_load().unwrap(), config.clone());

            // Повторное сохранение идемпотентно
            let first = std::fs::read_to_string(store.path()).unwrap();
            store.save(&store.try_load().unwrap()).unwrap();
            prop_assert_eq!(std::fs::read_to_string(store.path()).unwrap(), first);
        }
    }
}
