use crate::events::KeyCode;
use crate::services::{SoundPlayer, VirtualDevice};
use std::fmt;
use tracing::{error, info};

/// Итог попытки подтверждения
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Enter отправлен в окно в фокусе
    Sent,
    /// ОС отклонила синтетическое событие; подтверждения не было
    Rejected { reason: String },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Sent)
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Sent => write!(f, "sent"),
            ActionOutcome::Rejected { reason } => write!(f, "rejected: {}", reason),
        }
    }
}

/// Наблюдаемый побочный эффект найденного совпадения
pub trait ActionDispatcher: Send + Sync {
    fn fire(&mut self) -> ActionOutcome;
}

/// Enter через виртуальную клавиатуру uinput, затем звуковой сигнал
pub struct KeyActionDispatcher {
    device: VirtualDevice,
    sound: SoundPlayer,
    key_code: KeyCode,
}

impl KeyActionDispatcher {
    pub fn new(device: VirtualDevice, sound: SoundPlayer) -> Self {
        Self {
            device,
            sound,
            key_code: KeyCode::ENTER,
        }
    }
}

impl ActionDispatcher for KeyActionDispatcher {
    fn fire(&mut self) -> ActionOutcome {
        match self.device.tap(self.key_code) {
            Ok(()) => {
                info!("АВТО-ПОДТВЕРЖДЕНО! Отправлен {}", self.key_code);
                self.sound.play();
                ActionOutcome::Sent
            }
            Err(e) => {
                error!("Не удалось отправить {}: {}", self.key_code, e);
                ActionOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_dispatch_succeeds() {
        let device = VirtualDevice::new("test", true).unwrap();
        let mut dispatcher = KeyActionDispatcher::new(device, SoundPlayer::muted());
        assert_eq!(dispatcher.fire(), ActionOutcome::Sent);
        assert!(dispatcher.fire().is_success());
    }
}
