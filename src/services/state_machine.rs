use serde::{Deserialize, Serialize};
use std::fmt;

/// Состояние приложения; им владеет только StateMachine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppState {
    /// Целевое окно в фокусе: сканирование и действия разрешены
    Active,
    /// Включено, но целевое окно не в фокусе
    Paused,
    /// Выключено пользователем
    Disabled,
}

impl AppState {
    /// Цвет индикатора в трее
    pub fn indicator_color(&self) -> &'static str {
        match self {
            AppState::Active => "green",
            AppState::Paused => "yellow",
            AppState::Disabled => "red",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppState::Active => write!(f, "Active"),
            AppState::Paused => write!(f, "Paused"),
            AppState::Disabled => write!(f, "Disabled"),
        }
    }
}

/// Переход состояния для логов и индикатора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: AppState,
    pub to: AppState,
}

#[derive(Debug, Clone)]
pub struct StateMachine {
    state: AppState,
}

impl StateMachine {
    /// Старт в Paused (фокус ещё неизвестен) либо в Disabled
    pub fn new(enabled: bool) -> Self {
        Self {
            state: if enabled {
                AppState::Paused
            } else {
                AppState::Disabled
            },
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state != AppState::Disabled
    }

    /// Только в Active выполняются снимок, сопоставление и действие
    pub fn is_scanning_allowed(&self) -> bool {
        self.state == AppState::Active
    }

    /// Disabled -> Paused (фокус переоценивается тем же тиком), иначе -> Disabled
    pub fn toggle_enabled(&mut self) -> Transition {
        let to = match self.state {
            AppState::Disabled => AppState::Paused,
            AppState::Active | AppState::Paused => AppState::Disabled,
        };
        self.set(to)
    }

    /// Наблюдение фокуса; в Disabled игнорируется
    pub fn on_focus_observed(&mut self, is_target: bool) -> Option<Transition> {
        if self.state == AppState::Disabled {
            return None;
        }

        let to = if is_target {
            AppState::Active
        } else {
            AppState::Paused
        };

        if to == self.state {
            return None;
        }
        Some(self.set(to))
    }

    fn set(&mut self, to: AppState) -> Transition {
        let from = self.state;
        self.state = to;
        Transition { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(StateMachine::new(true).state(), AppState::Paused);
        assert_eq!(StateMachine::new(false).state(), AppState::Disabled);
    }

    #[test]
    fn test_focus_switches_active_and_paused() {
        let mut machine = StateMachine::new(true);

        let transition = machine.on_focus_observed(true).unwrap();
        assert_eq!(transition, Transition { from: AppState::Paused, to: AppState::Active });
        assert!(machine.is_scanning_allowed());

        // Повторное наблюдение без изменения не даёт перехода
        assert_eq!(machine.on_focus_observed(true), None);

        machine.on_focus_observed(false).unwrap();
        assert_eq!(machine.state(), AppState::Paused);
        assert!(!machine.is_scanning_allowed());
    }

    #[test]
    fn test_disabled_is_sticky() {
        let mut machine = StateMachine::new(true);
        machine.on_focus_observed(true);

        let transition = machine.toggle_enabled();
        assert_eq!(transition.to, AppState::Disabled);

        assert_eq!(machine.on_focus_observed(true), None);
        assert_eq!(machine.state(), AppState::Disabled);
        assert!(!machine.is_scanning_allowed());
    }

    #[test]
    fn test_toggle_from_disabled_reenables() {
        let mut machine = StateMachine::new(false);
        let transition = machine.toggle_enabled();
        assert_eq!(transition, Transition { from: AppState::Disabled, to: AppState::Paused });

        machine.on_focus_observed(true);
        assert_eq!(machine.state(), AppState::Active);
    }

    #[test]
    fn test_toggle_from_paused_disables() {
        let mut machine = StateMachine::new(true);
        machine.toggle_enabled();
        assert_eq!(machine.state(), AppState::Disabled);
        assert!(!machine.is_enabled());
    }
}
