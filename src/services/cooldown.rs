use std::time::{Duration, Instant};

/// Минимальный интервал между двумя срабатываниями.
/// Не влияет на сканирование, только на право выполнить действие.
#[derive(Debug, Clone)]
pub struct CooldownTimer {
    cooldown: Duration,
    last_action_at: Option<Instant>,
}

impl CooldownTimer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_action_at: None,
        }
    }

    /// `true`, если действий ещё не было или прошло не меньше `cooldown`
    pub fn expired(&self, now: Instant) -> bool {
        match self.last_action_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.last_action_at = Some(now);
    }

    /// Сколько осталось ждать; ноль, если cooldown истёк
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_action_at {
            None => Duration::ZERO,
            Some(last) => self.cooldown.saturating_sub(now.saturating_duration_since(last)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_without_prior_action() {
        let timer = CooldownTimer::new(Duration::from_secs(1));
        assert!(timer.expired(Instant::now()));
    }

    #[test]
    fn test_cooldown_window_is_half_open() {
        let t0 = Instant::now();
        let mut timer = CooldownTimer::new(Duration::from_secs(1));
        timer.reset(t0);

        assert!(!timer.expired(t0));
        assert!(!timer.expired(t0 + Duration::from_millis(300)));
        assert!(!timer.expired(t0 + Duration::from_millis(999)));
        assert!(timer.expired(t0 + Duration::from_secs(1)));
        assert!(timer.expired(t0 + Duration::from_millis(1200)));
    }

    #[test]
    fn test_remaining() {
        let t0 = Instant::now();
        let mut timer = CooldownTimer::new(Duration::from_secs(1));
        timer.reset(t0);
        assert_eq!(timer.remaining(t0 + Duration::from_millis(300)), Duration::from_millis(700));
        assert_eq!(timer.remaining(t0 + Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn test_zero_cooldown_never_blocks() {
        let t0 = Instant::now();
        let mut timer = CooldownTimer::new(Duration::ZERO);
        timer.reset(t0);
        assert!(timer.expired(t0));
    }
}
