use std::sync::Mutex;
use std::time::{Duration, Instant};

struct AfkState {
    warm: bool,
    last_active: Instant,
    speed_multiplier: f64,
}

/// Tracks when real traffic last arrived and whether the process is in warm
/// mode. The warm-up scheduler is the only writer of the warm flag; request
/// handlers refresh the activity clock through `touch`.
pub struct AfkMonitor {
    warm_multiplier: f64,
    state: Mutex<AfkState>,
}

impl AfkMonitor {
    pub fn new(warm_multiplier: f64) -> Self {
        Self {
            warm_multiplier,
            state: Mutex::new(AfkState {
                warm: false,
                last_active: Instant::now(),
                speed_multiplier: 1.0,
            }),
        }
    }

    /// Records real traffic by resetting the idle clock. Warm mode ends on the
    /// scheduler's next tick, not here.
    pub fn touch(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.last_active = Instant::now();
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.state
            .lock()
            .map(|state| state.last_active.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Switches to warm mode. Returns true when this call changed the state.
    pub fn enter_warm(&self) -> bool {
        match self.state.lock() {
            Ok(mut state) => {
                let changed = !state.warm;
                state.warm = true;
                state.speed_multiplier = self.warm_multiplier;
                changed
            }
            Err(_) => false,
        }
    }

    /// Leaves warm mode. Returns true when this call changed the state.
    pub fn leave_warm(&self) -> bool {
        match self.state.lock() {
            Ok(mut state) => {
                let changed = state.warm;
                state.warm = false;
                state.speed_multiplier = 1.0;
                changed
            }
            Err(_) => false,
        }
    }

    pub fn is_warm(&self) -> bool {
        self.state.lock().map(|state| state.warm).unwrap_or(false)
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.state
            .lock()
            .map(|state| state.speed_multiplier)
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_cold_with_full_speed() {
        let afk = AfkMonitor::new(0.8);
        assert!(!afk.is_warm());
        assert_eq!(afk.speed_multiplier(), 1.0);
    }

    #[test]
    fn enter_warm_lowers_speed_once() {
        let afk = AfkMonitor::new(0.8);
        assert!(afk.enter_warm());
        assert!(afk.is_warm());
        assert_eq!(afk.speed_multiplier(), 0.8);
        assert!(!afk.enter_warm());
    }

    #[test]
    fn touch_resets_only_the_idle_clock() {
        let afk = AfkMonitor::new(0.8);
        afk.enter_warm();
        std::thread::sleep(Duration::from_millis(5));
        assert!(afk.idle_for() >= Duration::from_millis(5));

        afk.touch();
        assert!(afk.idle_for() < Duration::from_millis(5));
        assert!(afk.is_warm());
        assert_eq!(afk.speed_multiplier(), 0.8);

        assert!(afk.leave_warm());
        assert_eq!(afk.speed_multiplier(), 1.0);
    }

    #[test]
    fn leave_warm_reports_transition() {
        let afk = AfkMonitor::new(0.5);
        assert!(!afk.leave_warm());
        afk.enter_warm();
        assert!(afk.leave_warm());
        assert_eq!(afk.speed_multiplier(), 1.0);
    }
}
