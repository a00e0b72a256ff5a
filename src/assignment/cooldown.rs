use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// 1 Hz tick source for the resend cooldown.
///
/// Create one on entering `AwaitingOtp` and drop it on leaving; dropping the
/// interval is what stops the countdown.
pub struct CooldownTicker {
    interval: Interval,
}

impl CooldownTicker {
    pub fn start() -> Self {
        let period = Duration::from_secs(1);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Resolves once per second, the first time one second after `start`
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Realigns to a fresh dispatch: the next tick comes one full second from now
    pub fn restart(&mut self) {
        self.interval.reset();
    }
}
