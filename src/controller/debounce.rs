use std::future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Single-slot timer that fires once after a quiet period.
///
/// `reset` re-arms the deadline, `cancel` disarms it. The owner awaits
/// [`SilenceDebouncer::expired`] inside its event loop; the future completes
/// once per armed deadline and never while disarmed.
#[derive(Debug)]
pub struct SilenceDebouncer {
    quiet_period: Duration,
    deadline: Option<Instant>,
}

impl SilenceDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            deadline: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Cancel any pending fire and schedule a new one for now + quiet period
    pub fn reset(&mut self) {
        self.deadline = Some(Instant::now() + self.quiet_period);
    }

    /// Clear a pending fire
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Wait for the armed deadline. Cancel safe.
    pub async fn expired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    const QUIET: Duration = Duration::from_millis(3000);

    #[test]
    fn test_starts_disarmed() {
        let debouncer = SilenceDebouncer::new(QUIET);
        assert!(!debouncer.is_armed());
        assert_eq!(debouncer.quiet_period(), QUIET);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_quiet_period() {
        let mut debouncer = SilenceDebouncer::new(QUIET);
        let start = Instant::now();
        debouncer.reset();

        debouncer.expired().await;
        assert_eq!(start.elapsed(), QUIET);
        assert!(!debouncer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_pushes_deadline_back() {
        let mut debouncer = SilenceDebouncer::new(QUIET);
        let start = Instant::now();
        debouncer.reset();

        advance(Duration::from_millis(2000)).await;
        debouncer.reset();

        debouncer.expired().await;
        assert_eq!(start.elapsed(), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let mut debouncer = SilenceDebouncer::new(QUIET);
        debouncer.reset();
        debouncer.cancel();

        let fired = timeout(Duration::from_secs(60), debouncer.expired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_per_reset() {
        let mut debouncer = SilenceDebouncer::new(QUIET);
        debouncer.reset();
        debouncer.expired().await;

        let again = timeout(Duration::from_secs(60), debouncer.expired()).await;
        assert!(again.is_err());
    }
}
