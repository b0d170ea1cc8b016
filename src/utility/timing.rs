// Stage timer for the batch commands and API handlers.
//
//   let chains = Timer::measure_async("fetch chains", || fetch(..)).await;
//   let timer = Timer::start("pipeline").items(symbols.len()); ... timer.stop();
//
// A timer that is dropped without stop() still logs, unless it was created silent.

use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Stages slower than this are logged at warn level
const SLOW_STAGE_MS: u128 = 5_000;

pub struct Timer {
    stage: String,
    started: Instant,
    items: Option<usize>,
    quiet: bool,
}

impl Timer {
    pub fn start(stage: impl Into<String>) -> Self {
        Self { stage: stage.into(), started: Instant::now(), items: None, quiet: false }
    }

    /// Never logs; handlers read `elapsed_ms` for the response body
    pub fn silent(stage: impl Into<String>) -> Self {
        Self { stage: stage.into(), started: Instant::now(), items: None, quiet: true }
    }

    /// Attach the number of symbols/rows the stage processed; logged with a per-item cost
    pub fn items(mut self, count: usize) -> Self {
        self.items = Some(count);
        self
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    pub fn stop(mut self) -> Duration {
        let elapsed = self.started.elapsed();
        self.report(elapsed);
        self.quiet = true;
        elapsed
    }

    fn report(&self, elapsed: Duration) {
        if self.quiet {
            return;
        }
        let ms = elapsed.as_millis() as u64;
        let per_item_ms = self.items.filter(|n| *n > 0).map(|n| elapsed.as_secs_f64() * 1e3 / n as f64);
        if elapsed.as_millis() > SLOW_STAGE_MS {
            warn!(stage = %self.stage, elapsed_ms = ms, items = ?self.items, ?per_item_ms, "slow stage");
        } else {
            info!(stage = %self.stage, elapsed_ms = ms, items = ?self.items, ?per_item_ms, "stage finished");
        }
    }

    pub fn measure<R>(stage: impl Into<String>, f: impl FnOnce() -> R) -> R {
        let timer = Self::start(stage);
        let out = f();
        timer.stop();
        out
    }

    pub async fn measure_async<F, Fut, R>(stage: impl Into<String>, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let timer = Self::start(stage);
        let out = f().await;
        timer.stop();
        out
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if !self.quiet {
            self.report(self.started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_returns_value() {
        let value = Timer::measure("unit", || 21 * 2);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_silent_timer_tracks_elapsed() {
        let timer = Timer::silent("quiet").items(3);
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed_ms() >= 2);
    }

    #[test]
    fn test_silent_timer_is_quiet_and_stop_disarms_drop() {
        let timer = Timer::silent("handler");
        assert!(timer.quiet);
        assert_eq!(timer.items, None);
        assert_eq!(timer.stage, "handler");

        let timer = Timer::start("stage").items(4);
        assert!(!timer.quiet);
        assert_eq!(timer.items, Some(4));
        let elapsed = timer.stop();
        assert!(elapsed.as_millis() < SLOW_STAGE_MS);
    }

    #[tokio::test]
    async fn test_measure_async_returns_value() {
        let value = Timer::measure_async("async unit", || async { "done" }).await;
        assert_eq!(value, "done");
    }
}
