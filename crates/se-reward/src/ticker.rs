//! Background ticker
//!
//! Drives [`RewardSessionEngine::tick`] at a fixed cadence on a named thread
//! so that sessions complete on time even when nobody polls. Stopped and
//! joined on [`SessionTicker::stop`] or drop.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::engine::{ProgressTick, RewardSessionEngine};

pub struct SessionTicker {
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SessionTicker {
    /// Tick `engine` every `interval`
    pub fn spawn(engine: Arc<RewardSessionEngine>, interval: Duration) -> io::Result<Self> {
        Self::spawn_with(engine, interval, |_| {})
    }

    /// Tick `engine` every `interval`, handing each tick of a running
    /// session to `on_tick`
    pub fn spawn_with<F>(
        engine: Arc<RewardSessionEngine>,
        interval: Duration,
        mut on_tick: F,
    ) -> io::Result<Self>
    where
        F: FnMut(ProgressTick) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("session-ticker".into())
            .spawn(move || {
                log::debug!("Session ticker started ({:?})", interval);
                while running_clone.load(Ordering::Acquire) {
                    if let Some(tick) = engine.tick() {
                        on_tick(tick);
                    }
                    thread::sleep(interval);
                }
                log::debug!("Session ticker stopped");
            })?;

        Ok(Self {
            running,
            thread: Mutex::new(Some(handle)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the thread and wait for it
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::error!("Session ticker thread panicked");
            }
        }
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{RewardCatalog, UserStats};
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::engine::SessionState;
    use std::time::Instant;

    #[test]
    fn test_ticker_completes_unpolled_session() {
        let clock = Arc::new(ManualClock::new());
        let engine = Arc::new(RewardSessionEngine::seeded(
            RewardCatalog::standard(),
            EngineConfig::default(),
            clock.clone(),
            5,
        )
        .unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let ticker = SessionTicker::spawn_with(
            Arc::clone(&engine),
            Duration::from_millis(1),
            move |tick| seen_clone.lock().push(tick.progress_fraction),
        )
        .unwrap();

        let session = engine
            .start_ad_watch("bonus-spins", &UserStats::new(1, 0))
            .unwrap();
        clock.advance(15_000);

        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.stats().completed == 0 {
            assert!(Instant::now() < deadline, "ticker never completed the session");
            thread::sleep(Duration::from_millis(1));
        }
        ticker.stop();
        assert!(!ticker.is_running());
        assert_eq!(engine.session_state(session.id), Some(SessionState::Completed));
        assert!(engine.active_session().is_none());
        assert!(seen.lock().iter().all(|f| (0.0..=1.0).contains(f)));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let engine = Arc::new(RewardSessionEngine::new(
            RewardCatalog::standard(),
            EngineConfig::default(),
        )
        .unwrap());
        let ticker = SessionTicker::spawn(engine, Duration::from_millis(2)).unwrap();
        assert!(ticker.is_running());
        ticker.stop();
        ticker.stop();
    }
}
