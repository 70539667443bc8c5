//! Fixed-tick loop scheduler.
//!
//! Each tick scans the loop entries in order. An entry whose interval has
//! elapsed since it last finished, and which is not still running, is
//! marked running and handed to the worker pool. The worker clears the flag
//! and stamps the finish time, so a slow loop is skipped rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sidus_types::error::ConfigError;
use tokio::time::MissedTickBehavior;

use super::Application;
use crate::inject::Executable;

pub(crate) struct LoopEntry {
    pub(crate) name: String,
    executable: Executable,
    interval: chrono::Duration,
    last_fired: Mutex<DateTime<Utc>>,
    running: AtomicBool,
}

impl LoopEntry {
    pub(crate) fn new(
        name: String,
        executable: Executable,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        let interval = chrono::Duration::from_std(interval)
            .map_err(|_| ConfigError::InvalidLoopInterval(name.clone()))?;
        Ok(Self {
            name,
            executable,
            interval,
            last_fired: Mutex::new(now),
            running: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.running.load(Ordering::Acquire) {
            return false;
        }
        let last = *self.last_fired.lock().expect("loop entry lock poisoned");
        now - last >= self.interval
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish(&self, at: DateTime<Utc>) {
        *self.last_fired.lock().expect("loop entry lock poisoned") = at;
        self.running.store(false, Ordering::Release);
    }
}

/// Clears the running flag when a loop body ends, panics included.
struct Firing<'a>(&'a LoopEntry);

impl Drop for Firing<'_> {
    fn drop(&mut self) {
        self.0.finish(Utc::now());
    }
}

impl Application {
    /// Dispatch every due loop. Returns how many were dispatched.
    pub(crate) fn tick(self: &Arc<Self>, now: DateTime<Utc>) -> usize {
        let mut dispatched = 0;
        for (index, entry) in self.loops.iter().enumerate() {
            if !entry.is_due(now) || !entry.try_start() {
                continue;
            }
            let app = Arc::clone(self);
            let span = tracing::debug_span!("loop", loop_name = %entry.name);
            let result = span.in_scope(|| {
                self.pool.dispatch(&entry.name, move || {
                    let entry = &app.loops[index];
                    let _firing = Firing(entry);
                    if let Err(err) = entry.executable.invoke(&app.components, None) {
                        app.route_error(err);
                    }
                })
            });
            match result {
                Ok(()) => dispatched += 1,
                Err(err) => {
                    entry.running.store(false, Ordering::Release);
                    tracing::warn!(
                        loop_name = %entry.name,
                        queued = self.pool.queued(),
                        error = %err,
                        "loop skipped"
                    );
                }
            }
        }
        dispatched
    }

    /// Tick until the agent is halted.
    pub(crate) async fn run_scheduler(self: Arc<Self>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            agent = %self.name,
            loops = self.loops.len(),
            tick_ms = tick.as_millis() as u64,
            "scheduler started"
        );
        loop {
            tokio::select! {
                _ = self.halt.cancelled() => break,
                _ = interval.tick() => {
                    self.tick(Utc::now());
                }
            }
        }
        tracing::info!(agent = %self.name, "scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(interval_ms: u64, now: DateTime<Utc>) -> LoopEntry {
        LoopEntry::new(
            "tick".to_string(),
            Executable::function().named("tick").build(|_| Ok(())),
            Duration::from_millis(interval_ms),
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_due_after_interval() {
        let start = Utc::now();
        let entry = entry(3000, start);
        assert!(!entry.is_due(start));
        assert!(!entry.is_due(start + chrono::Duration::milliseconds(2999)));
        assert!(entry.is_due(start + chrono::Duration::seconds(3)));
    }

    #[test]
    fn test_running_entry_never_due() {
        let start = Utc::now();
        let entry = entry(10, start);
        let later = start + chrono::Duration::seconds(1);
        assert!(entry.try_start());
        assert!(entry.is_running());
        assert!(!entry.is_due(later));
        assert!(!entry.try_start());

        entry.finish(later);
        assert!(!entry.is_running());
        assert!(!entry.is_due(later));
        assert!(entry.is_due(later + chrono::Duration::milliseconds(10)));
    }

    #[test]
    fn test_firing_guard_clears_flag() {
        let start = Utc::now();
        let entry = entry(10, start);
        assert!(entry.try_start());
        {
            let _firing = Firing(&entry);
        }
        assert!(!entry.is_running());
        assert!(*entry.last_fired.lock().unwrap() >= start);
    }
}
