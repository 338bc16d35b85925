use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

/// Timer seam used by reconnect loops.
///
/// Production code sleeps on the tokio clock; tests record the requested
/// delays and resume immediately.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Scheduler that records every requested delay and never waits.
#[derive(Debug, Default, Clone)]
pub struct RecordingScheduler {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingScheduler {
    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        match self.delays.lock() {
            Ok(delays) => delays.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn sleep(&self, delay: Duration) {
        match self.delays.lock() {
            Ok(mut delays) => delays.push(delay),
            Err(poisoned) => poisoned.into_inner().push(delay),
        }
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_scheduler_keeps_order() {
        let scheduler = RecordingScheduler::default();
        scheduler.sleep(Duration::from_millis(3_000)).await;
        scheduler.sleep(Duration::from_millis(6_000)).await;

        assert_eq!(
            scheduler.delays(),
            vec![Duration::from_millis(3_000), Duration::from_millis(6_000)]
        );
    }

    #[tokio::test]
    async fn clones_share_recorded_delays() {
        let scheduler = RecordingScheduler::default();
        let clone = scheduler.clone();
        clone.sleep(Duration::from_millis(10)).await;
        assert_eq!(scheduler.delays(), vec![Duration::from_millis(10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_waits_on_the_runtime_clock() {
        let started = tokio::time::Instant::now();
        TokioScheduler.sleep(Duration::from_secs(3)).await;
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
