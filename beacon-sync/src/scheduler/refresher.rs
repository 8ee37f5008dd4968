//! Self-rescheduling refresh loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use super::Refresh;
use super::backoff::{BackoffPolicy, Phase, RefreshState};

/// Per-run signals; a restarted scheduler gets a fresh set so an aborted
/// task can never act on the new run's flags
#[derive(Default)]
struct Run {
    stopped: AtomicBool,
    wake: Notify,
}

/// Polls a [`Refresh`] target with an adaptive interval
///
/// At most one timer is pending per scheduler. Dropping the scheduler stops it.
pub struct AdaptiveRefreshScheduler {
    state: Arc<Mutex<RefreshState>>,
    run: Mutex<Option<(Arc<Run>, JoinHandle<()>)>>,
}

impl AdaptiveRefreshScheduler {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(RefreshState::new(policy))),
            run: Mutex::new(None),
        }
    }

    /// Fires an immediate fetch and keeps polling until [`stop`](Self::stop)
    ///
    /// Returns `false` (and does nothing) if the loop is already running.
    pub fn start(&self, target: Arc<dyn Refresh>) -> bool {
        let mut slot = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }

        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.reset();
            state.phase = Phase::Scheduled;
        }

        let run = Arc::new(Run::default());
        let handle = tokio::spawn(run_loop(target, Arc::clone(&self.state), Arc::clone(&run)));
        *slot = Some((run, handle));

        info!("Refresh loop started");
        true
    }

    /// Cancels the pending timer and any in-flight fetch; idempotent
    pub fn stop(&self) {
        let taken = self
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some((run, handle)) = taken else {
            return;
        };

        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            run.stopped.store(true, Ordering::SeqCst);
            state.phase = Phase::Idle;
        }
        handle.abort();

        info!("Refresh loop stopped");
    }

    /// Skips the rest of the current wait and fetches now
    pub fn refresh_now(&self) {
        let slot = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((run, _)) = slot.as_ref() {
            run.wake.notify_one();
        }
    }

    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn state(&self) -> RefreshState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AdaptiveRefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(target: Arc<dyn Refresh>, state: Arc<Mutex<RefreshState>>, run: Arc<Run>) {
    loop {
        {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if run.stopped.load(Ordering::SeqCst) {
                return;
            }
            state.phase = Phase::Fetching;
        }

        let changed = match target.refresh().await {
            Ok(changed) => changed,
            Err(e) => {
                warn!("Refresh failed, retrying on schedule: {}", e);
                false
            }
        };

        let delay = {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if run.stopped.load(Ordering::SeqCst) {
                return;
            }
            state.on_fetch_complete(changed)
        };

        debug!(changed, ?delay, "Next refresh scheduled");

        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = run.wake.notified() => {
                debug!("Refresh requested ahead of schedule");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SyncError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct Scripted {
        calls: AtomicUsize,
        completed: AtomicUsize,
        outcomes: Mutex<VecDeque<Result<bool>>>,
        latency: Duration,
    }

    impl Scripted {
        fn with(outcomes: Vec<Result<bool>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                ..Default::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Refresh for Scripted {
        async fn refresh(&self) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                time::sleep(self.latency).await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(false))
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fetches_immediately() {
        let target = Scripted::with(vec![]);
        let scheduler = AdaptiveRefreshScheduler::new(BackoffPolicy::default());
        assert_eq!(scheduler.state().phase, Phase::Idle);

        assert!(scheduler.start(target.clone()));
        assert!(!scheduler.start(target.clone()));

        time::sleep(ms(1)).await;
        assert_eq!(target.calls(), 1);
        assert_eq!(scheduler.state().phase, Phase::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_rearms_from_completion_and_grows() {
        let target = Scripted::with(vec![]);
        let scheduler = AdaptiveRefreshScheduler::new(BackoffPolicy::default());
        scheduler.start(target.clone());

        time::sleep(ms(1)).await;
        assert_eq!(target.calls(), 1);
        assert_eq!(scheduler.state().current_interval, Duration::from_secs(15));

        time::sleep(Duration::from_secs(14)).await;
        assert_eq!(target.calls(), 1);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(target.calls(), 2);
        assert_eq!(
            scheduler.state().current_interval,
            Duration::from_secs_f64(22.5)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_resets_interval() {
        let target = Scripted::with(vec![Ok(false), Ok(false), Ok(true)]);
        let scheduler = AdaptiveRefreshScheduler::new(BackoffPolicy::default());
        scheduler.start(target.clone());

        // fetches at 0s, 15s, 37.5s
        time::sleep(Duration::from_secs(38)).await;
        assert_eq!(target.calls(), 3);
        assert_eq!(scheduler.state().current_interval, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_keeps_loop_armed() {
        let target = Scripted::with(vec![
            Err(SyncError::Network("down".into())),
            Err(SyncError::Network("down".into())),
        ]);
        let scheduler = AdaptiveRefreshScheduler::new(BackoffPolicy::default());
        scheduler.start(target.clone());

        time::sleep(ms(1)).await;
        assert_eq!(scheduler.state().phase, Phase::Scheduled);
        assert_eq!(scheduler.state().current_interval, Duration::from_secs(15));

        time::sleep(Duration::from_secs(60)).await;
        assert!(target.calls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_final() {
        let target = Scripted::with(vec![]);
        let scheduler = AdaptiveRefreshScheduler::new(BackoffPolicy::default());
        scheduler.start(target.clone());
        time::sleep(ms(1)).await;

        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.state().phase, Phase::Idle);
        assert!(!scheduler.is_running());

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(target.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_drops_inflight_fetch() {
        let target = Arc::new(Scripted {
            latency: Duration::from_secs(5),
            ..Default::default()
        });
        let scheduler = AdaptiveRefreshScheduler::new(BackoffPolicy::default());
        scheduler.start(target.clone());

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.state().phase, Phase::Fetching);
        scheduler.stop();

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(target.calls(), 1);
        assert_eq!(target.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_skips_wait() {
        let target = Scripted::with(vec![]);
        let scheduler = AdaptiveRefreshScheduler::new(BackoffPolicy::default());
        scheduler.start(target.clone());
        time::sleep(ms(1)).await;

        scheduler.refresh_now();
        time::sleep(ms(1)).await;
        assert_eq!(target.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let target = Scripted::with(vec![]);
        let scheduler = AdaptiveRefreshScheduler::new(BackoffPolicy::default());
        scheduler.start(target.clone());
        time::sleep(Duration::from_secs(16)).await;
        scheduler.stop();

        assert!(scheduler.start(target.clone()));
        time::sleep(ms(1)).await;
        assert_eq!(target.calls(), 3);
        assert_eq!(scheduler.state().current_interval, Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_loop() {
        let target = Scripted::with(vec![]);
        {
            let scheduler = AdaptiveRefreshScheduler::new(BackoffPolicy::default());
            scheduler.start(target.clone());
            time::sleep(ms(1)).await;
        }
        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(target.calls(), 1);
    }
}
