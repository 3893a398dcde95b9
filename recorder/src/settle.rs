//! Bounded waits.
//!
//! Replaces fixed sleeps with polling: the page is settled once no request has
//! been in flight for the idle window, and every wait gives up with a
//! `RecorderError::Timeout` that says what it was waiting for.

use crate::driver::{PageDriver, Selector};
use crate::error::{RecorderError, Result};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Poll interval for every bounded wait.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// In-flight request tracking fed by the observer.
#[derive(Debug)]
pub struct NetworkActivity {
    state: Mutex<ActivityState>,
}

#[derive(Debug)]
struct ActivityState {
    inflight: HashSet<String>,
    last_change: Instant,
}

impl Default for NetworkActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkActivity {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ActivityState {
                inflight: HashSet::new(),
                last_change: Instant::now(),
            }),
        }
    }

    /// Redirects reuse the request id, so a restart is not double counted.
    pub fn request_started(&self, request_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.inflight.insert(request_id.to_string());
        state.last_change = Instant::now();
    }

    pub fn request_settled(&self, request_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.inflight.remove(request_id) {
            state.last_change = Instant::now();
        }
    }

    pub fn inflight(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .inflight
            .len()
    }

    /// How long the network has been quiet; `None` while anything is in flight.
    pub fn quiet_for(&self) -> Option<Duration> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.inflight.is_empty() {
            Some(state.last_change.elapsed())
        } else {
            None
        }
    }
}

/// Wait until no request has been in flight for `idle`.
///
/// The quiet window never starts before the call, so requests the page fires
/// in reaction to the previous interaction are seen before idleness is judged.
pub async fn wait_for_idle(
    activity: &NetworkActivity,
    idle: Duration,
    timeout: Duration,
) -> Result<()> {
    let started = Instant::now();
    let deadline = started + timeout;
    loop {
        if activity
            .quiet_for()
            .is_some_and(|quiet| quiet.min(started.elapsed()) >= idle)
        {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RecorderError::Timeout {
                waiting_for: "network idle".to_string(),
                after: timeout,
                detail: format!("{} request(s) still in flight", activity.inflight()),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until `selector` matches an element.
pub async fn wait_for_selector<D: PageDriver + ?Sized>(
    driver: &D,
    selector: &Selector,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if driver.exists(selector).await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RecorderError::Timeout {
                waiting_for: format!("selector `{selector}`"),
                after: timeout,
                detail: "no matching element appeared".to_string(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn idle_after_quiet_window() {
        let activity = NetworkActivity::new();
        activity.request_started("1");
        activity.request_settled("1");

        let started = Instant::now();
        wait_for_idle(&activity, Duration::from_millis(500), Duration::from_secs(5))
            .await
            .expect("settles");
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn redirect_reusing_id_counts_once() {
        let activity = NetworkActivity::new();
        activity.request_started("7");
        activity.request_started("7");
        assert_eq!(activity.inflight(), 1);
        activity.request_settled("7");
        assert_eq!(activity.inflight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_request_times_out_with_detail() {
        let activity = NetworkActivity::new();
        activity.request_started("long-poll");

        let err = wait_for_idle(&activity, Duration::from_millis(500), Duration::from_secs(2))
            .await
            .expect_err("never idle");
        match err {
            RecorderError::Timeout {
                waiting_for,
                after,
                detail,
            } => {
                assert_eq!(waiting_for, "network idle");
                assert_eq!(after, Duration::from_secs(2));
                assert_eq!(detail, "1 request(s) still in flight");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_window_starts_at_the_call() {
        let activity = NetworkActivity::new();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let started = Instant::now();
        wait_for_idle(&activity, Duration::from_millis(500), Duration::from_secs(5))
            .await
            .expect("settles");
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn late_settle_extends_the_wait() {
        let activity = Arc::new(NetworkActivity::new());
        activity.request_started("upload");

        let bg = Arc::clone(&activity);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            bg.request_settled("upload");
        });

        let started = Instant::now();
        wait_for_idle(&activity, Duration::from_millis(500), Duration::from_secs(5))
            .await
            .expect("settles");
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }
}
