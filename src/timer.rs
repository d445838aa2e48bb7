//! Timers for delays longer than a single platform timer can express.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Longest delay a single timer is armed for (`2^31 - 1` milliseconds).
pub const MAX_TIMER_DELAY: Duration = Duration::from_millis(0x7FFF_FFFF);

/// Sleep for `delay` as a chain of waits no longer than `cap` each.
///
/// Returns `true` once the full delay has elapsed, or `false` as soon as
/// `token` is cancelled, whichever sub-wait the chain is in.
pub async fn sleep_long(delay: Duration, cap: Duration, token: &CancellationToken) -> bool {
    let cap = if cap.is_zero() { MAX_TIMER_DELAY } else { cap };
    let mut remaining = delay;
    loop {
        let step = remaining.min(cap);
        tokio::select! {
            biased;
            _ = token.cancelled() => return false,
            _ = tokio::time::sleep(step) => {}
        }
        remaining -= step;
        if remaining.is_zero() {
            return true;
        }
    }
}

/// A one-shot timer that runs a task after an arbitrarily long delay.
///
/// The timer runs under a child of the given cancellation token, so
/// cancelling the parent stops every timer armed from it. Dropping the
/// handle does not cancel the timer.
#[derive(Debug)]
pub struct LongTimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl LongTimer {
    /// Arm a timer that awaits `task` once `delay` has elapsed.
    pub fn start<F>(runtime: &Handle, delay: Duration, parent: &CancellationToken, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::start_with_cap(runtime, delay, MAX_TIMER_DELAY, parent, task)
    }

    /// Like [`start`](Self::start) with an explicit per-wait cap.
    pub fn start_with_cap<F>(
        runtime: &Handle,
        delay: Duration,
        cap: Duration,
        parent: &CancellationToken,
        task: F,
    ) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let chain = token.clone();
        let handle = runtime.spawn(async move {
            if sleep_long(delay, cap, &chain).await {
                task.await;
            }
        });
        LongTimer { token, handle }
    }

    /// Stop the timer. Has no effect once the task has started running.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the timer has fired (or been cancelled) and finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
