//! crates/exam_session_core/src/clock.rs
//!
//! The session countdown. `Countdown` is the pure counter; `SessionClock` drives it
//! from a tokio interval and is cancelled when stopped or dropped.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of advancing the countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running { remaining: u64 },
    /// Reported exactly once, on the tick that reaches zero.
    Expired,
    /// Any tick after expiry.
    Idle,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    total: u64,
    remaining: u64,
    expired: bool,
}

impl Countdown {
    pub fn new(total_secs: u64) -> Self {
        Self {
            total: total_secs,
            remaining: total_secs,
            expired: false,
        }
    }

    pub fn tick(&mut self) -> Tick {
        if self.expired {
            return Tick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            Tick::Expired
        } else {
            Tick::Running {
                remaining: self.remaining,
            }
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn elapsed(&self) -> u64 {
        self.total - self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

//=========================================================================================
// SessionClock
//=========================================================================================

/// A running countdown owned by one session.
///
/// The tick task is cancelled by `stop()` and by dropping the clock, so it can never
/// outlive its owner. Ticks whose deadline has passed are still applied when a stop
/// arrives at the same instant, so a stop racing the final tick still sees remaining
/// reach zero and `on_expire` run exactly once.
pub struct SessionClock {
    token: CancellationToken,
    remaining: watch::Receiver<u64>,
    handle: JoinHandle<()>,
}

impl SessionClock {
    /// Spawns the tick task on the current tokio runtime. The first tick lands one
    /// `period` after this call.
    pub fn start<F, Fut>(duration_secs: u64, period: Duration, on_expire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let (remaining_tx, remaining_rx) = watch::channel(duration_secs);
        let handle = tokio::spawn(run_clock(
            Countdown::new(duration_secs),
            period,
            remaining_tx,
            token.clone(),
            on_expire,
        ));
        info!(duration_secs, "Session clock started.");
        Self {
            token,
            remaining: remaining_rx,
            handle,
        }
    }

    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// A receiver that observes every change of the remaining seconds.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled() || self.handle.is_finished()
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_clock<F, Fut>(
    mut countdown: Countdown,
    period: Duration,
    remaining_tx: watch::Sender<u64>,
    token: CancellationToken,
    on_expire: F,
) where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = time::interval_at(Instant::now() + period, period);

    loop {
        // A tick that is already due is applied before a pending stop is honoured.
        tokio::select! {
            biased;
            _ = interval.tick() => {
                match countdown.tick() {
                    Tick::Running { remaining } => {
                        remaining_tx.send_replace(remaining);
                    }
                    Tick::Expired => {
                        remaining_tx.send_replace(0);
                        break;
                    }
                    Tick::Idle => return,
                }
            }
            _ = token.cancelled() => {
                debug!(remaining = countdown.remaining(), "Session clock stopped.");
                return;
            }
        }
    }

    info!(elapsed = countdown.elapsed(), "Session clock expired.");
    on_expire().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn countdown_expires_once() {
        let mut countdown = Countdown::new(3);
        assert_eq!(countdown.tick(), Tick::Running { remaining: 2 });
        assert_eq!(countdown.tick(), Tick::Running { remaining: 1 });
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.tick(), Tick::Idle);
        assert_eq!(countdown.remaining(), 0);
        assert_eq!(countdown.elapsed(), 3);
        assert!(countdown.is_expired());
    }

    #[test]
    fn zero_duration_expires_on_first_tick() {
        let mut countdown = Countdown::new(0);
        assert!(!countdown.is_expired());
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.tick(), Tick::Idle);
    }

    fn counting_clock(duration: u64) -> (SessionClock, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let clock = SessionClock::start(duration, Duration::from_secs(1), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (clock, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_fires_exactly_once_after_n_ticks() {
        let (clock, fired) = counting_clock(3);

        time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(clock.remaining(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(clock.remaining(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(clock.is_stopped());

        // Stopping after the fact changes nothing.
        clock.stop();
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_ticks() {
        let (clock, fired) = counting_clock(5);

        time::sleep(Duration::from_millis(2_500)).await;
        clock.stop();
        time::sleep(Duration::from_secs(10)).await;

        assert_eq!(clock.remaining(), 3);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_at_the_final_tick_still_expires_once() {
        let (clock, fired) = counting_clock(3);

        time::sleep(Duration::from_secs(3)).await;
        clock.stop();
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(clock.remaining(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(clock.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_clock_cancels_it() {
        let (clock, fired) = counting_clock(2);
        let remaining = clock.subscribe();

        drop(clock);
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(*remaining.borrow(), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
