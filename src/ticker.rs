use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::clock::{Countdown, TotpClock};

/// Granularity of stop-flag checks inside a sleeping task.
const STOP_POLL: Duration = Duration::from_millis(50);

/// A cancellable periodic background task.
///
/// Dropping the ticker stops the task and joins its thread, so a torn-down
/// owner leaks no repeating work.
pub struct Ticker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Run `task` every `period`, starting one period from now.
    pub fn every(period: Duration, mut task: impl FnMut() + Send + 'static) -> Self {
        Self::spawn(move |stop| {
            while sleep_unless_stopped(&stop, period) {
                task();
            }
        })
    }

    /// Run `task` exactly when the clock enters a new code window, passing
    /// the new counter.
    ///
    /// Fires once immediately with the current counter so a freshly mounted
    /// view has a code to show, then only at window boundaries. The cosmetic
    /// countdown belongs on [`Ticker::every`] instead.
    pub fn at_window_boundaries(
        clock: TotpClock,
        mut task: impl FnMut(u64) + Send + 'static,
    ) -> Self {
        Self::spawn(move |stop| {
            let mut last = clock.counter();
            task(last);
            loop {
                let wait = Duration::from_secs(clock.countdown().seconds_remaining);
                if !sleep_unless_stopped(&stop, wait) {
                    break;
                }
                let counter = clock.counter();
                if counter != last {
                    last = counter;
                    task(counter);
                }
            }
        })
    }

    fn spawn(body: impl FnOnce(Arc<AtomicBool>) + Send + 'static) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || body(flag));
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the task and wait for the thread to wind down.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::debug!("ticker task panicked before shutdown");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleep for `total`, waking early when the stop flag is raised.
///
/// Returns `false` once stopped.
fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let slice = remaining.min(STOP_POLL);
        thread::sleep(slice);
        remaining -= slice;
    }
    !stop.load(Ordering::Relaxed)
}

/// The two refresh cadences of a code display, bundled per shown account.
///
/// `on_countdown` runs every second and only feeds the progress indicator;
/// `on_window` runs when the counter changes and is the only trigger for
/// code recomputation.
pub struct CodeRefresher {
    countdown: Ticker,
    window: Ticker,
}

impl CodeRefresher {
    /// Start both refresh tasks against `clock`.
    pub fn spawn(
        clock: TotpClock,
        mut on_countdown: impl FnMut(Countdown) + Send + 'static,
        on_window: impl FnMut(u64) + Send + 'static,
    ) -> Self {
        Self {
            countdown: Ticker::every(Duration::from_secs(1), move || {
                on_countdown(clock.countdown());
            }),
            window: Ticker::at_window_boundaries(clock, on_window),
        }
    }

    /// Stop both tasks.
    pub fn stop(&mut self) {
        self.countdown.stop();
        self.window.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ticks_repeat_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let mut ticker = Ticker::every(Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::Relaxed);
        });

        thread::sleep(Duration::from_millis(100));
        ticker.stop();
        let at_stop = count.load(Ordering::Relaxed);
        assert!(at_stop > 0);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), at_stop);
    }

    #[test]
    fn window_task_fires_immediately_with_the_current_counter() {
        let clock = TotpClock::default();
        let expected = clock.counter();
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let slot = Arc::clone(&seen);
        let mut ticker = Ticker::at_window_boundaries(clock, move |counter| {
            slot.store(counter as usize, Ordering::Relaxed);
        });

        thread::sleep(Duration::from_millis(50));
        ticker.stop();
        let fired = seen.load(Ordering::Relaxed);
        assert!(fired == expected as usize || fired == expected as usize + 1);
    }

    #[test]
    fn dropping_cancels_the_task() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        {
            let _ticker = Ticker::every(Duration::from_millis(5), move || {
                seen.fetch_add(1, Ordering::Relaxed);
            });
            thread::sleep(Duration::from_millis(30));
        }
        let after_drop = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), after_drop);
    }
}
