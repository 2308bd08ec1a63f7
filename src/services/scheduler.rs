//! Repeating background tasks (matchmaking scan, per-match countdown).

use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::debug;

/// What a repeating task wants after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Continue,
    /// Stop the task.
    Stop,
}

/// Spawn `tick` every `period`, first one period from now.
///
/// Ticks are awaited one after another, so a task never overlaps with itself; ticks missed
/// while a slow one runs are skipped rather than replayed in a burst.
pub fn spawn_repeating<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TickOutcome> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if tick().await == TickOutcome::Stop {
                debug!(task = name, "repeating task stopped");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let handle = spawn_repeating("test", Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TickOutcome::Continue
            }
        });

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2_002)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_task() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let handle = spawn_repeating("test", Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                    TickOutcome::Stop
                } else {
                    TickOutcome::Continue
                }
            }
        });

        handle.await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ticks_do_not_overlap() {
        let running = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let (running_c, overlaps_c) = (running.clone(), overlaps.clone());
        let handle = spawn_repeating("test", Duration::from_secs(1), move || {
            let (running, overlaps) = (running_c.clone(), overlaps_c.clone());
            async move {
                if running.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(2_500)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                TickOutcome::Continue
            }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        handle.abort();
    }
}
