//! Interval-driven render loop

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Called once per frame with the raw delta in seconds. Returning `false`
/// ends the loop.
pub type FrameFn = Arc<dyn Fn(f32) -> bool + Send + Sync>;

/// A cancellable frame ticker
pub struct RenderLoop {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl RenderLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start ticking on `runtime`. No-op while already running.
    pub fn start(&mut self, runtime: &Handle, frame: FrameFn) -> bool {
        if self.is_running() {
            return false;
        }

        let period = self.interval;
        self.task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last = Instant::now();
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f32();
                last = now;
                if !frame(dt) {
                    debug!("Render loop finished");
                    break;
                }
            }
        }));
        true
    }

    /// Stop ticking. Returns false if the loop was not running.
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                let was_running = !task.is_finished();
                task.abort();
                was_running
            }
            None => false,
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, FrameFn) {
        let frames = Arc::new(AtomicUsize::new(0));
        let count = frames.clone();
        let frame: FrameFn = Arc::new(move |_dt| {
            count.fetch_add(1, Ordering::SeqCst);
            true
        });
        (frames, frame)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_interval() {
        let (frames, frame) = counter();
        let mut render_loop = RenderLoop::new(Duration::from_millis(10));
        assert!(render_loop.start(&Handle::current(), frame.clone()));
        assert!(!render_loop.start(&Handle::current(), frame));

        tokio::time::sleep(Duration::from_millis(105)).await;
        let ticked = frames.load(Ordering::SeqCst);
        assert!((10..=12).contains(&ticked), "ticked {}", ticked);
        assert!(render_loop.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_restart() {
        let (frames, frame) = counter();
        let mut render_loop = RenderLoop::new(Duration::from_millis(10));
        render_loop.start(&Handle::current(), frame.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(render_loop.stop());
        assert!(!render_loop.stop());
        let stopped_at = frames.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(frames.load(Ordering::SeqCst), stopped_at);

        assert!(render_loop.start(&Handle::current(), frame));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(frames.load(Ordering::SeqCst) > stopped_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_can_end_loop() {
        let mut render_loop = RenderLoop::new(Duration::from_millis(10));
        render_loop.start(&Handle::current(), Arc::new(|_| false));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!render_loop.is_running());
    }
}
