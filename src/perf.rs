use std::time::{Duration, Instant};

use tracing::warn;

use crate::simulation::{TickFrame, TickListener};

const FPS_SAMPLE_EVERY: u64 = 30;
const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);
const SLOW_TICK: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerformanceSnapshot {
    pub fps: u32,
    pub render_time: Duration,
    /// Simulation energy after the last tick; zero once settled.
    pub alpha: f32,
}

/// Samples tick timing. Readers see a value refreshed at most once per second.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    last_tick: Option<Instant>,
    intervals: u64,
    current: PerformanceSnapshot,
    published: PerformanceSnapshot,
    published_at: Option<Instant>,
}

impl PerformanceMonitor {
    pub fn record(&mut self, now: Instant, tick_time: Duration) {
        self.current.render_time = tick_time;

        if let Some(last) = self.last_tick {
            self.intervals += 1;
            let delta_ms = now.saturating_duration_since(last).as_secs_f64() * 1000.0;
            if self.intervals % FPS_SAMPLE_EVERY == 0 && delta_ms > 0.0 {
                self.current.fps = (1000.0 / delta_ms).round() as u32;
            }
        }
        self.last_tick = Some(now);

        let due = self
            .published_at
            .is_none_or(|at| now.saturating_duration_since(at) >= PUBLISH_INTERVAL);
        if due {
            self.published = self.current;
            self.published_at = Some(now);
        }
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        self.published
    }
}

impl TickListener for PerformanceMonitor {
    fn on_tick(&mut self, frame: TickFrame<'_>) {
        if frame.elapsed > SLOW_TICK {
            warn!(
                tick_ms = frame.elapsed.as_secs_f64() * 1000.0,
                nodes = frame.nodes.len(),
                links = frame.links.len(),
                "slow simulation tick"
            );
        }
        self.current.alpha = frame.alpha;
        self.record(Instant::now(), frame.elapsed);
    }
}
