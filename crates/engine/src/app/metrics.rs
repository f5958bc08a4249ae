use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub worst_frame_ms: f32,
    pub taps: u32,
}

/// Per-interval loop counters, emitted once per `interval`.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    ticks: u32,
    taps: u32,
    frame_time_sum: Duration,
    worst_frame: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            frames: 0,
            ticks: 0,
            taps: 0,
            frame_time_sum: Duration::ZERO,
            worst_frame: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
        self.worst_frame = self.worst_frame.max(frame_dt);
    }

    pub(crate) fn record_tick(&mut self, had_tap: bool) {
        self.ticks = self.ticks.saturating_add(1);
        if had_tap {
            self.taps = self.taps.saturating_add(1);
        }
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            self.frame_time_sum.as_secs_f32() * 1000.0 / self.frames as f32
        };
        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            worst_frame_ms: self.worst_frame.as_secs_f32() * 1000.0,
            taps: self.taps,
        };
        *self = Self::new(self.interval, now);
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_over_interval() {
        let base = Instant::now();
        let mut metrics = MetricsAccumulator::new(Duration::from_secs(1), base);
        metrics.record_frame(Duration::from_millis(10));
        metrics.record_frame(Duration::from_millis(30));
        for tick in 0..4 {
            metrics.record_tick(tick == 2);
        }

        let snapshot = metrics
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot");
        assert!((snapshot.fps - 2.0).abs() < 0.05);
        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert!((snapshot.frame_time_ms - 20.0).abs() < 0.001);
        assert!((snapshot.worst_frame_ms - 30.0).abs() < 0.001);
        assert_eq!(snapshot.taps, 1);
    }

    #[test]
    fn counters_reset_after_snapshot() {
        let base = Instant::now();
        let mut metrics = MetricsAccumulator::new(Duration::from_secs(1), base);
        metrics.record_frame(Duration::from_millis(16));
        assert!(metrics
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
        assert!(metrics.maybe_snapshot(base + Duration::from_secs(1)).is_some());

        let next = metrics
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second snapshot");
        assert_eq!(next.fps, 0.0);
        assert_eq!(next.taps, 0);
    }
}
