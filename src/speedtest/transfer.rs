//! Throughput sampling shared by the download and upload tests.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Slowest link a single request is expected to survive, in bits per second.
const MIN_LINK_BPS: u64 = 1_000_000;
const MIN_TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
const MAX_SAMPLES: usize = 200;

#[derive(Debug, Clone)]
pub struct TransferProgress {
    pub bytes: u64,
    pub total_bytes: u64,
    /// Recent per-interval speeds in Mbps, oldest first.
    pub speed_samples: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult {
    pub avg_speed_mbps: f64,
    pub bytes: u64,
}

/// Upper bound for one request moving `bytes`: the time it takes at
/// [`MIN_LINK_BPS`], never less than [`MIN_TRANSFER_TIMEOUT`].
pub fn transfer_timeout(bytes: u64) -> Duration {
    let secs = bytes.saturating_mul(8) / MIN_LINK_BPS;
    Duration::from_secs(secs).max(MIN_TRANSFER_TIMEOUT)
}

/// Megabits per second for `bytes` moved in `elapsed`.
pub fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

/// Accumulates transferred bytes and turns them into a speed sample roughly every
/// [`SAMPLE_INTERVAL`].
pub struct RateSampler {
    total_bytes: u64,
    started: Instant,
    bytes: u64,
    window_start: Instant,
    window_bytes: u64,
    samples: VecDeque<f64>,
}

impl RateSampler {
    pub fn new(total_bytes: u64, now: Instant) -> Self {
        Self {
            total_bytes,
            started: now,
            bytes: 0,
            window_start: now,
            window_bytes: 0,
            samples: VecDeque::with_capacity(MAX_SAMPLES),
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Counts `n` more bytes. Returns a progress report whenever a sampling
    /// interval has elapsed.
    pub fn add(&mut self, n: u64, now: Instant) -> Option<TransferProgress> {
        self.bytes += n;

        let interval = now.saturating_duration_since(self.window_start);
        if interval < SAMPLE_INTERVAL {
            return None;
        }

        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(mbps(self.bytes - self.window_bytes, interval));
        self.window_start = now;
        self.window_bytes = self.bytes;

        Some(TransferProgress {
            bytes: self.bytes,
            total_bytes: self.total_bytes,
            speed_samples: self.samples.iter().copied().collect(),
        })
    }

    pub fn finish(&self, now: Instant) -> TransferResult {
        TransferResult {
            avg_speed_mbps: mbps(self.bytes, now.saturating_duration_since(self.started)),
            bytes: self.bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn mbps_converts_bytes_per_second() {
        assert!(close(mbps(1_250_000, Duration::from_secs(1)), 10.0));
        assert_eq!(mbps(1_000, Duration::ZERO), 0.0);
    }

    #[test]
    fn timeout_scales_with_size() {
        assert_eq!(transfer_timeout(1_000_000), MIN_TRANSFER_TIMEOUT);
        // 100 MB still finishes on a 1 Mbps link.
        assert_eq!(transfer_timeout(100_000_000), Duration::from_secs(800));
        assert_eq!(transfer_timeout(500_000_000), Duration::from_secs(4000));
    }

    #[test]
    fn reports_once_per_interval() {
        let start = Instant::now();
        let mut sampler = RateSampler::new(10_000_000, start);

        assert!(sampler.add(500_000, start + Duration::from_millis(50)).is_none());
        let progress = sampler.add(750_000, start + Duration::from_millis(100)).unwrap();

        assert_eq!(progress.bytes, 1_250_000);
        assert_eq!(progress.total_bytes, 10_000_000);
        assert_eq!(progress.speed_samples.len(), 1);
        assert!(close(progress.speed_samples[0], 100.0));

        let result = sampler.finish(start + Duration::from_secs(1));
        assert_eq!(result.bytes, 1_250_000);
        assert!(close(result.avg_speed_mbps, 10.0));
    }

    #[test]
    fn keeps_a_bounded_window() {
        let start = Instant::now();
        let mut sampler = RateSampler::new(0, start);
        let mut last = None;
        for i in 1..=250u64 {
            last = sampler.add(1_000, start + SAMPLE_INTERVAL * i as u32);
        }
        assert_eq!(last.unwrap().speed_samples.len(), MAX_SAMPLES);
    }
}
