use crate::error::TestError;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const PING_TIMEOUT: Duration = Duration::from_secs(5);
const PING_GAP: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct PingProgress {
    /// Round trip of the request just made, if it got a reply.
    pub latest_ping: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingResult {
    pub avg_ms: f64,
    pub jitter_ms: f64,
}

/// Times `count` GETs against `url`. Lost requests are skipped; the run fails
/// only if none get a reply.
pub async fn run(
    client: &reqwest::Client,
    url: &str,
    count: usize,
    progress_tx: mpsc::Sender<PingProgress>,
) -> Result<PingResult, TestError> {
    let mut samples = Vec::with_capacity(count);

    for i in 0..count {
        let start = Instant::now();
        let reply = client
            .get(url)
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let latest_ping = match reply {
            Ok(_) => {
                let ms = start.elapsed().as_secs_f64() * 1000.0;
                samples.push(ms);
                Some(ms)
            }
            Err(e) => {
                log::debug!("ping {} to {} failed: {}", i + 1, url, e);
                None
            }
        };
        let _ = progress_tx.send(PingProgress { latest_ping }).await;

        if i + 1 < count {
            tokio::time::sleep(PING_GAP).await;
        }
    }

    if samples.is_empty() {
        return Err(TestError::Other(format!("no ping replies from {}", url)));
    }

    Ok(summarize(&samples))
}

/// Mean and sample standard deviation (jitter) of the round trips.
pub fn summarize(samples: &[f64]) -> PingResult {
    if samples.is_empty() {
        return PingResult { avg_ms: 0.0, jitter_ms: 0.0 };
    }

    let avg = samples.iter().sum::<f64>() / samples.len() as f64;
    let jitter = if samples.len() > 1 {
        let variance: f64 =
            samples.iter().map(|&x| (x - avg).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    PingResult { avg_ms: avg, jitter_ms: jitter }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_reports_mean_and_jitter() {
        let r = summarize(&[10.0, 20.0, 30.0]);
        assert_eq!(r.avg_ms, 20.0);
        assert_eq!(r.jitter_ms, 10.0);
    }

    #[test]
    fn single_sample_has_no_jitter() {
        let r = summarize(&[42.0]);
        assert_eq!(r, PingResult { avg_ms: 42.0, jitter_ms: 0.0 });
    }

    #[tokio::test]
    async fn unreachable_server_fails_after_all_attempts() {
        let client = reqwest::Client::new();
        let (tx, mut rx) = mpsc::channel(8);
        let err = run(&client, "http://127.0.0.1:9/latency.txt", 2, tx).await.unwrap_err();
        assert!(matches!(err, TestError::Other(_)));

        let mut reports = 0;
        while let Some(p) = rx.recv().await {
            assert!(p.latest_ping.is_none());
            reports += 1;
        }
        assert_eq!(reports, 2);
    }
}
