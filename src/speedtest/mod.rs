pub mod client;
pub mod download;
pub mod ping;
pub mod server;
pub mod transfer;
pub mod upload;

use crate::error::TestError;
use crate::i18n::Msg;
use async_trait::async_trait;
use ping::{PingProgress, PingResult};
use serde::{Deserialize, Serialize};
use server::Server;
use transfer::{TransferProgress, TransferResult};
use tokio::sync::mpsc;

/// One completed download/upload/ping sample.
///
/// Serialized as a bare `[download, upload, ping]` array so the history file stays a
/// plain list of three-tuples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64, f64)", into = "(f64, f64, f64)")]
pub struct Measurement {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
}

impl Measurement {
    pub fn new(download_mbps: f64, upload_mbps: f64, ping_ms: f64) -> Self {
        Self {
            download_mbps,
            upload_mbps,
            ping_ms,
        }
    }

    /// Builds a measurement from raw rates, rounding the way results are reported:
    /// two decimals for throughput, three for latency.
    pub fn from_raw(download_mbps: f64, upload_mbps: f64, ping_ms: f64) -> Self {
        Self::new(
            round_to(download_mbps, 2),
            round_to(upload_mbps, 2),
            round_to(ping_ms, 3),
        )
    }
}

impl From<(f64, f64, f64)> for Measurement {
    fn from((download_mbps, upload_mbps, ping_ms): (f64, f64, f64)) -> Self {
        Self::new(download_mbps, upload_mbps, ping_ms)
    }
}

impl From<Measurement> for (f64, f64, f64) {
    fn from(m: Measurement) -> Self {
        (m.download_mbps, m.upload_mbps, m.ping_ms)
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Live figures shown while a test is running.
#[derive(Debug, Clone, Default)]
pub struct SpeedTestResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub jitter_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Idle,
    SelectingServer,
    Ping,
    Download,
    Upload,
    Lookup,
    Complete,
}

impl TestPhase {
    pub fn is_running(self) -> bool {
        !matches!(self, TestPhase::Idle | TestPhase::Complete)
    }

    /// Status line shown for this phase.
    pub fn status(self) -> Msg {
        match self {
            TestPhase::Idle => Msg::Ready,
            TestPhase::SelectingServer => Msg::SelectingServer,
            TestPhase::Ping => Msg::MeasuringLatency,
            TestPhase::Download => Msg::TestingDownload,
            TestPhase::Upload => Msg::TestingUpload,
            TestPhase::Lookup => Msg::LookingUp,
            TestPhase::Complete => Msg::Complete,
        }
    }
}

/// The measurement session: server discovery plus the three samples.
///
/// `list_servers` failures are reported as [`TestError::Connection`]; everything
/// else as [`TestError::Other`].
#[async_trait]
pub trait SpeedBackend: Send + Sync {
    /// Fetches the server catalog. `search` narrows it to a server id.
    async fn list_servers(&self, search: Option<&str>) -> Result<Vec<Server>, TestError>;

    /// Single round trip used to rank candidate servers.
    async fn probe_latency(&self, server: &Server) -> Result<f64, TestError>;

    async fn ping(
        &self,
        server: &Server,
        progress_tx: mpsc::Sender<PingProgress>,
    ) -> Result<PingResult, TestError>;

    async fn download(
        &self,
        server: &Server,
        progress_tx: mpsc::Sender<TransferProgress>,
    ) -> Result<TransferResult, TestError>;

    async fn upload(
        &self,
        server: &Server,
        progress_tx: mpsc::Sender<TransferProgress>,
    ) -> Result<TransferResult, TestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_serializes_as_triple() {
        let m = Measurement::new(50.2, 10.1, 15.0);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[50.2,10.1,15.0]");

        let back: Measurement = serde_json::from_str("[48.0, 9.8, 20]").unwrap();
        assert_eq!(back, Measurement::new(48.0, 9.8, 20.0));
    }

    #[test]
    fn from_raw_rounds_like_reported_results() {
        let m = Measurement::from_raw(93.456_78, 12.344_9, 17.123_456);
        assert_eq!(m.download_mbps, 93.46);
        assert_eq!(m.upload_mbps, 12.34);
        assert_eq!(m.ping_ms, 17.123);
    }

    #[test]
    fn only_idle_and_complete_are_at_rest() {
        assert!(!TestPhase::Idle.is_running());
        assert!(!TestPhase::Complete.is_running());
        assert!(TestPhase::SelectingServer.is_running());
        assert!(TestPhase::Lookup.is_running());
    }
}
