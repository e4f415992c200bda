use super::ping::{self, PingProgress, PingResult};
use super::server::Server;
use super::transfer::{TransferProgress, TransferResult};
use super::{download, upload, SpeedBackend};
use crate::error::TestError;
use crate::settings::TestSettings;
use async_trait::async_trait;
use rand::Rng;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
struct Sizes {
    ping_count: usize,
    download_size: u64,
    upload_size: usize,
}

impl From<&TestSettings> for Sizes {
    fn from(settings: &TestSettings) -> Self {
        Self {
            ping_count: settings.ping_count,
            download_size: settings.download_size_bytes(),
            upload_size: settings.upload_size_bytes(),
        }
    }
}

/// Talks to speedtest.net-style HTTP servers.
pub struct HttpBackend {
    client: reqwest::Client,
    catalog_url: String,
    sizes: RwLock<Sizes>,
}

impl HttpBackend {
    pub fn new(settings: &TestSettings) -> Result<Self, TestError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("speedboard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            catalog_url: settings.catalog_url.clone(),
            sizes: RwLock::new(Sizes::from(settings)),
        })
    }

    /// Applies edited sample sizes to subsequent runs.
    pub fn configure(&self, settings: &TestSettings) {
        *self.sizes.write().unwrap_or_else(PoisonError::into_inner) = Sizes::from(settings);
    }

    fn sizes(&self) -> Sizes {
        *self.sizes.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_catalog(&self, search: Option<&str>) -> Result<Vec<Server>, reqwest::Error> {
        let mut request = self.client.get(&self.catalog_url).timeout(CATALOG_TIMEOUT);
        if let Some(term) = search {
            request = request.query(&[("search", term)]);
        }
        request.send().await?.error_for_status()?.json().await
    }
}

#[async_trait]
impl SpeedBackend for HttpBackend {
    async fn list_servers(&self, search: Option<&str>) -> Result<Vec<Server>, TestError> {
        let servers = self
            .fetch_catalog(search)
            .await
            .map_err(|e| TestError::Connection(e.to_string()))?;
        if servers.is_empty() && search.is_none() {
            return Err(TestError::Connection("server catalog is empty".to_string()));
        }
        Ok(servers)
    }

    async fn probe_latency(&self, server: &Server) -> Result<f64, TestError> {
        let start = Instant::now();
        self.client
            .get(server.latency_url())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }

    async fn ping(
        &self,
        server: &Server,
        progress_tx: mpsc::Sender<PingProgress>,
    ) -> Result<PingResult, TestError> {
        let count = self.sizes().ping_count;
        ping::run(&self.client, &server.latency_url(), count, progress_tx).await
    }

    async fn download(
        &self,
        server: &Server,
        progress_tx: mpsc::Sender<TransferProgress>,
    ) -> Result<TransferResult, TestError> {
        let size = self.sizes().download_size;
        let nocache = rand::thread_rng().gen::<u64>();
        download::run(&self.client, &server.download_url(size, nocache), size, progress_tx).await
    }

    async fn upload(
        &self,
        server: &Server,
        progress_tx: mpsc::Sender<TransferProgress>,
    ) -> Result<TransferResult, TestError> {
        let data = upload::payload(self.sizes().upload_size);
        upload::run(&self.client, server.upload_url(), &data, progress_tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(catalog_url: &str) -> TestSettings {
        TestSettings {
            catalog_url: catalog_url.to_string(),
            ..TestSettings::default()
        }
    }

    #[tokio::test]
    async fn unreachable_catalog_is_a_connection_error() {
        let backend = HttpBackend::new(&settings("http://127.0.0.1:9/servers")).unwrap();
        let err = backend.list_servers(None).await.unwrap_err();
        assert!(matches!(err, TestError::Connection(_)));
    }

    #[test]
    fn configure_replaces_sizes() {
        let mut test = settings("http://127.0.0.1:9/servers");
        let backend = HttpBackend::new(&test).unwrap();
        assert_eq!(backend.sizes().download_size, 100_000_000);

        test.download_size_mb = 25;
        test.ping_count = 10;
        backend.configure(&test);
        assert_eq!(backend.sizes().download_size, 25_000_000);
        assert_eq!(backend.sizes().ping_count, 10);
    }
}
