use super::SpeedBackend;
use crate::error::TestError;
use serde::Deserialize;

/// A speedtest.net-style server as listed by the catalog endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sponsor: String,
    #[serde(default)]
    pub country: String,
    pub host: String,
    /// Upload endpoint, e.g. `http://host:8080/speedtest/upload.php`.
    pub url: String,
}

impl Server {
    fn scheme(&self) -> &str {
        if self.url.starts_with("https://") {
            "https"
        } else {
            "http"
        }
    }

    /// Directory part of the upload URL.
    fn base_url(&self) -> &str {
        self.url
            .rsplit_once('/')
            .map(|(base, _)| base)
            .unwrap_or(&self.url)
    }

    pub fn latency_url(&self) -> String {
        format!("{}/latency.txt", self.base_url())
    }

    pub fn download_url(&self, bytes: u64, nocache: u64) -> String {
        format!(
            "{}://{}/download?nocache={}&size={}",
            self.scheme(),
            self.host,
            nocache,
            bytes
        )
    }

    pub fn upload_url(&self) -> &str {
        &self.url
    }

    pub fn label(&self) -> String {
        format!("{} - {} ({}, {})", self.id, self.sponsor, self.name, self.country)
    }
}

/// Picks the lowest-latency server among the first `candidates` entries.
///
/// Servers that fail to answer the probe are skipped; if none answer, the run cannot
/// proceed.
pub async fn best_server<B>(
    backend: &B,
    servers: &[Server],
    candidates: usize,
) -> Result<(Server, f64), TestError>
where
    B: SpeedBackend + ?Sized,
{
    let mut best: Option<(Server, f64)> = None;

    for server in servers.iter().take(candidates.max(1)) {
        match backend.probe_latency(server).await {
            Ok(latency) => {
                log::debug!("probe {} -> {:.1} ms", server.id, latency);
                if best.as_ref().map_or(true, |(_, b)| latency < *b) {
                    best = Some((server.clone(), latency));
                }
            }
            Err(e) => log::debug!("probe {} failed: {}", server.id, e),
        }
    }

    best.ok_or_else(|| TestError::Other("no reachable speedtest server".to_string()))
}

/// Resolves an explicitly chosen id against the catalog.
pub fn find_server(servers: &[Server], id: &str) -> Result<Server, TestError> {
    servers
        .iter()
        .find(|s| s.id == id)
        .cloned()
        .ok_or_else(|| TestError::Other(format!("server {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str) -> Server {
        Server {
            id: id.to_string(),
            name: "Paris".to_string(),
            sponsor: "Example ISP".to_string(),
            country: "France".to_string(),
            host: format!("speedtest{}.example.net:8080", id),
            url: format!("http://speedtest{}.example.net:8080/speedtest/upload.php", id),
        }
    }

    #[test]
    fn derives_endpoint_urls() {
        let s = server("7");
        assert_eq!(
            s.latency_url(),
            "http://speedtest7.example.net:8080/speedtest/latency.txt"
        );
        assert_eq!(
            s.download_url(1000, 42),
            "http://speedtest7.example.net:8080/download?nocache=42&size=1000"
        );
        assert_eq!(
            s.upload_url(),
            "http://speedtest7.example.net:8080/speedtest/upload.php"
        );
    }

    #[test]
    fn parses_catalog_entries() {
        let json = r#"[{
            "url": "https://sp1.example.org:8080/speedtest/upload.php",
            "lat": "48.8", "lon": "2.3", "distance": 3,
            "name": "Paris", "country": "France", "cc": "FR",
            "sponsor": "Example", "id": "24215", "preferred": 0,
            "https_functional": 1, "host": "sp1.example.org:8080"
        }]"#;
        let servers: Vec<Server> = serde_json::from_str(json).unwrap();
        assert_eq!(servers[0].id, "24215");
        assert!(servers[0].download_url(1, 1).starts_with("https://sp1.example.org:8080/"));
    }

    #[test]
    fn find_server_reports_unknown_id() {
        let servers = vec![server("1"), server("2")];
        assert_eq!(find_server(&servers, "2").unwrap().id, "2");
        let err = find_server(&servers, "9").unwrap_err();
        assert_eq!(err, TestError::Other("server 9 not found".to_string()));
    }
}
