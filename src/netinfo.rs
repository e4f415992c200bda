//! Public address lookup.
//!
//! Uses ipinfo.io to find the caller's address, organization and location. The lookup
//! is best-effort: any failure yields an empty [`NetworkInfo`] and never fails a run.

use crate::i18n::{Language, Msg};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Response from ipinfo.io. Each field may be missing on its own.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NetworkInfo {
    pub ip: Option<String>,
    pub org: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl NetworkInfo {
    /// Renders the status line, substituting the localized placeholder for each
    /// unknown field.
    pub fn display(&self, lang: Language) -> String {
        let unknown = lang.text(Msg::Unknown);
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| unknown.to_string());
        lang.format(
            Msg::IpLine,
            &[
                &field(&self.ip),
                &field(&self.org),
                &field(&self.city),
                &field(&self.country),
            ],
        )
    }
}

#[async_trait]
pub trait NetworkLookup: Send + Sync {
    async fn lookup(&self) -> NetworkInfo;
}

pub struct IpInfoClient {
    url: String,
    timeout: Duration,
}

impl IpInfoClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    async fn fetch(&self) -> Result<NetworkInfo, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let response = client.get(&self.url).send().await?;
        if !response.status().is_success() {
            log::warn!("{} returned status {}", self.url, response.status());
        }
        response.error_for_status()?.json().await
    }
}

#[async_trait]
impl NetworkLookup for IpInfoClient {
    async fn lookup(&self) -> NetworkInfo {
        match self.fetch().await {
            Ok(info) => info,
            Err(e) => {
                log::warn!("network info lookup failed: {}", e);
                NetworkInfo::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_payload() {
        let info: NetworkInfo = serde_json::from_str(
            r#"{"ip": "203.0.113.9", "hostname": "x", "city": "Lyon", "loc": "45.7,4.8"}"#,
        )
        .unwrap();
        assert_eq!(info.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(info.org, None);
        assert_eq!(info.city.as_deref(), Some("Lyon"));
    }

    #[test]
    fn unknown_fields_degrade_independently() {
        let info = NetworkInfo {
            ip: Some("203.0.113.9".to_string()),
            org: None,
            city: Some("Lyon".to_string()),
            country: None,
        };
        assert_eq!(
            info.display(Language::English),
            "IP: 203.0.113.9 | ISP: Unknown (Lyon, Unknown)"
        );
        assert_eq!(
            NetworkInfo::default().display(Language::French),
            "IP : Inconnu | FAI : Inconnu (Inconnu, Inconnu)"
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_placeholders() {
        // Port 9 on loopback is the discard port; nothing listens there in CI.
        let client = IpInfoClient::new("http://127.0.0.1:9/json", Duration::from_millis(500));
        assert_eq!(client.lookup().await, NetworkInfo::default());
    }
}
