use crate::i18n::Language;
use crate::ui::theme::ThemeKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "speedboard";
const CONFIG_FILE: &str = "config.toml";

/// Everything read from `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub test: TestSettings,
    pub files: FileSettings,
    pub lookup: LookupSettings,
    pub email: EmailSettings,
    pub ui: UiSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSettings {
    pub ping_count: usize,
    pub download_size_mb: u64,
    pub upload_size_mb: u64,
    /// Upper bound for a whole run, server selection included. Unset means no limit.
    pub timeout_secs: Option<u64>,
    /// Server id to use instead of best-server discovery.
    pub server: Option<String>,
    /// How many catalog entries are probed when picking the best server.
    pub candidate_servers: usize,
    pub catalog_url: String,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            ping_count: 30,
            download_size_mb: 100,
            upload_size_mb: 50,
            timeout_secs: None,
            server: None,
            candidate_servers: 5,
            catalog_url: "https://www.speedtest.net/api/js/servers?engine=js&https_functional=true&limit=10"
                .to_string(),
        }
    }
}

impl TestSettings {
    pub fn download_size_bytes(&self) -> u64 {
        self.download_size_mb * 1_000_000
    }

    pub fn upload_size_bytes(&self) -> usize {
        (self.upload_size_mb * 1_000_000) as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub history: PathBuf,
    pub csv_export: PathBuf,
    pub json_export: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            history: PathBuf::from("speed_results.json"),
            csv_export: PathBuf::from("speed_results.csv"),
            json_export: PathBuf::from("speed_results_export.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            url: "https://ipinfo.io/json".to_string(),
            timeout_secs: 5,
        }
    }
}

/// SMTP account used for sharing by email. The password is never stored here,
/// only the name of the environment variable holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub from: Option<String>,
    pub password_env: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            username: None,
            from: None,
            password_env: "SPEEDBOARD_SMTP_PASSWORD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub language: Language,
    pub theme: ThemeKind,
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads settings from `path`, or from the default location when `path` is `None`.
    ///
    /// An explicitly given file must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(text)?;
        settings.test.clamp();
        Ok(settings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    PingCount,
    DownloadSize,
    UploadSize,
}

impl SettingsField {
    pub const ALL: [SettingsField; 3] = [
        SettingsField::PingCount,
        SettingsField::DownloadSize,
        SettingsField::UploadSize,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// `(step, min, max)` used by the settings view.
    fn range(self) -> (u64, u64, u64) {
        match self {
            SettingsField::PingCount => (5, 1, 100),
            SettingsField::DownloadSize => (25, 1, 500),
            SettingsField::UploadSize => (25, 1, 250),
        }
    }
}

impl TestSettings {
    pub fn get(&self, field: SettingsField) -> u64 {
        match field {
            SettingsField::PingCount => self.ping_count as u64,
            SettingsField::DownloadSize => self.download_size_mb,
            SettingsField::UploadSize => self.upload_size_mb,
        }
    }

    /// Moves `field` one step up or down, clamped to its range.
    pub fn step(&mut self, field: SettingsField, up: bool) {
        let (step, min, max) = field.range();
        let current = self.get(field);
        let value = if up {
            current.saturating_add(step).min(max)
        } else {
            current.saturating_sub(step).max(min)
        };

        self.set(field, value);
    }

    fn set(&mut self, field: SettingsField, value: u64) {
        match field {
            SettingsField::PingCount => self.ping_count = value as usize,
            SettingsField::DownloadSize => self.download_size_mb = value,
            SettingsField::UploadSize => self.upload_size_mb = value,
        }
    }

    /// Pulls values read from a file into the ranges the settings view allows.
    fn clamp(&mut self) {
        for field in SettingsField::ALL {
            let (_, min, max) = field.range();
            let value = self.get(field);
            let clamped = value.clamp(min, max);
            if clamped != value {
                log::warn!("{:?} = {} is out of range, using {}", field, value, clamped);
                self.set(field, clamped);
            }
        }
        self.candidate_servers = self.candidate_servers.max(1);
        if self.timeout_secs == Some(0) {
            log::warn!("timeout_secs = 0 would fail every run, ignoring it");
            self.timeout_secs = None;
        }
    }
}
