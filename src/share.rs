use crate::error::ShareError;
use crate::history::ResultStore;
use crate::i18n::{Language, Msg};
use crate::settings::EmailSettings;
use crate::speedtest::Measurement;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// The measurement every sharing action is about.
pub fn latest(store: &ResultStore) -> Result<Measurement, ShareError> {
    store.latest().copied().ok_or(ShareError::NoData)
}

pub fn share_text(m: &Measurement, lang: Language) -> String {
    lang.format(Msg::ShareBody, &[&m.download_mbps, &m.upload_mbps, &m.ping_ms])
}

/// Text shown for copy/paste onto social media.
pub fn social_message(m: &Measurement, lang: Language) -> String {
    lang.format(Msg::SharePrompt, &[&share_text(m, lang)])
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ShareError>;
}

pub async fn email_results<M>(
    mailer: &M,
    to: &str,
    m: &Measurement,
    lang: Language,
) -> Result<(), ShareError>
where
    M: Mailer + ?Sized,
{
    let to = to.trim();
    if to.is_empty() {
        return Err(ShareError::Address("empty address".to_string()));
    }
    mailer
        .send(to, lang.text(Msg::ChartTitle), &share_text(m, lang))
        .await?;
    log::info!("results emailed to {}", to);
    Ok(())
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds a STARTTLS mailer, reading the password from the environment variable
    /// named in the settings.
    pub fn from_settings(settings: &EmailSettings) -> Result<Self, ShareError> {
        let password = std::env::var(&settings.password_env).map_err(|_| {
            ShareError::NotConfigured(format!("set {} to the SMTP password", settings.password_env))
        })?;
        Self::new(settings, password)
    }

    pub fn new(settings: &EmailSettings, password: String) -> Result<Self, ShareError> {
        let host = settings
            .smtp_host
            .as_deref()
            .ok_or_else(|| ShareError::NotConfigured("email.smtp_host is not set".to_string()))?;
        let username = settings
            .username
            .clone()
            .ok_or_else(|| ShareError::NotConfigured("email.username is not set".to_string()))?;
        let from = settings
            .from
            .as_deref()
            .unwrap_or(username.as_str())
            .parse::<Mailbox>()
            .map_err(|e| ShareError::Address(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| ShareError::NotConfigured(e.to_string()))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ShareError> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| ShareError::Address(e.to_string()))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ShareError::Send(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ShareError::Send(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ShareError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[test]
    fn share_text_uses_latest_result() {
        let mut store = ResultStore::new("unused.json");
        store.append(Measurement::new(50.2, 10.1, 15.0));
        store.append(Measurement::new(48.0, 9.8, 20.0));

        let m = latest(&store).unwrap();
        assert_eq!(
            share_text(&m, Language::English),
            "Download: 48 Mbps\nUpload: 9.8 Mbps\nPing: 20 ms"
        );
        assert!(social_message(&m, Language::English)
            .starts_with("Copy the results and share them on your social media:\n\nDownload: 48"));
    }

    #[test]
    fn empty_history_has_nothing_to_share() {
        let store = ResultStore::new("unused.json");
        assert!(matches!(latest(&store), Err(ShareError::NoData)));
    }

    #[tokio::test]
    async fn email_sends_share_text() {
        let mailer = RecordingMailer::default();
        let m = Measurement::new(50.2, 10.1, 15.0);

        email_results(&mailer, " friend@example.com ", &m, Language::English)
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "friend@example.com");
        assert_eq!(sent[0].1, "Internet Speed Test Results");
        assert_eq!(sent[0].2, "Download: 50.2 Mbps\nUpload: 10.1 Mbps\nPing: 15 ms");
    }

    #[tokio::test]
    async fn blank_address_is_rejected() {
        let mailer = RecordingMailer::default();
        let m = Measurement::new(1.0, 1.0, 1.0);
        let err = email_results(&mailer, "   ", &m, Language::English).await.unwrap_err();
        assert!(matches!(err, ShareError::Address(_)));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn smtp_requires_a_host() {
        let settings = EmailSettings::default();
        let err = SmtpMailer::new(&settings, "secret".to_string()).err().unwrap();
        assert!(matches!(err, ShareError::NotConfigured(_)));
    }
}
