use crate::error::{ShareError, StoreError, TestError};
use crate::history::ExportFormat;
use crate::i18n::{Language, Msg};
use crate::netinfo::NetworkInfo;
use crate::orchestrator::{RunOutcome, TestUpdate};
use crate::settings::{Settings, SettingsField};
use crate::speedtest::{
    ping::PingProgress, server::Server, transfer::TransferProgress, Measurement, SpeedTestResult,
    TestPhase,
};
use crate::ui::theme::ThemeKind;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::time::{Duration, Instant};

/// How long the progress bar stays full after a run completes.
const PROGRESS_HOLD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Main,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Dialog {
    pub kind: DialogKind,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    ServerId,
    Email,
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
    /// Extra lines shown above the input, e.g. the server catalog.
    pub hints: Vec<String>,
}

/// Results of background work other than the measurement itself.
pub enum TaskResult {
    Servers(Result<Vec<Server>, TestError>),
    Email(Result<(), ShareError>),
}

pub struct App {
    pub phase: TestPhase,
    pub result: SpeedTestResult,
    pub should_quit: bool,

    // UI state
    pub view: AppView,
    pub language: Language,
    pub theme: ThemeKind,
    pub dialog: Option<Dialog>,
    pub prompt: Option<Prompt>,

    // Settings
    pub settings: Settings,
    pub selected_setting: SettingsField,

    // Progress tracking
    pub download_progress: f64,
    pub upload_progress: f64,
    completed_at: Option<Instant>,

    // Speed samples for charts
    pub download_samples: Vec<f64>,
    pub upload_samples: Vec<f64>,
    pub ping_samples: Vec<f64>,

    /// Display copy of the recorded history, in test order.
    pub history: Vec<Measurement>,
    pub network: Option<NetworkInfo>,
    pub server: Option<Server>,
    pub selected_server: Option<String>,
}

impl App {
    pub fn new(settings: Settings, history: Vec<Measurement>) -> Self {
        Self {
            phase: TestPhase::Idle,
            result: SpeedTestResult::default(),
            should_quit: false,
            view: AppView::Main,
            language: settings.ui.language,
            theme: settings.ui.theme,
            dialog: None,
            prompt: None,
            selected_server: settings.test.server.clone(),
            settings,
            selected_setting: SettingsField::PingCount,
            download_progress: 0.0,
            upload_progress: 0.0,
            completed_at: None,
            download_samples: Vec::new(),
            upload_samples: Vec::new(),
            ping_samples: Vec::new(),
            history,
            network: None,
            server: None,
        }
    }

    pub fn text(&self, msg: Msg) -> &'static str {
        self.language.text(msg)
    }

    pub fn handle_key_event(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        if self.dialog.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q')) {
                self.dialog = None;
            }
            return None;
        }

        if self.prompt.is_some() {
            return self.handle_prompt_key(key);
        }

        match self.view {
            AppView::Main => self.handle_main_key(key),
            AppView::Settings => self.handle_settings_key(key),
        }
    }

    fn handle_main_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        let running = self.phase.is_running();

        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Some(AppAction::Quit)
            }
            KeyCode::Enter if !running => Some(AppAction::StartTest),
            KeyCode::Esc if running => Some(AppAction::CancelTest),
            KeyCode::Char('s') if !running => {
                self.view = AppView::Settings;
                None
            }
            KeyCode::Char('v') if !running => Some(AppAction::FetchServers),
            KeyCode::Char('e') => Some(AppAction::Export(ExportFormat::Csv)),
            KeyCode::Char('j') => Some(AppAction::Export(ExportFormat::Json)),
            KeyCode::Char('h') => Some(AppAction::ShareText),
            KeyCode::Char('m') => {
                if self.history.is_empty() {
                    self.show_no_data();
                } else {
                    self.prompt = Some(Prompt {
                        kind: PromptKind::Email,
                        input: String::new(),
                        hints: Vec::new(),
                    });
                }
                None
            }
            KeyCode::Char('t') => {
                self.theme = self.theme.toggle();
                None
            }
            KeyCode::Char(c @ '1'..='3') => {
                let index = c as usize - '1' as usize;
                self.language = Language::ALL[index];
                None
            }
            _ => None,
        }
    }

    fn handle_prompt_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        let prompt = self.prompt.as_mut()?;
        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
                None
            }
            KeyCode::Enter => {
                let prompt = self.prompt.take()?;
                let input = prompt.input.trim().to_string();
                match prompt.kind {
                    PromptKind::ServerId => Some(AppAction::SelectServer(
                        Some(input).filter(|s| !s.is_empty()),
                    )),
                    PromptKind::Email if input.is_empty() => None,
                    PromptKind::Email => Some(AppAction::SendEmail(input)),
                }
            }
            KeyCode::Backspace => {
                prompt.input.pop();
                None
            }
            KeyCode::Char(c) => {
                prompt.input.push(c);
                None
            }
            _ => None,
        }
    }

    fn handle_settings_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => {
                self.view = AppView::Main;
                Some(AppAction::SettingsChanged)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_setting = self.selected_setting.prev();
                None
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.selected_setting = self.selected_setting.next();
                None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.settings.test.step(self.selected_setting, false);
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.settings.test.step(self.selected_setting, true);
                None
            }
            _ => None,
        }
    }

    pub fn reset_for_new_test(&mut self) {
        self.phase = TestPhase::SelectingServer;
        self.result = SpeedTestResult::default();
        self.download_progress = 0.0;
        self.upload_progress = 0.0;
        self.completed_at = None;
        self.download_samples.clear();
        self.upload_samples.clear();
        self.ping_samples.clear();
        self.network = None;
        self.server = None;
    }

    pub fn apply_update(&mut self, update: TestUpdate) {
        match update {
            TestUpdate::Phase(phase) => self.phase = phase,
            TestUpdate::ServerSelected(server) => self.server = Some(server),
            TestUpdate::PingProgress(p) => self.update_ping_progress(p),
            TestUpdate::PingComplete { avg_ms, jitter_ms } => {
                self.result.ping_ms = avg_ms;
                self.result.jitter_ms = jitter_ms;
            }
            TestUpdate::DownloadProgress(p) => self.update_download_progress(p),
            TestUpdate::DownloadComplete { speed_mbps } => {
                self.result.download_mbps = speed_mbps;
                self.download_progress = 1.0;
            }
            TestUpdate::UploadProgress(p) => self.update_upload_progress(p),
            TestUpdate::UploadComplete { speed_mbps } => {
                self.result.upload_mbps = speed_mbps;
                self.upload_progress = 1.0;
            }
            TestUpdate::Completed(outcome) => self.complete_test(outcome),
            TestUpdate::Failed(err) => {
                self.phase = TestPhase::Idle;
                self.show_test_error(&err);
            }
        }
    }

    pub fn apply_task(&mut self, result: TaskResult) {
        match result {
            TaskResult::Servers(Ok(servers)) if servers.is_empty() => {
                self.show_error(self.text(Msg::NoServers).to_string());
            }
            TaskResult::Servers(Ok(servers)) => {
                self.prompt = Some(Prompt {
                    kind: PromptKind::ServerId,
                    input: self.selected_server.clone().unwrap_or_default(),
                    hints: servers.iter().map(Server::label).collect(),
                });
            }
            TaskResult::Servers(Err(TestError::Connection(_))) => {
                self.show_error(self.text(Msg::ServerListError).to_string());
            }
            TaskResult::Servers(Err(err)) => self.show_test_error(&err),
            TaskResult::Email(Ok(())) => {
                self.show_info(Msg::Success, self.text(Msg::EmailSent).to_string());
            }
            TaskResult::Email(Err(err)) => {
                let body = self.language.format(Msg::EmailFailed, &[&err]);
                self.show_error(body);
            }
        }
    }

    pub fn update_ping_progress(&mut self, progress: PingProgress) {
        if let Some(ping) = progress.latest_ping {
            self.ping_samples.push(ping);
            // Keep last 100 samples
            if self.ping_samples.len() > 100 {
                self.ping_samples.remove(0);
            }
        }
    }

    pub fn update_download_progress(&mut self, progress: TransferProgress) {
        self.download_progress = ratio(progress.bytes, progress.total_bytes);
        self.download_samples = progress.speed_samples;
    }

    pub fn update_upload_progress(&mut self, progress: TransferProgress) {
        self.upload_progress = ratio(progress.bytes, progress.total_bytes);
        self.upload_samples = progress.speed_samples;
    }

    fn complete_test(&mut self, outcome: RunOutcome) {
        let m = outcome.measurement;
        self.result.download_mbps = m.download_mbps;
        self.result.upload_mbps = m.upload_mbps;
        self.result.ping_ms = m.ping_ms;
        self.history.push(m);
        self.network = Some(outcome.info);
        self.server = Some(outcome.server);
        self.phase = TestPhase::Complete;
        self.completed_at = Some(Instant::now());
        self.show_info(Msg::TestComplete, self.text(Msg::TestCompleteBody).to_string());
    }

    /// Overall progress across the phases of a run.
    pub fn overall_progress(&self, now: Instant) -> f64 {
        match self.phase {
            TestPhase::Idle => 0.0,
            TestPhase::SelectingServer => 0.05,
            TestPhase::Ping => 0.1,
            TestPhase::Download => 0.15 + 0.4 * self.download_progress,
            TestPhase::Upload => 0.55 + 0.4 * self.upload_progress,
            TestPhase::Lookup => 0.97,
            TestPhase::Complete => match self.completed_at {
                Some(at) if now.duration_since(at) < PROGRESS_HOLD => 1.0,
                _ => 0.0,
            },
        }
    }

    pub fn show_info(&mut self, title: Msg, body: String) {
        self.dialog = Some(Dialog {
            kind: DialogKind::Info,
            title: self.text(title).to_string(),
            body,
        });
    }

    pub fn show_error(&mut self, body: String) {
        self.dialog = Some(Dialog {
            kind: DialogKind::Error,
            title: self.text(Msg::Error).to_string(),
            body,
        });
    }

    pub fn show_no_data(&mut self) {
        self.dialog = Some(Dialog {
            kind: DialogKind::Error,
            title: self.text(Msg::NoData).to_string(),
            body: self.text(Msg::RunFirst).to_string(),
        });
    }

    pub fn show_test_error(&mut self, err: &TestError) {
        match err {
            TestError::Cancelled => {
                self.show_info(Msg::TestStopped, self.text(Msg::TestStoppedBody).to_string());
            }
            TestError::Connection(_) => self.show_error(self.text(Msg::ConnectionError).to_string()),
            TestError::AlreadyRunning => self.show_error(self.text(Msg::AlreadyRunning).to_string()),
            TestError::Timeout(secs) => {
                let body = self.language.format(Msg::TimedOut, &[secs]);
                self.show_error(body);
            }
            TestError::Other(msg) => {
                let body = self.language.format(Msg::GenericError, &[msg]);
                self.show_error(body);
            }
        }
    }

    pub fn show_store_error(&mut self, err: &StoreError) {
        match err {
            StoreError::NoData => self.show_no_data(),
            other => {
                let body = self.language.format(Msg::GenericError, &[other]);
                self.show_error(body);
            }
        }
    }
}

fn ratio(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (done as f64 / total as f64).min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    Quit,
    StartTest,
    CancelTest,
    FetchServers,
    SelectServer(Option<String>),
    Export(ExportFormat),
    ShareText,
    SendEmail(String),
    SettingsChanged,
}

pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        App::new(Settings::default(), Vec::new())
    }

    fn outcome() -> RunOutcome {
        RunOutcome {
            measurement: Measurement::new(50.2, 10.1, 15.0),
            info: NetworkInfo::default(),
            server: Server {
                id: "1".to_string(),
                name: "Lyon".to_string(),
                sponsor: "Example".to_string(),
                country: "France".to_string(),
                host: "sp1.example.net:8080".to_string(),
                url: "http://sp1.example.net:8080/speedtest/upload.php".to_string(),
            },
        }
    }

    #[test]
    fn enter_starts_only_when_idle() {
        let mut app = app();
        assert_eq!(app.handle_key_event(key(KeyCode::Enter)), Some(AppAction::StartTest));

        app.reset_for_new_test();
        assert_eq!(app.handle_key_event(key(KeyCode::Enter)), None);
        assert_eq!(app.handle_key_event(key(KeyCode::Esc)), Some(AppAction::CancelTest));
    }

    #[test]
    fn completion_appends_history_and_shows_dialog() {
        let mut app = app();
        app.reset_for_new_test();
        app.apply_update(TestUpdate::Completed(outcome()));

        assert_eq!(app.phase, TestPhase::Complete);
        assert_eq!(app.history, vec![Measurement::new(50.2, 10.1, 15.0)]);
        let dialog = app.dialog.as_ref().unwrap();
        assert_eq!(dialog.title, "Test Complete");
        assert_eq!(app.overall_progress(Instant::now()), 1.0);
        assert_eq!(app.overall_progress(Instant::now() + Duration::from_secs(3)), 0.0);
    }

    #[test]
    fn connection_failure_dialog_mentions_connection() {
        let mut app = app();
        app.reset_for_new_test();
        app.apply_update(TestUpdate::Failed(TestError::Connection("timeout".to_string())));

        assert_eq!(app.phase, TestPhase::Idle);
        let dialog = app.dialog.as_ref().unwrap();
        assert_eq!(dialog.kind, DialogKind::Error);
        assert!(dialog.body.contains("connection"));
        assert!(app.history.is_empty());
    }

    #[test]
    fn stop_shows_stopped_notice() {
        let mut app = app();
        app.reset_for_new_test();
        app.apply_update(TestUpdate::Failed(TestError::Cancelled));
        assert_eq!(app.dialog.as_ref().unwrap().body, "Speed test stopped by the user.");
    }

    #[test]
    fn email_without_results_reports_no_data() {
        let mut app = app();
        assert_eq!(app.handle_key_event(key(KeyCode::Char('m'))), None);
        assert!(app.prompt.is_none());
        assert_eq!(app.dialog.as_ref().unwrap().title, "No Data");
    }

    #[test]
    fn server_prompt_submits_typed_id() {
        let mut app = app();
        app.apply_task(TaskResult::Servers(Ok(vec![outcome().server])));
        assert_eq!(app.prompt.as_ref().unwrap().hints.len(), 1);

        for c in "4242".chars() {
            app.handle_key_event(key(KeyCode::Char(c)));
        }
        assert_eq!(
            app.handle_key_event(key(KeyCode::Enter)),
            Some(AppAction::SelectServer(Some("4242".to_string())))
        );
        assert!(app.prompt.is_none());
    }

    #[test]
    fn language_keys_switch_labels() {
        let mut app = app();
        app.handle_key_event(key(KeyCode::Char('3')));
        assert_eq!(app.language, Language::French);
        assert_eq!(app.text(Msg::Title), "Test de vitesse Internet");
        app.handle_key_event(key(KeyCode::Char('2')));
        assert_eq!(app.language, Language::Arabic);
    }

    #[test]
    fn settings_are_clamped() {
        let mut app = app();
        app.handle_key_event(key(KeyCode::Char('s')));
        assert_eq!(app.view, AppView::Settings);
        for _ in 0..30 {
            app.handle_key_event(key(KeyCode::Right));
        }
        assert_eq!(app.settings.test.ping_count, 100);
        assert_eq!(
            app.handle_key_event(key(KeyCode::Enter)),
            Some(AppAction::SettingsChanged)
        );
        assert_eq!(app.view, AppView::Main);
    }
}
