mod app;
mod args;
mod error;
mod history;
mod i18n;
mod logging;
mod netinfo;
mod orchestrator;
mod settings;
mod share;
mod speedtest;
mod ui;

use anyhow::{Context, Result};
use app::{poll_event, App, AppAction, TaskResult};
use args::Args;
use clap::Parser;
use crossterm::event::Event;
use error::StoreError;
use history::{ExportFormat, ResultStore};
use i18n::{Language, Msg};
use netinfo::IpInfoClient;
use orchestrator::{Orchestrator, RunHandle, RunOptions, TestUpdate};
use ratatui::DefaultTerminal;
use settings::Settings;
use share::SmtpMailer;
use speedtest::client::HttpBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use ui::draw_ui;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(server) = args.server.clone() {
        settings.test.server = Some(server);
    }
    if let Some(language) = args.language {
        settings.ui.language = language;
    }
    if let Some(theme) = args.theme {
        settings.ui.theme = theme;
    }

    if let Some(path) = &args.log_file {
        logging::init_logger(args.log_level, path)
            .with_context(|| format!("could not open log file {}", path.display()))?;
    }

    let (history, load_error) = match ResultStore::load(&settings.files.history) {
        Ok(store) => (store, None),
        Err(e) => {
            log::warn!("starting with an empty history: {}", e);
            if matches!(e, StoreError::Json(_)) {
                match ResultStore::set_aside(&settings.files.history) {
                    Ok(moved) => log::warn!("kept the unreadable history as {}", moved.display()),
                    Err(err) => log::warn!("{}", err),
                }
            }
            (ResultStore::new(&settings.files.history), Some(e))
        }
    };
    log::info!("loaded {} results from {}", history.len(), history.path().display());

    let backend = Arc::new(HttpBackend::new(&settings.test)?);
    let lookup = Arc::new(IpInfoClient::new(
        settings.lookup.url.clone(),
        Duration::from_secs(settings.lookup.timeout_secs),
    ));
    let orchestrator = Orchestrator::new(
        backend.clone(),
        lookup,
        history,
        settings.test.server.clone(),
        RunOptions::from(&settings.test),
    );

    if args.once {
        return run_once(&orchestrator, settings.ui.language).await;
    }

    let mut app = App::new(settings, orchestrator.history());
    if let Some(e) = load_error {
        app.show_store_error(&e);
    }

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal, app, &orchestrator, &backend).await;

    ratatui::restore();
    result
}

/// Runs one measurement without the UI, printing progress to stderr and the
/// result to stdout.
async fn run_once(orchestrator: &Orchestrator, lang: Language) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(64);
    let (cancel_tx, cancel_rx) = mpsc::channel(1);

    // Ends once the run drops its sender.
    let printer = async move {
        loop {
            tokio::select! {
                update = rx.recv() => match update {
                    Some(update) => print_update(&update, lang),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    let _ = cancel_tx.try_send(());
                }
            }
        }
    };

    let (outcome, ()) = tokio::join!(orchestrator.run_measurement(tx, cancel_rx), printer);
    let outcome = outcome?;
    println!("{}", share::share_text(&outcome.measurement, lang));
    println!("{}", outcome.info.display(lang));
    Ok(())
}

fn print_update(update: &TestUpdate, lang: Language) {
    match update {
        TestUpdate::Phase(phase) => eprintln!("{}", lang.text(phase.status())),
        TestUpdate::ServerSelected(server) => eprintln!("  {}", server.label()),
        TestUpdate::PingComplete { avg_ms, .. } => {
            eprintln!("  {}", lang.format(Msg::Ping, &[&format!("{:.1}", avg_ms)]));
        }
        TestUpdate::DownloadComplete { speed_mbps } => {
            eprintln!("  {}", lang.format(Msg::DownloadSpeed, &[&format!("{:.2}", speed_mbps)]));
        }
        TestUpdate::UploadComplete { speed_mbps } => {
            eprintln!("  {}", lang.format(Msg::UploadSpeed, &[&format!("{:.2}", speed_mbps)]));
        }
        _ => {}
    }
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    mut app: App,
    orchestrator: &Orchestrator,
    backend: &HttpBackend,
) -> Result<()> {
    let mut test_rx: Option<mpsc::Receiver<TestUpdate>> = None;
    let mut run: Option<RunHandle> = None;
    let (task_tx, mut task_rx) = mpsc::channel::<TaskResult>(8);

    loop {
        terminal.draw(|frame| draw_ui(frame, &app))?;

        // Handle test updates
        if let Some(rx) = test_rx.as_mut() {
            let mut closed = false;
            loop {
                match rx.try_recv() {
                    Ok(update) => {
                        if matches!(update, TestUpdate::Completed(_) | TestUpdate::Failed(_)) {
                            run = None;
                        }
                        app.apply_update(update);
                    }
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
            if closed {
                test_rx = None;
                run = None;
            }
        }

        while let Ok(result) = task_rx.try_recv() {
            app.apply_task(result);
        }

        // Handle input
        if let Some(Event::Key(key)) = poll_event(Duration::from_millis(30))? {
            if let Some(action) = app.handle_key_event(key) {
                match action {
                    AppAction::Quit => {
                        if let Some(handle) = run.take().filter(|_| orchestrator.is_running()) {
                            log::info!("quitting during a run, cancelling it");
                            // Nobody reads updates any more; let the run's sends fail.
                            drop(test_rx.take());
                            handle.cancel();
                            let _ = handle.join().await;
                        }
                        break;
                    }
                    AppAction::StartTest => {
                        let (tx, rx) = mpsc::channel(64);
                        match orchestrator.start(tx) {
                            Ok(handle) => {
                                app.reset_for_new_test();
                                run = Some(handle);
                                test_rx = Some(rx);
                            }
                            Err(e) => app.show_test_error(&e),
                        }
                    }
                    AppAction::CancelTest => {
                        if let Some(handle) = &run {
                            handle.cancel();
                        }
                    }
                    AppAction::FetchServers => {
                        let orchestrator = orchestrator.clone();
                        let task_tx = task_tx.clone();
                        tokio::spawn(async move {
                            let servers = orchestrator.list_servers().await;
                            let _ = task_tx.send(TaskResult::Servers(servers)).await;
                        });
                    }
                    AppAction::SelectServer(id) => {
                        orchestrator.select_server(id);
                        app.selected_server = orchestrator.selected_server();
                        match app.selected_server.clone() {
                            Some(id) => {
                                let body = app.language.format(Msg::ServerSelectedBody, &[&id]);
                                app.show_info(Msg::ServerSelected, body);
                            }
                            None => {
                                let body = app.text(Msg::ServerAuto).to_string();
                                app.show_info(Msg::ServerSelected, body);
                            }
                        }
                    }
                    AppAction::Export(format) => export(&mut app, orchestrator, format),
                    AppAction::ShareText => match orchestrator.with_history(share::latest) {
                        Ok(m) => {
                            let body = share::social_message(&m, app.language);
                            app.show_info(Msg::ShareResults, body);
                        }
                        Err(_) => app.show_no_data(),
                    },
                    AppAction::SendEmail(to) => {
                        let latest = orchestrator.with_history(share::latest);
                        let email = app.settings.email.clone();
                        let lang = app.language;
                        let task_tx = task_tx.clone();
                        tokio::spawn(async move {
                            let result = async {
                                let m = latest?;
                                let mailer = SmtpMailer::from_settings(&email)?;
                                share::email_results(&mailer, &to, &m, lang).await
                            }
                            .await;
                            if let Err(e) = &result {
                                log::warn!("email failed: {}", e);
                            }
                            let _ = task_tx.send(TaskResult::Email(result)).await;
                        });
                    }
                    AppAction::SettingsChanged => backend.configure(&app.settings.test),
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn export(app: &mut App, orchestrator: &Orchestrator, format: ExportFormat) {
    let path = match format {
        ExportFormat::Csv => app.settings.files.csv_export.clone(),
        ExportFormat::Json => app.settings.files.json_export.clone(),
    };
    let lang = app.language;

    match orchestrator.with_history(|store| store.export(format, &path, lang)) {
        Ok(()) => {
            let body = lang.format(Msg::Exported, &[&path.display()]);
            app.show_info(Msg::Export, body);
        }
        Err(e) => app.show_store_error(&e),
    }
}
