use super::theme::Palette;
use crate::app::{App, AppView, Dialog, DialogKind, Prompt, PromptKind};
use crate::i18n::Msg;
use crate::settings::SettingsField;
use crate::speedtest::{Measurement, TestPhase};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, LineGauge, Paragraph, Wrap},
    Frame,
};
use std::time::Instant;

const MAX_HINTS: usize = 10;

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let p = app.theme.palette();

    frame.render_widget(Block::default().style(Style::default().bg(p.background)), area);

    match app.view {
        AppView::Main => draw_main_view(frame, area, app, &p),
        AppView::Settings => draw_settings_view(frame, area, app, &p),
    }

    if let Some(prompt) = &app.prompt {
        draw_prompt(frame, area, app, prompt, &p);
    } else if let Some(dialog) = &app.dialog {
        draw_dialog(frame, area, app, dialog, &p);
    }
}

fn draw_main_view(frame: &mut Frame, area: Rect, app: &App, p: &Palette) {
    let [header, panels, network, progress, history, help] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(8),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .areas(area);

    draw_header(frame, header, app, p);

    let columns = Layout::horizontal([Constraint::Ratio(1, 3); 3]).split(panels);
    for (column, metric) in columns.iter().zip(metrics(app, p)) {
        draw_metric(frame, *column, &metric, p);
    }

    let network_text = match &app.network {
        Some(info) => info.display(app.language),
        None => app.text(Msg::IpUnknown).to_string(),
    };
    frame.render_widget(
        Paragraph::new(network_text)
            .style(Style::default().fg(p.network))
            .alignment(Alignment::Center),
        network,
    );

    draw_gauge(frame, progress, app.overall_progress(Instant::now()), p.accent, p.border);
    draw_history_chart(frame, history, app, p);
    draw_help(frame, help, app, p);
}

/// Position of a phase within a run, for "already done" checks.
fn rank(phase: TestPhase) -> u8 {
    match phase {
        TestPhase::Idle => 0,
        TestPhase::SelectingServer => 1,
        TestPhase::Ping => 2,
        TestPhase::Download => 3,
        TestPhase::Upload => 4,
        TestPhase::Lookup => 5,
        TestPhase::Complete => 6,
    }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App, p: &Palette) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(p.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [title, status, steps] = Layout::horizontal([
        Constraint::Percentage(35),
        Constraint::Min(10),
        Constraint::Length(20),
    ])
    .areas(inner);

    frame.render_widget(
        Paragraph::new(app.text(Msg::Title))
            .style(Style::default().fg(p.title).add_modifier(Modifier::BOLD)),
        title,
    );

    let color = match app.phase {
        TestPhase::Idle => p.text_muted,
        TestPhase::Ping => p.ping,
        TestPhase::Download => p.download,
        TestPhase::Upload => p.upload,
        TestPhase::Lookup => p.network,
        TestPhase::SelectingServer | TestPhase::Complete => p.accent,
    };
    let mut spans = vec![Span::styled(app.text(app.phase.status()), Style::default().fg(color))];
    let target = match (&app.server, &app.selected_server) {
        (Some(server), _) => Some(server.label()),
        (None, Some(id)) => Some(format!("#{}", id)),
        (None, None) => None,
    };
    if let Some(target) = target {
        spans.push(Span::styled(format!("  ·  {}", target), Style::default().fg(p.text_muted)));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        status,
    );

    frame.render_widget(
        Paragraph::new(phase_steps(app.phase, p)).alignment(Alignment::Right),
        steps,
    );
}

fn phase_steps(phase: TestPhase, p: &Palette) -> Line<'static> {
    let steps = [
        (TestPhase::Ping, "ping"),
        (TestPhase::Download, "down"),
        (TestPhase::Upload, "up"),
    ];

    let mut spans = Vec::with_capacity(steps.len() * 2);
    for (i, (step, label)) in steps.into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" / ", Style::default().fg(p.text_muted)));
        }
        let style = if phase == step {
            Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
        } else if rank(phase) > rank(step) {
            Style::default().fg(p.text_secondary)
        } else {
            Style::default().fg(p.text_muted)
        };
        spans.push(Span::styled(label, style));
    }

    Line::from(spans)
}

/// One of the three live figures at the top of the screen.
struct Metric<'a> {
    title: &'static str,
    value: String,
    /// Shown under the value in place of a progress bar.
    detail: Option<String>,
    color: Color,
    dim: Color,
    active: bool,
    progress: f64,
    samples: &'a [f64],
}

fn metrics<'a>(app: &'a App, p: &Palette) -> [Metric<'a>; 3] {
    let ping = live(app.result.ping_ms, &app.ping_samples);
    let jitter = if app.result.jitter_ms > 0.0 {
        format!("jitter {:.1} ms", app.result.jitter_ms)
    } else {
        "jitter —".to_string()
    };

    [
        Metric {
            title: app.text(Msg::DownloadLabel),
            value: format_rate(live(app.result.download_mbps, &app.download_samples)),
            detail: None,
            color: p.download,
            dim: p.download_dim,
            active: app.phase == TestPhase::Download,
            progress: stage_progress(app.phase, TestPhase::Download, app.download_progress),
            samples: &app.download_samples,
        },
        Metric {
            title: app.text(Msg::UploadLabel),
            value: format_rate(live(app.result.upload_mbps, &app.upload_samples)),
            detail: None,
            color: p.upload,
            dim: p.upload_dim,
            active: app.phase == TestPhase::Upload,
            progress: stage_progress(app.phase, TestPhase::Upload, app.upload_progress),
            samples: &app.upload_samples,
        },
        Metric {
            title: app.text(Msg::LatencyLabel),
            value: if ping > 0.0 { format!("{:.0} ms", ping) } else { "—".to_string() },
            detail: Some(jitter),
            color: p.ping,
            dim: p.border,
            active: app.phase == TestPhase::Ping,
            progress: 0.0,
            samples: &app.ping_samples,
        },
    ]
}

fn draw_metric(frame: &mut Frame, area: Rect, metric: &Metric, p: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if metric.active { p.border_active } else { p.border }))
        .title(Span::styled(
            format!(" {} ", metric.title),
            Style::default().fg(if metric.active { metric.color } else { p.text_secondary }),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [value, detail, trend] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Min(3),
    ])
    .areas(inner);

    frame.render_widget(
        Paragraph::new(metric.value.as_str())
            .style(Style::default().fg(p.text_primary).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center),
        value,
    );

    match &metric.detail {
        Some(text) => frame.render_widget(
            Paragraph::new(text.as_str())
                .style(Style::default().fg(p.text_muted))
                .alignment(Alignment::Center),
            detail,
        ),
        None => draw_gauge(frame, detail, metric.progress, metric.color, metric.dim),
    }

    draw_trend(frame, trend, metric.samples, metric.color);
}

fn draw_gauge(frame: &mut Frame, area: Rect, ratio: f64, color: Color, dim: Color) {
    if area.width < 4 {
        return;
    }

    let gauge = LineGauge::default()
        .line_set(symbols::line::THICK)
        .filled_style(Style::default().fg(color))
        .unfilled_style(Style::default().fg(dim))
        .label("")
        .ratio(ratio.clamp(0.0, 1.0));

    frame.render_widget(gauge, area);
}

/// Braille line of recent samples, scaled to their own range.
fn draw_trend(frame: &mut Frame, area: Rect, data: &[f64], color: Color) {
    if data.is_empty() || area.width < 4 || area.height < 2 {
        return;
    }

    let (lo, hi) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let pad = (hi - lo).max(1.0) * 0.1;
    let points: Vec<(f64, f64)> = data.iter().enumerate().map(|(i, &v)| (i as f64, v)).collect();

    let chart = Chart::new(vec![Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&points)])
    .x_axis(Axis::default().bounds([0.0, data.len() as f64]))
    .y_axis(Axis::default().bounds([lo - pad, hi + pad]));

    frame.render_widget(chart, area);
}

/// Download and upload speed per recorded test, oldest first.
fn draw_history_chart(frame: &mut Frame, area: Rect, app: &App, p: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.border))
        .title(Span::styled(
            format!(" {} ", app.text(Msg::ChartTitle)),
            Style::default().fg(p.text_secondary),
        ));

    if app.history.is_empty() || area.width < 10 || area.height < 4 {
        frame.render_widget(
            Paragraph::new(app.text(Msg::RunFirst))
                .style(Style::default().fg(p.text_muted))
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
        return;
    }

    let series = |f: fn(&Measurement) -> f64| -> Vec<(f64, f64)> {
        app.history
            .iter()
            .enumerate()
            .map(|(i, m)| ((i + 1) as f64, f(m)))
            .collect()
    };
    let download = series(|m| m.download_mbps);
    let upload = series(|m| m.upload_mbps);

    let peak = app
        .history
        .iter()
        .map(|m| m.download_mbps.max(m.upload_mbps))
        .fold(1.0, f64::max);
    let y_max = peak * 1.1;
    let x_max = (app.history.len() as f64).max(2.0);
    let muted = Style::default().fg(p.text_muted);

    let chart = Chart::new(vec![
        Dataset::default()
            .name(app.text(Msg::DownloadSeries))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(p.download))
            .data(&download),
        Dataset::default()
            .name(app.text(Msg::UploadSeries))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(p.upload))
            .data(&upload),
    ])
    .block(block)
    .x_axis(
        Axis::default()
            .title(Span::styled(app.text(Msg::TestNumber), muted))
            .style(Style::default().fg(p.border))
            .bounds([1.0, x_max])
            .labels(vec![
                Span::styled("1", muted),
                Span::styled(app.history.len().to_string(), muted),
            ]),
    )
    .y_axis(
        Axis::default()
            .title(Span::styled(app.text(Msg::SpeedAxis), muted))
            .style(Style::default().fg(p.border))
            .bounds([0.0, y_max])
            .labels(vec![Span::styled("0", muted), Span::styled(format!("{:.0}", y_max), muted)]),
    );

    frame.render_widget(chart, area);
}

fn draw_settings_view(frame: &mut Frame, area: Rect, app: &App, p: &Palette) {
    let [header, body, help] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Length(1),
    ])
    .areas(area);

    let header_block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(p.border));
    frame.render_widget(
        Paragraph::new(app.text(Msg::Settings))
            .style(Style::default().fg(p.text_primary).add_modifier(Modifier::BOLD))
            .block(header_block),
        header,
    );

    let content = body.inner(Margin::new(2, 0));
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.border));
    let inner = block.inner(content);
    frame.render_widget(block, content);

    let rows = Layout::vertical([Constraint::Length(3); SettingsField::ALL.len()]).split(inner);
    for (row, field) in rows.iter().zip(SettingsField::ALL) {
        let (label, unit) = match field {
            SettingsField::PingCount => (Msg::PingSamples, ""),
            SettingsField::DownloadSize => (Msg::DownloadSize, " MB"),
            SettingsField::UploadSize => (Msg::UploadSize, " MB"),
        };
        let value = format!("{}{}", app.settings.test.get(field), unit);
        draw_setting_row(frame, *row, app.text(label), &value, app.selected_setting == field, p);
    }

    frame.render_widget(
        Paragraph::new(app.text(Msg::HelpSettings))
            .style(Style::default().fg(p.text_muted))
            .alignment(Alignment::Center),
        help,
    );
}

fn draw_setting_row(frame: &mut Frame, area: Rect, label: &str, value: &str, selected: bool, p: &Palette) {
    let [label_area, value_area] =
        Layout::horizontal([Constraint::Length(24), Constraint::Min(10)]).areas(area);

    let (label_color, value_color, value) = if selected {
        (p.accent, p.text_primary, format!("< {} >", value))
    } else {
        (p.text_secondary, p.text_muted, value.to_string())
    };

    frame.render_widget(
        Paragraph::new(format!(" {}", label)).style(Style::default().fg(label_color)),
        label_area,
    );
    frame.render_widget(
        Paragraph::new(value).style(Style::default().fg(value_color)),
        value_area,
    );
}

/// Clears `area` and draws a titled box over it, returning the space inside.
fn popup(frame: &mut Frame, area: Rect, title: &str, accent: Color, p: &Palette) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
        .style(Style::default().bg(p.background))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);

    frame.render_widget(Clear, area);
    frame.render_widget(block, area);
    inner
}

fn draw_dialog(frame: &mut Frame, area: Rect, app: &App, dialog: &Dialog, p: &Palette) {
    let accent = match dialog.kind {
        DialogKind::Info => p.accent,
        DialogKind::Error => p.error,
    };
    let height = dialog.body.lines().count() as u16 + 5;
    let inner = popup(frame, centered_rect(64, height, area), &dialog.title, accent, p);

    let [body, help] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
    frame.render_widget(
        Paragraph::new(dialog.body.as_str())
            .style(Style::default().fg(p.text_primary))
            .wrap(Wrap { trim: false }),
        body,
    );
    frame.render_widget(
        Paragraph::new(app.text(Msg::HelpDialog))
            .style(Style::default().fg(p.text_muted))
            .alignment(Alignment::Center),
        help,
    );
}

fn draw_prompt(frame: &mut Frame, area: Rect, app: &App, prompt: &Prompt, p: &Palette) {
    let (title, label) = match prompt.kind {
        PromptKind::ServerId => (Msg::SelectServer, Msg::EnterServer),
        PromptKind::Email => (Msg::ShareResults, Msg::EnterEmail),
    };
    let hint_rows = prompt.hints.len().min(MAX_HINTS) as u16;
    let inner = popup(
        frame,
        centered_rect(72, hint_rows + 7, area),
        app.text(title),
        p.accent,
        p,
    );

    let [hints, _, label_area, input, help] = Layout::vertical([
        Constraint::Length(hint_rows),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    let lines: Vec<Line> = prompt
        .hints
        .iter()
        .take(MAX_HINTS)
        .map(|h| Line::styled(h.as_str(), Style::default().fg(p.text_secondary)))
        .collect();
    frame.render_widget(Paragraph::new(lines), hints);

    frame.render_widget(
        Paragraph::new(app.text(label)).style(Style::default().fg(p.text_primary)),
        label_area,
    );
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(p.accent)),
            Span::styled(prompt.input.as_str(), Style::default().fg(p.text_primary)),
            Span::styled("_", Style::default().fg(p.accent).add_modifier(Modifier::SLOW_BLINK)),
        ])),
        input,
    );
    frame.render_widget(
        Paragraph::new(app.text(Msg::HelpPrompt))
            .style(Style::default().fg(p.text_muted))
            .alignment(Alignment::Center),
        help,
    );
}

fn draw_help(frame: &mut Frame, area: Rect, app: &App, p: &Palette) {
    let keys = if app.phase.is_running() {
        app.text(Msg::HelpRunning)
    } else {
        app.text(Msg::HelpIdle)
    };

    let line = Line::from(vec![
        Span::styled(keys, Style::default().fg(p.text_muted)),
        Span::styled(
            format!("  [{}]", app.language.native_name()),
            Style::default().fg(p.text_secondary),
        ),
    ]);
    frame.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// The final figure once known, otherwise the latest sample.
fn live(final_value: f64, samples: &[f64]) -> f64 {
    if final_value > 0.0 {
        final_value
    } else {
        samples.last().copied().unwrap_or(0.0)
    }
}

/// Progress of one transfer stage given where the run currently is.
fn stage_progress(current: TestPhase, stage: TestPhase, progress: f64) -> f64 {
    if current == stage {
        progress
    } else if rank(current) > rank(stage) {
        1.0
    } else {
        0.0
    }
}

fn format_rate(mbps: f64) -> String {
    match mbps {
        m if m >= 1000.0 => format!("{:.1} Gbps", m / 1000.0),
        m if m >= 1.0 => format!("{:.1} Mbps", m),
        m if m > 0.0 => format!("{:.0} Kbps", m * 1000.0),
        _ => "—".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{RunOutcome, TestUpdate};
    use crate::settings::Settings;
    use crate::speedtest::server::Server;
    use ratatui::{backend::TestBackend, Terminal};

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| draw_ui(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn format_rate_picks_units() {
        assert_eq!(format_rate(1500.0), "1.5 Gbps");
        assert_eq!(format_rate(50.25), "50.2 Mbps");
        assert_eq!(format_rate(0.5), "500 Kbps");
        assert_eq!(format_rate(0.0), "—");
    }

    #[test]
    fn finished_stages_read_as_full() {
        assert_eq!(stage_progress(TestPhase::Upload, TestPhase::Download, 0.3), 1.0);
        assert_eq!(stage_progress(TestPhase::Download, TestPhase::Download, 0.3), 0.3);
        assert_eq!(stage_progress(TestPhase::Ping, TestPhase::Upload, 0.3), 0.0);
        assert_eq!(stage_progress(TestPhase::Idle, TestPhase::Download, 0.3), 0.0);
    }

    #[test]
    fn centered_rect_fits_inside_area() {
        let area = Rect::new(0, 0, 40, 10);
        assert_eq!(centered_rect(20, 4, area), Rect::new(10, 3, 20, 4));
        assert_eq!(centered_rect(80, 40, area), area);
    }

    #[test]
    fn idle_screen_shows_title_and_empty_history() {
        let app = App::new(Settings::default(), Vec::new());
        let screen = render(&app);
        assert!(screen.contains("Internet Speed Test"));
        assert!(screen.contains("Run a speed test first!"));
        assert!(screen.contains("IP: N/A"));
    }

    #[test]
    fn completed_run_renders_network_line_and_dialog() {
        let mut app = App::new(Settings::default(), vec![Measurement::new(40.0, 8.0, 18.0)]);
        app.reset_for_new_test();
        app.apply_update(TestUpdate::Completed(RunOutcome {
            measurement: Measurement::new(50.2, 10.1, 15.0),
            info: Default::default(),
            server: Server {
                id: "1".to_string(),
                name: "Lyon".to_string(),
                sponsor: "Example".to_string(),
                country: "France".to_string(),
                host: "sp1.example.net:8080".to_string(),
                url: "http://sp1.example.net:8080/speedtest/upload.php".to_string(),
            },
        }));

        let screen = render(&app);
        assert!(screen.contains("IP: Unknown | ISP: Unknown (Unknown, Unknown)"));
        assert!(screen.contains("Test Complete"));
        assert!(screen.contains("50.2 Mbps"));
    }

    #[test]
    fn settings_view_lists_every_field() {
        let mut app = App::new(Settings::default(), Vec::new());
        app.view = AppView::Settings;
        let screen = render(&app);
        assert!(screen.contains("< 30 >"));
        assert!(screen.contains("100 MB"));
        assert!(screen.contains("50 MB"));
    }
}
