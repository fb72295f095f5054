use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::app::{App, AppMode, StatusLevel};

pub fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let palette = app.theme().palette();

    let mut title_spans = vec![Span::styled(
        " procview ",
        Style::default()
            .fg(palette.table_header)
            .add_modifier(Modifier::BOLD),
    )];

    if let Some((message, level)) = app.status_message() {
        let (dot, color) = match level {
            StatusLevel::Ok => ("●", palette.status_ok),
            StatusLevel::Error => ("●", palette.status_error),
            StatusLevel::Muted => ("○", palette.text_dim),
        };
        title_spans.push(Span::styled(format!("{dot} "), Style::default().fg(color)));
        title_spans.push(Span::styled(
            message.clone(),
            Style::default().fg(palette.text_normal),
        ));
    }

    if let Some(updated) = app.last_updated() {
        title_spans.push(Span::styled(
            format!("  Updated {}", updated.format("%H:%M:%S")),
            Style::default().fg(palette.text_dim),
        ));
    }

    let auto = if app.auto_refresh_enabled() {
        format!("auto {}s", app.auto_refresh_secs().unwrap_or_default())
    } else {
        "auto off".to_string()
    };
    title_spans.push(Span::styled(
        format!("  [{auto}]"),
        Style::default().fg(palette.text_dim),
    ));

    if app.collect_in_flight() {
        title_spans.push(Span::styled(
            "  Collecting…",
            Style::default().fg(palette.text_dim),
        ));
    }

    let mut lines = vec![Line::from(title_spans)];

    let mut filter_spans = vec![Span::styled(
        format!(
            " {} of {} rows ",
            app.filtered_count(),
            app.snapshot_len()
        ),
        Style::default().fg(palette.text_dim),
    )];
    if !app.search_query().is_empty() || app.mode() == AppMode::Search {
        filter_spans.push(input_span(
            app,
            "search: ",
            app.search_query(),
            app.mode() == AppMode::Search,
        ));
    }
    if !app.host_filter().is_empty() || app.mode() == AppMode::Host {
        filter_spans.push(input_span(
            app,
            " host: ",
            app.host_filter(),
            app.mode() == AppMode::Host,
        ));
    }
    if app.mode() == AppMode::Interval {
        filter_spans.push(input_span(app, " interval: ", app.interval_input(), true));
    }
    lines.push(Line::from(filter_spans));

    frame.render_widget(Paragraph::new(lines), area);
}

fn input_span(app: &App, label: &str, value: &str, active: bool) -> Span<'static> {
    let palette = app.theme().palette();
    let text = if active {
        format!("{label}{value}▏")
    } else {
        format!("{label}{value}")
    };
    let style = if active {
        Style::default()
            .fg(palette.table_header)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.text_normal)
    };
    Span::styled(text, style)
}

pub fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let palette = app.theme().palette();

    let text = match app.mode() {
        AppMode::Search => " type to filter  Enter/Esc done",
        AppMode::Host => " type a hostname (exact match)  Enter/Esc done",
        AppMode::Interval => " digits only  Enter apply  Esc cancel",
        AppMode::ConfirmClear => " y confirm  n cancel",
        AppMode::Normal => {
            " ↑↓ move  ⏎/Space toggle  →/← expand/collapse  / search  h host  r refresh  c collect  a auto  i interval  d clear  q quit"
        }
    };

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(palette.text_dim),
        ))),
        area,
    );
}

pub fn render_toast(frame: &mut Frame, area: Rect, app: &App) {
    let Some(message) = app.toast() else {
        return;
    };
    let palette = app.theme().palette();

    let width = (message.chars().count() as u16 + 4).min(area.width);
    let popup = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + area.height.saturating_sub(4),
        width,
        height: 3.min(area.height),
    };

    let paragraph = Paragraph::new(Line::from(Span::styled(
        format!(" {message} "),
        Style::default()
            .fg(palette.text_normal)
            .add_modifier(Modifier::BOLD),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.table_border)),
    );

    frame.render_widget(Clear, popup);
    frame.render_widget(paragraph, popup);
}
