use std::cmp::min;

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::App;
use crate::tree::TreeRow;

pub fn render(frame: &mut Frame, area: Rect, app: &mut App) {
    let palette = app.theme().palette();

    let total_rows = app.tree_rows().len();
    let mut offset = app.scroll_offset();
    let visible_height = area.height.saturating_sub(2) as usize;
    let selected_index = app.selected_index().min(total_rows.saturating_sub(1));

    if visible_height > 0 && total_rows > 0 {
        if selected_index >= offset + visible_height {
            offset = selected_index + 1 - visible_height;
        } else if selected_index < offset {
            offset = selected_index;
        }
    } else {
        offset = 0;
    }
    app.set_scroll_offset(offset);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.table_border))
        .title(Line::from(vec![Span::styled(
            " Process Tree ",
            Style::default()
                .fg(palette.table_header)
                .add_modifier(Modifier::BOLD),
        )]));

    let rows = app.tree_rows();
    let lines: Vec<Line> = if rows.is_empty() {
        empty_state_lines(app.search_query())
            .into_iter()
            .map(|text| Line::from(Span::styled(text, Style::default().fg(palette.text_dim))))
            .collect()
    } else {
        let end = min(offset.saturating_add(visible_height), rows.len());
        let displayed = if offset >= end {
            &rows[0..0]
        } else {
            &rows[offset..end]
        };
        displayed
            .iter()
            .enumerate()
            .map(|(idx, row)| build_tree_line(app, row, offset + idx == selected_index))
            .collect()
    };

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);

    if rows.len() > visible_height && visible_height > 0 {
        render_scrollbar(
            frame,
            area,
            offset,
            visible_height,
            rows.len(),
            palette.table_border,
        );
    }
}

/// Empty-state body. The literal query is always quoted when non-empty.
pub fn empty_state_lines(query: &str) -> Vec<String> {
    let query = query.trim();
    let headline = if query.is_empty() {
        "No processes found.".to_string()
    } else {
        format!("No processes found for “{query}”.")
    };
    vec![
        headline,
        "Try clearing the search, or press 'r' to refresh.".to_string(),
    ]
}

/// Leading indicator is three-way: collapsed parent, expanded parent, leaf.
fn caret_glyph(row: &TreeRow) -> &'static str {
    if row.has_children {
        if row.expanded {
            "▼"
        } else {
            "▶"
        }
    } else {
        "•"
    }
}

/// One decimal place, with non-finite values rendered as 0.0.
fn format_percent(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.1}")
    } else {
        "0.0".to_string()
    }
}

fn build_tree_line(app: &App, row: &TreeRow, is_selected: bool) -> Line<'static> {
    let theme = app.theme();
    let palette = theme.palette();

    let mut spans = Vec::new();
    spans.push(Span::styled(
        format!("{}{} ", row.prefix, caret_glyph(row)),
        Style::default().fg(palette.text_dim),
    ));
    spans.push(Span::styled(
        row.name.clone(),
        Style::default().fg(palette.text_normal),
    ));
    spans.push(Span::styled(
        format!("  PID {}", row.pid),
        Style::default().fg(palette.text_dim),
    ));
    // PPID chip only when the record had a parent; a zero parent_pid reads
    // as absent, matching the backend view this replaces
    if let Some(ppid) = row.parent_pid.filter(|ppid| *ppid != 0) {
        spans.push(Span::styled(
            format!("  PPID {ppid}"),
            Style::default().fg(palette.text_dim),
        ));
    }
    spans.push(Span::styled(
        format!("  CPU {}%", format_percent(row.cpu_usage)),
        Style::default().fg(theme.cpu_color(row.cpu_usage)),
    ));
    spans.push(Span::styled(
        format!("  MEM {}%", format_percent(row.memory_usage)),
        Style::default().fg(theme.memory_color(row.memory_usage)),
    ));
    spans.push(Span::styled(
        format!("  Host {}", row.hostname),
        Style::default().fg(palette.text_dim),
    ));

    let mut line = Line::from(spans);
    if is_selected {
        line.style = Style::default().bg(palette.highlight_selected);
    }
    line
}

fn render_scrollbar(
    frame: &mut Frame,
    area: Rect,
    offset: usize,
    window: usize,
    total: usize,
    color: Color,
) {
    let scrollbar_area = Rect {
        x: area.x + area.width.saturating_sub(1),
        y: area.y + 1,
        width: 1,
        height: area.height.saturating_sub(2),
    };

    if scrollbar_area.height == 0 || window >= total {
        return;
    }

    let ratio = window as f32 / total as f32;
    let handle_height = (scrollbar_area.height as f32 * ratio).round().max(1.0) as u16;
    let max_offset = total.saturating_sub(window);
    let handle_offset = if max_offset == 0 {
        0
    } else {
        ((offset as f32 / max_offset as f32) * (scrollbar_area.height - handle_height) as f32)
            .round() as u16
    };

    let mut lines = Vec::new();
    for y in 0..scrollbar_area.height {
        let symbol = if y >= handle_offset && y < handle_offset + handle_height {
            "█"
        } else {
            "░"
        };
        lines.push(Line::from(Span::styled(
            symbol.to_string(),
            Style::default().fg(color),
        )));
    }

    frame.render_widget(Paragraph::new(lines), scrollbar_area);
}

pub fn render_clear_prompt(frame: &mut Frame, area: Rect, app: &App) {
    let palette = app.theme().palette();

    let content = vec![
        Line::from("This will DELETE all stored process rows"),
        Line::from(format!("({} currently loaded).", app.snapshot_len())),
        Line::default(),
        Line::from("Continue? (y/n)"),
    ];

    let max_width = content.iter().map(|line| line.width()).max().unwrap_or(20);
    let popup_width = min(max_width + 4, area.width as usize) as u16;
    let popup_height = min(content.len() + 2, area.height as usize) as u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_width) / 2,
        y: area.y + area.height.saturating_sub(popup_height) / 2,
        width: popup_width,
        height: popup_height,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.clear_accent))
        .title(Line::from(vec![Span::styled(
            " Clear All Data? ",
            Style::default()
                .fg(palette.clear_accent)
                .add_modifier(Modifier::BOLD),
        )]));

    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(Clear, popup);
    frame.render_widget(paragraph, popup);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_quotes_the_literal_query() {
        let lines = empty_state_lines("bash");
        assert!(lines[0].contains("bash"));
        let lines = empty_state_lines("");
        assert_eq!(lines[0], "No processes found.");
    }

    #[test]
    fn caret_is_three_way() {
        let mut row = TreeRow {
            path: vec![1],
            pid: 1,
            parent_pid: None,
            name: "init".to_string(),
            hostname: "host".to_string(),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            depth: 0,
            has_children: true,
            expanded: false,
            prefix: String::new(),
        };
        assert_eq!(caret_glyph(&row), "▶");
        row.expanded = true;
        assert_eq!(caret_glyph(&row), "▼");
        row.has_children = false;
        row.expanded = false;
        assert_eq!(caret_glyph(&row), "•");
    }

    #[test]
    fn percent_formatting_defaults_non_finite_to_zero() {
        assert_eq!(format_percent(12.34), "12.3");
        assert_eq!(format_percent(0.0), "0.0");
        assert_eq!(format_percent(f64::NAN), "0.0");
        assert_eq!(format_percent(f64::INFINITY), "0.0");
    }
}
