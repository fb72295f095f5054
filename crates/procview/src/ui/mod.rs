use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

use crate::app::{App, AppMode};

pub mod status;
pub mod tree;

pub fn render(frame: &mut Frame<'_>, app: &mut App) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    status::render_header(frame, chunks[0], app);
    tree::render(frame, chunks[1], app);
    status::render_footer(frame, chunks[2], app);

    if app.mode() == AppMode::ConfirmClear {
        tree::render_clear_prompt(frame, area, app);
    }

    if app.toast().is_some() {
        status::render_toast(frame, area, app);
    }
}
