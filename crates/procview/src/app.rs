use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::{Config, Theme};
use crate::controller::{effective_interval_secs, Outcome, PollController};
use crate::record::{filter_by_host, filter_records};
use crate::tree::{build_forest, flatten_forest, prune_expanded, NodePath, TreeRow};

const TOAST_DURATION: Duration = Duration::from_millis(2200);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AppMode {
    Normal,
    Search,
    Host,
    Interval,
    ConfirmClear,
}

/// Three-state status indicator: ok, error, or neutral while a request is
/// out.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StatusLevel {
    Ok,
    Muted,
    Error,
}

pub struct App {
    controller: PollController,
    theme: Theme,

    mode: AppMode,
    search_query: String,
    host_filter: String,
    interval_input: String,

    tree_rows: Vec<TreeRow>,
    filtered_count: usize,
    expanded: HashSet<NodePath>,
    selected_index: usize,
    scroll_offset: usize,

    status_message: Option<(String, StatusLevel)>,
    toast: Option<(String, Instant)>,
    last_updated: Option<DateTime<Local>>,
    needs_refresh: bool,
}

impl App {
    pub fn new(config: Config, mut controller: PollController) -> Self {
        if config.auto_refresh {
            controller.set_auto_refresh(true, config.interval_secs);
        }

        let mut app = Self {
            controller,
            theme: config.theme,
            mode: AppMode::Normal,
            search_query: config.initial_filter.unwrap_or_default(),
            host_filter: config.host_filter.unwrap_or_default(),
            interval_input: config.interval_secs.to_string(),
            tree_rows: Vec::new(),
            filtered_count: 0,
            expanded: HashSet::new(),
            selected_index: 0,
            scroll_offset: 0,
            status_message: None,
            toast: None,
            last_updated: None,
            needs_refresh: true,
        };
        app.fetch_now();
        app
    }

    /// One event-loop turn: fire the auto timer if due, drain backend
    /// completions, expire the toast.
    pub fn on_tick(&mut self) {
        if self.controller.tick(Instant::now()) {
            self.set_status(StatusLevel::Muted, "Fetching…");
        }

        for outcome in self.controller.poll_completions() {
            self.handle_outcome(outcome);
        }

        if let Some((_, deadline)) = self.toast {
            if Instant::now() >= deadline {
                self.toast = None;
                self.needs_refresh = true;
            }
        }
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Fetched(Ok(rows)) => {
                self.set_status(StatusLevel::Ok, format!("Loaded {} rows", rows.len()));
                self.last_updated = Some(Local::now());
                if rows.is_empty() {
                    self.show_toast("No process data yet. Press 'c' to collect.");
                }
                // a fresh snapshot starts fully collapsed
                self.expanded.clear();
                self.rebuild_rows();
            }
            Outcome::Fetched(Err(err)) => {
                self.set_status(StatusLevel::Error, format!("Error loading data ({err})"));
                self.show_toast("Failed to fetch processes");
            }
            Outcome::Collected(Ok(count)) => {
                self.show_toast(format!("Live snapshot collected ({count} processes)"));
            }
            Outcome::Collected(Err(err)) => {
                self.set_status(StatusLevel::Error, "Collect failed");
                self.show_toast(format!("Failed to collect: {err}"));
            }
            Outcome::Cleared(Ok(())) => {
                self.set_status(StatusLevel::Ok, "Cleared");
                self.show_toast("All data cleared");
                self.expanded.clear();
                self.rebuild_rows();
            }
            Outcome::Cleared(Err(err)) => {
                self.set_status(StatusLevel::Error, "Clear failed");
                self.show_toast(format!("Failed to clear ({err})"));
            }
        }
    }

    pub fn handle_input(&mut self, event: KeyEvent) -> Result<bool> {
        let should_quit = match self.mode {
            AppMode::Search => self.handle_search_input(event),
            AppMode::Host => self.handle_host_input(event),
            AppMode::Interval => self.handle_interval_input(event),
            AppMode::ConfirmClear => self.handle_confirm_clear_input(event),
            AppMode::Normal => self.handle_normal_input(event),
        };
        Ok(should_quit)
    }

    fn handle_normal_input(&mut self, event: KeyEvent) -> bool {
        match event.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('/') => self.set_mode(AppMode::Search),
            KeyCode::Char('h') => self.set_mode(AppMode::Host),
            KeyCode::Char('i') => self.set_mode(AppMode::Interval),
            KeyCode::Char('r') => self.fetch_now(),
            KeyCode::Char('c') => {
                // single-flight: a collect while one is in flight is a
                // silent no-op
                if self.controller.request_collection() {
                    self.set_status(StatusLevel::Muted, "Collecting…");
                    self.needs_refresh = true;
                }
            }
            KeyCode::Char('d') => self.set_mode(AppMode::ConfirmClear),
            KeyCode::Char('a') => {
                let enable = !self.controller.auto_refresh().enabled();
                let secs = effective_interval_secs(&self.interval_input);
                self.controller.set_auto_refresh(enable, secs);
                self.show_toast(if enable {
                    "Auto-refresh ON"
                } else {
                    "Auto-refresh OFF"
                });
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Right => self.expand_selected(),
            KeyCode::Left => self.collapse_selected(),
            KeyCode::Up => self.select_prev(),
            KeyCode::Down => self.select_next(),
            KeyCode::PageUp => {
                for _ in 0..5 {
                    self.select_prev();
                }
            }
            KeyCode::PageDown => {
                for _ in 0..5 {
                    self.select_next();
                }
            }
            KeyCode::Char('g') => self.jump_to_top(),
            KeyCode::Char('G') => self.jump_to_bottom(),
            _ => {}
        }
        false
    }

    fn handle_search_input(&mut self, event: KeyEvent) -> bool {
        match event.code {
            KeyCode::Esc | KeyCode::Enter => self.set_mode(AppMode::Normal),
            KeyCode::Backspace => {
                self.search_query.pop();
                self.view_changed();
            }
            KeyCode::Char(c)
                if !event.modifiers.contains(KeyModifiers::CONTROL)
                    && !event.modifiers.contains(KeyModifiers::ALT) =>
            {
                self.search_query.push(c);
                self.view_changed();
            }
            _ => {}
        }
        false
    }

    fn handle_host_input(&mut self, event: KeyEvent) -> bool {
        match event.code {
            KeyCode::Esc | KeyCode::Enter => self.set_mode(AppMode::Normal),
            KeyCode::Backspace => {
                self.host_filter.pop();
                self.view_changed();
            }
            KeyCode::Char(c)
                if !event.modifiers.contains(KeyModifiers::CONTROL)
                    && !event.modifiers.contains(KeyModifiers::ALT) =>
            {
                self.host_filter.push(c);
                self.view_changed();
            }
            _ => {}
        }
        false
    }

    fn handle_interval_input(&mut self, event: KeyEvent) -> bool {
        match event.code {
            KeyCode::Esc => self.set_mode(AppMode::Normal),
            KeyCode::Enter => {
                // re-arm a live timer with the new period
                if self.controller.auto_refresh().enabled() {
                    let secs = effective_interval_secs(&self.interval_input);
                    self.controller.set_auto_refresh(true, secs);
                }
                self.set_mode(AppMode::Normal);
            }
            KeyCode::Backspace => {
                self.interval_input.pop();
                self.needs_refresh = true;
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => {
                self.interval_input.push(c);
                self.needs_refresh = true;
            }
            _ => {}
        }
        false
    }

    fn handle_confirm_clear_input(&mut self, event: KeyEvent) -> bool {
        match event.code {
            KeyCode::Char('y') => {
                self.controller.request_clear();
                self.set_status(StatusLevel::Muted, "Clearing…");
                self.set_mode(AppMode::Normal);
            }
            KeyCode::Char('n') | KeyCode::Esc => self.set_mode(AppMode::Normal),
            KeyCode::Char('q') => return true,
            _ => {}
        }
        false
    }

    fn fetch_now(&mut self) {
        self.set_status(StatusLevel::Muted, "Fetching…");
        self.controller.request_fetch();
    }

    /// Query or host filter changed: expand state resets and the view is
    /// rebuilt from the full latest snapshot, never from a prior filtered
    /// view.
    fn view_changed(&mut self) {
        self.expanded.clear();
        self.rebuild_rows();
    }

    fn rebuild_rows(&mut self) {
        let previous_path = self
            .tree_rows
            .get(self.selected_index)
            .map(|row| row.path.clone());

        let by_host = filter_by_host(self.controller.latest_snapshot(), &self.host_filter);
        let visible = filter_records(&by_host, &self.search_query);
        self.filtered_count = visible.len();
        let forest = build_forest(&visible);
        self.tree_rows = flatten_forest(&forest, &self.expanded);

        self.selected_index = previous_path
            .and_then(|path| self.tree_rows.iter().position(|row| row.path == path))
            .unwrap_or(0);
        self.clamp_selection();
        self.needs_refresh = true;
    }

    fn toggle_selected(&mut self) {
        let Some(row) = self.tree_rows.get(self.selected_index) else {
            return;
        };
        if !row.has_children {
            // leaf: toggling is a no-op
            return;
        }
        let path = row.path.clone();
        if self.expanded.contains(&path) {
            // collapsing resets the whole subtree to collapsed
            prune_expanded(&mut self.expanded, &path);
        } else {
            self.expanded.insert(path);
        }
        self.rebuild_rows();
    }

    fn expand_selected(&mut self) {
        if let Some(row) = self.tree_rows.get(self.selected_index) {
            if row.has_children && !row.expanded {
                self.expanded.insert(row.path.clone());
                self.rebuild_rows();
            }
        }
    }

    fn collapse_selected(&mut self) {
        if let Some(row) = self.tree_rows.get(self.selected_index) {
            if row.has_children && row.expanded {
                let path = row.path.clone();
                prune_expanded(&mut self.expanded, &path);
                self.rebuild_rows();
            }
        }
    }

    fn select_next(&mut self) {
        if self.tree_rows.is_empty() {
            return;
        }
        if self.selected_index + 1 < self.tree_rows.len() {
            self.selected_index += 1;
        }
        self.needs_refresh = true;
    }

    fn select_prev(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
        self.needs_refresh = true;
    }

    fn jump_to_top(&mut self) {
        self.selected_index = 0;
        self.needs_refresh = true;
    }

    fn jump_to_bottom(&mut self) {
        if !self.tree_rows.is_empty() {
            self.selected_index = self.tree_rows.len() - 1;
        }
        self.needs_refresh = true;
    }

    fn clamp_selection(&mut self) {
        if self.tree_rows.is_empty() {
            self.selected_index = 0;
            self.scroll_offset = 0;
        } else if self.selected_index >= self.tree_rows.len() {
            self.selected_index = self.tree_rows.len() - 1;
        }
        self.scroll_offset = self
            .scroll_offset
            .min(self.tree_rows.len().saturating_sub(1));
    }

    fn set_mode(&mut self, mode: AppMode) {
        self.mode = mode;
        self.needs_refresh = true;
    }

    fn set_status<T: Into<String>>(&mut self, level: StatusLevel, message: T) {
        self.status_message = Some((message.into(), level));
        self.needs_refresh = true;
    }

    fn show_toast<T: Into<String>>(&mut self, message: T) {
        self.toast = Some((message.into(), Instant::now() + TOAST_DURATION));
        self.needs_refresh = true;
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    pub fn mark_rendered(&mut self) {
        self.needs_refresh = false;
    }

    pub fn request_redraw(&mut self) {
        self.needs_refresh = true;
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn host_filter(&self) -> &str {
        &self.host_filter
    }

    pub fn interval_input(&self) -> &str {
        &self.interval_input
    }

    pub fn tree_rows(&self) -> &[TreeRow] {
        &self.tree_rows
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered_count
    }

    pub fn snapshot_len(&self) -> usize {
        self.controller.latest_snapshot().len()
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: usize) {
        self.scroll_offset = offset;
    }

    pub fn status_message(&self) -> Option<&(String, StatusLevel)> {
        self.status_message.as_ref()
    }

    pub fn toast(&self) -> Option<&str> {
        self.toast.as_ref().map(|(message, _)| message.as_str())
    }

    pub fn last_updated(&self) -> Option<&DateTime<Local>> {
        self.last_updated.as_ref()
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.controller.auto_refresh().enabled()
    }

    pub fn auto_refresh_secs(&self) -> Option<u64> {
        self.controller.auto_refresh().interval_secs()
    }

    pub fn collect_in_flight(&self) -> bool {
        self.controller.collect_in_flight()
    }
}
