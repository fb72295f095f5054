mod app;
mod client;
mod config;
mod controller;
mod logging;
mod record;
mod tree;
mod ui;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use app::App;
use client::ApiClient;
use config::{Config, Theme};
use controller::PollController;

#[derive(Debug, Parser)]
#[command(
    name = "procview",
    about = "Live process-tree viewer for a monitoring backend",
    version
)]
pub struct Cli {
    /// optional free-text filter applied on startup.
    #[arg(value_name = "FILTER")]
    pub filter: Option<String>,

    /// base URL of the monitoring backend.
    #[arg(
        long = "url",
        value_name = "URL",
        default_value = "http://127.0.0.1:8000"
    )]
    pub url: String,

    /// show only processes from this host (exact match).
    #[arg(long = "host", value_name = "HOSTNAME")]
    pub host: Option<String>,

    /// enable auto-refresh on startup.
    #[arg(short = 'a', long = "auto")]
    pub auto: bool,

    /// auto-refresh interval in seconds (floored at 2).
    #[arg(long = "interval", value_name = "secs", default_value_t = 10)]
    pub interval: u64,

    /// theme selection for the tui.
    #[arg(long = "theme", value_enum, default_value_t = Theme::Pink)]
    pub theme: Theme,

    /// append diagnostics to this file (stderr belongs to the ui).
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    logging::init(args.log_file.as_deref())?;

    let config = Config {
        theme: args.theme,
        base_url: args.url,
        initial_filter: args.filter,
        host_filter: args.host,
        auto_refresh: args.auto,
        interval_secs: args.interval,
    };

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = quit.clone();
        ctrlc::set_handler(move || quit.store(true, Ordering::SeqCst))?;
    }

    let controller = PollController::new(ApiClient::new(&config.base_url));
    let mut app = App::new(config, controller);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app, &quit);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    quit: &AtomicBool,
) -> Result<()> {
    loop {
        if quit.load(Ordering::SeqCst) {
            return Ok(());
        }

        app.on_tick();

        if app.needs_refresh() {
            terminal.draw(|frame| ui::render(frame, app))?;
            app.mark_rendered();
        }

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.handle_input(key)? {
                        return Ok(());
                    }
                }
                Event::Resize(_, _) => app.request_redraw(),
                _ => {}
            }
        }
    }
}
