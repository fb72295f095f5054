use clap::ValueEnum;
use ratatui::style::Color;

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum Theme {
    Pink,
    Serious,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Pink
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub table_border: Color,
    pub table_header: Color,
    pub text_normal: Color,
    pub text_dim: Color,
    pub highlight_selected: Color,
    pub status_ok: Color,
    pub status_error: Color,
    pub clear_accent: Color,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Pink => Palette {
                table_border: Color::Rgb(244, 114, 182),
                table_header: Color::Rgb(251, 207, 232),
                text_normal: Color::Rgb(253, 242, 248),
                text_dim: Color::Rgb(190, 142, 170),
                highlight_selected: Color::Rgb(131, 24, 67),
                status_ok: Color::Rgb(134, 239, 172),
                status_error: Color::Rgb(248, 113, 113),
                clear_accent: Color::Rgb(251, 113, 133),
            },
            Theme::Serious => Palette {
                table_border: Color::DarkGray,
                table_header: Color::Gray,
                text_normal: Color::White,
                text_dim: Color::DarkGray,
                highlight_selected: Color::Rgb(38, 70, 83),
                status_ok: Color::Green,
                status_error: Color::Red,
                clear_accent: Color::LightRed,
            },
        }
    }

    pub fn cpu_color(self, percent: f64) -> Color {
        if percent >= 80.0 {
            self.palette().status_error
        } else if percent >= 40.0 {
            Color::Yellow
        } else {
            self.palette().text_normal
        }
    }

    pub fn memory_color(self, percent: f64) -> Color {
        if percent >= 80.0 {
            self.palette().status_error
        } else if percent >= 50.0 {
            Color::Yellow
        } else {
            self.palette().text_normal
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub base_url: String,
    pub initial_filter: Option<String>,
    pub host_filter: Option<String>,
    pub auto_refresh: bool,
    pub interval_secs: u64,
}
