use fleet_core::ServerStatus;
use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const MUTED: Color = Color::Rgb(146, 131, 116);
pub const TEXT: Color = Color::Rgb(235, 219, 178);

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(18, 20, 26)
    } else {
        Color::Rgb(24, 27, 34)
    };
    Style::new().bg(bg)
}

pub mod icons {
    pub const SERVER: &str = "▣";
    pub const DOT: &str = "●";
    pub const SPINNER: &str = "…";
}

const GREEN_100: Color = Color::Rgb(40, 62, 38);
const GREEN_700: Color = Color::Rgb(142, 192, 124);
const GREY_100: Color = Color::Rgb(50, 48, 47);
const GREY_700: Color = Color::Rgb(168, 153, 132);
const BLUE_100: Color = Color::Rgb(30, 48, 66);
const BLUE_700: Color = Color::Rgb(131, 165, 152);
const YELLOW_100: Color = Color::Rgb(66, 56, 24);
const YELLOW_700: Color = Color::Rgb(250, 189, 47);
const RED_100: Color = Color::Rgb(72, 30, 30);
const RED_700: Color = Color::Rgb(251, 73, 52);

/// Presentation tokens for one lifecycle status: icon background, icon
/// foreground and the compound badge style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPalette {
    pub background: Color,
    pub foreground: Color,
    pub badge: Style,
}

impl StatusPalette {
    const fn new(background: Color, foreground: Color) -> Self {
        Self {
            background,
            foreground,
            badge: Style::new()
                .bg(background)
                .fg(foreground)
                .add_modifier(Modifier::BOLD),
        }
    }
}

const RUNNING: StatusPalette = StatusPalette::new(GREEN_100, GREEN_700);
const HALTED: StatusPalette = StatusPalette::new(GREY_100, GREY_700);
const CREATED: StatusPalette = StatusPalette::new(BLUE_100, BLUE_700);
const RESTARTING: StatusPalette = StatusPalette::new(YELLOW_100, YELLOW_700);
const ERROR: StatusPalette = StatusPalette::new(RED_100, RED_700);

pub const DEFAULT_PALETTE: StatusPalette = HALTED;

pub fn status_palette(status: &ServerStatus) -> StatusPalette {
    match status {
        ServerStatus::Running => RUNNING,
        ServerStatus::Stopped | ServerStatus::Exited | ServerStatus::Dead => HALTED,
        ServerStatus::Created => CREATED,
        ServerStatus::Restarting => RESTARTING,
        ServerStatus::Error => ERROR,
        ServerStatus::Unknown => DEFAULT_PALETTE,
    }
}
