use ratatui::style::{Color, Modifier, Style};

use shavtzak_core::Status;

// Olive field palette
pub const OLIVE: Color = Color::Rgb(140, 160, 90);
pub const SAND: Color = Color::Rgb(214, 190, 130);
pub const SKY: Color = Color::Rgb(110, 160, 200);
pub const ALERT: Color = Color::Rgb(210, 80, 70);
pub const DIM: Color = Color::Rgb(120, 120, 110);
pub const ROW_BG: Color = Color::Rgb(44, 50, 36);
pub const BAR_BG: Color = Color::Rgb(30, 34, 26);
pub const TEXT: Color = Color::Rgb(225, 225, 215);

fn fg(color: Color) -> Style {
    Style::default().fg(color)
}

pub fn title_style() -> Style {
    fg(OLIVE).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    Style::default().bg(ROW_BG).add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    fg(TEXT)
}

pub fn muted_style() -> Style {
    fg(DIM)
}

pub fn highlight_style() -> Style {
    fg(SAND)
}

pub fn success_style() -> Style {
    fg(OLIVE)
}

pub fn error_style() -> Style {
    fg(ALERT).add_modifier(Modifier::BOLD)
}

pub fn tab_style(selected: bool) -> Style {
    if selected {
        title_style().add_modifier(Modifier::UNDERLINED)
    } else {
        list_item_style()
    }
}

pub fn border_style(focused: bool) -> Style {
    fg(if focused { OLIVE } else { DIM })
}

/// Search text and prompt markers
pub fn search_style() -> Style {
    fg(SKY)
}

pub fn status_bar_style() -> Style {
    Style::default().bg(BAR_BG).fg(TEXT)
}

pub fn help_key_style() -> Style {
    highlight_style().add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    list_item_style()
}

/// Unsynced rows in the roster table
pub fn changed_style() -> Style {
    fg(SAND).add_modifier(Modifier::ITALIC)
}

/// Home is dimmed so soldiers on duty stand out
pub fn status_style(status: Status) -> Style {
    match status {
        Status::Home => muted_style(),
        Status::Guard => fg(SKY).add_modifier(Modifier::BOLD),
        Status::Other => fg(SAND),
    }
}
