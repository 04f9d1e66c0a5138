use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, AppState, FormField, LoginFocus, Tab};

use super::styles;
use super::tabs::{equipment, report, roster, users};

const LOGO: [&str; 3] = [
    "   ╔═╗╦ ╦╔═╗╦  ╦╔╦╗╔═╗╔═╗╦╔═",
    "   ╚═╗╠═╣╠═╣╚╗╔╝ ║ ╔═╝╠═╣╠╩╗",
    "   ╚═╝╩ ╩╩ ╩ ╚╝  ╩ ╚═╝╩ ╩╩ ╩",
];

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(2), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::EditingSoldier => render_form_overlay(frame, app),
        AppState::Prompting(kind) => render_prompt_overlay(frame, kind.title(), &app.prompt_input),
        AppState::ConfirmingQuit => render_confirm_overlay(
            frame,
            if app.roster.has_changes() {
                "Unsynced changes will be lost. Quit?"
            } else {
                "Are you sure you want to quit?"
            },
        ),
        AppState::ConfirmingDiscard => {
            render_confirm_overlay(frame, "Discard all unsynced changes?")
        }
        _ => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!("  שבצ״ק  {}", app.report_settings.date.format("%d/%m/%Y"));
    let user = match (&app.current_user, app.session.email()) {
        (Some(user), _) => format!("{} ({})", user.display_name(), user.role),
        (None, Some(email)) => email.to_string(),
        (None, None) => String::new(),
    };
    let right = format!("{}  [?] Help", user);

    let title_line = Line::from(vec![
        Span::styled(title.clone(), styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.chars().count() + right.chars().count() + 2),
        )),
        Span::styled(right, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, tab.title());
        if *tab == app.current_tab {
            spans.push(Span::styled(label, styles::tab_style(true)));
        } else {
            spans.push(Span::styled(label, styles::muted_style()));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(styles::muted_style()),
    );
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_tab {
        Tab::Roster => roster::render(frame, app, area),
        Tab::Equipment => equipment::render(frame, app, area),
        Tab::Users => users::render(frame, app, area),
        Tab::Report => report::render(frame, app, area),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let left_text = match &app.status_message {
        Some(msg) => format!(" {} ", msg),
        None => format!(" Updated {} ", app.cache_age),
    };

    let changes = app.roster.changed_soldiers().len();
    let mut right_text = String::new();
    if changes > 0 {
        right_text.push_str(&format!("{} unsynced | ", changes));
    }
    if !app.can_write_sheet() {
        right_text.push_str("read-only | ");
    }
    right_text.push_str("[u]pdate | [q]uit ");

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let right_style = if changes > 0 {
        styles::highlight_style()
    } else {
        styles::muted_style()
    };

    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, right_style),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn logo_lines() -> Vec<Line<'static>> {
    LOGO.iter()
        .map(|l| Line::from(Span::styled(*l, styles::title_style())))
        .collect()
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(56, 34, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");
    let mut help_text = logo_lines();
    help_text.extend([
        Line::from(Span::styled(
            format!("              version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1-4", "Switch tabs"),
        help_line("←/→", "Prev/next tab"),
        help_line("↑/↓", "Navigate list"),
        Line::from(""),
        Line::from(Span::styled(" Roster", styles::highlight_style())),
        help_line("Space", "Check / uncheck soldier"),
        help_line("a / A", "Check all shown / clear checks"),
        help_line("s", "Cycle status (checked or current)"),
        help_line("c", "Set custom status"),
        help_line("N", "Edit notes"),
        help_line("e / n / x", "Edit / add / remove soldier"),
        help_line("/ p f", "Search, platoon and status filters"),
        help_line("S / D", "Sync / discard changes"),
        Line::from(""),
        Line::from(Span::styled(" Other tabs", styles::highlight_style())),
        help_line("n i d", "New template, edit item, delete"),
        help_line("r / Space", "Cycle role / approve user"),
        help_line("g o h", "Report: grouping, notes, home"),
        help_line("m / w", "Report: email / write file"),
        Line::from(""),
        help_line("u", "Update roster from the sheet"),
        help_line("L", "Log out"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());
    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// One labelled input field with a cursor when focused
fn field_line(label: &str, value: &str, focused: bool, width: usize) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::styled(format!("  {:<11}[", label), styles::muted_style()),
        Span::styled(format!("{:<width$}{}", value, cursor, width = width), style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 12 } else { 10 };
    let area = centered_rect_fixed(50, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(field_line(
        "Email:",
        &app.login_email,
        app.login_focus == LoginFocus::Email,
        28,
    ));
    let masked = "*".repeat(app.login_password.chars().count().min(28));
    lines.push(field_line(
        "Password:",
        &masked,
        app.login_focus == LoginFocus::Password,
        28,
    ));

    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("              ["),
        Span::styled(
            if button_focused { " ▶ Login ◀ " } else { "   Login   " },
            button_style,
        ),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_form_overlay(frame: &mut Frame, app: &App) {
    let errors = app.form_errors.messages();
    let height = 13 + errors.len() as u16;
    let area = centered_rect_fixed(56, height, frame.area());
    frame.render_widget(Clear, area);

    let title = if app.editing_id.is_some() {
        " Edit soldier "
    } else {
        " Add soldier "
    };

    let mut lines = vec![Line::from("")];
    for field in FormField::ALL {
        let focused = app.form_field == field;
        let value = match field {
            FormField::Id => app.form.id.clone(),
            FormField::FirstName => app.form.first_name.clone(),
            FormField::LastName => app.form.last_name.clone(),
            FormField::Platoon => app.form.platoon.clone(),
            FormField::Status => app
                .form
                .status
                .map(|s| format!("◀ {} ▶", s))
                .unwrap_or_else(|| "◀ - ▶".to_string()),
            FormField::CustomStatus => app.form.custom_status.clone(),
            FormField::Notes => app.form.notes.clone(),
        };
        lines.push(field_line(field.label(), &value, focused, 32));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  Tab/↑↓ move  Space/←→ status  Enter save  Esc cancel",
        styles::muted_style(),
    )));
    if !errors.is_empty() {
        lines.push(Line::from(""));
        for message in errors {
            lines.push(Line::from(Span::styled(format!("  {}", message), styles::error_style())));
        }
    }

    let block = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_prompt_overlay(frame: &mut Frame, title: &str, input: &str) {
    let area = centered_rect_fixed(56, 5, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(vec![
            Span::styled(" > ", styles::search_style()),
            Span::styled(format!("{}▌", input), styles::list_item_style()),
        ]),
        Line::from(""),
        Line::from(Span::styled(" Enter to save, Esc to cancel", styles::muted_style())),
    ];

    let block = Block::default()
        .title(format!(" {} ", title))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_confirm_overlay(frame: &mut Frame, question: &str) {
    let area = centered_rect_fixed(50, 9, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.extend([
        Line::from(""),
        Line::from(Span::styled(format!("   {}", question), styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to confirm, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
pub fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
