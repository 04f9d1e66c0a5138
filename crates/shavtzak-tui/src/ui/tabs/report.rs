use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::ui::styles;

fn toggle(key: &'static str, label: &'static str, on: bool) -> Vec<Span<'static>> {
    vec![
        Span::styled(format!(" [{}] ", key), styles::help_key_style()),
        Span::raw(label),
        Span::styled(
            if on { " on " } else { " off" },
            if on {
                styles::success_style()
            } else {
                styles::muted_style()
            },
        ),
        Span::raw("  "),
    ]
}

/// Render the Report tab: settings line and the report preview
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    let settings = &app.report_settings;
    let mut spans = Vec::new();
    spans.extend(toggle("g", "by platoon", settings.group_by_platoon));
    spans.extend(toggle("o", "notes", settings.include_notes));
    spans.extend(toggle("h", "home", settings.include_home));
    spans.push(Span::styled(" [m]", styles::help_key_style()));
    spans.push(Span::raw("ail "));
    spans.push(Span::styled(
        format!("({})", app.config.report_recipients.len()),
        styles::muted_style(),
    ));
    spans.push(Span::styled("  [w]", styles::help_key_style()));
    spans.push(Span::raw("rite file"));

    let bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    frame.render_widget(bar, chunks[0]);

    let preview = Paragraph::new(app.report_text())
        .wrap(Wrap { trim: false })
        .scroll((app.report_scroll, 0))
        .block(
            Block::default()
                .title(" Preview ")
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        );
    frame.render_widget(preview, chunks[1]);
}
