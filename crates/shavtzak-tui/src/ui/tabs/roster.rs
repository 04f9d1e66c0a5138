use std::collections::HashSet;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use shavtzak_core::models::Soldier;
use shavtzak_core::utils::truncate_string;
use shavtzak_core::Status;

use crate::app::{App, AppState};
use crate::ui::styles;

/// Render the Roster tab: filter bar, soldier table and detail panel
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    render_filter_bar(frame, app, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(rows[1]);

    render_table(frame, app, columns[0]);
    render_detail(frame, app, columns[1]);
}

fn render_filter_bar(frame: &mut Frame, app: &App, area: Rect) {
    let filter = &app.roster.filter;
    let searching = matches!(app.state, AppState::Searching);

    let mut spans = vec![
        Span::styled(" Search: ", styles::muted_style()),
        Span::styled(
            format!("{}{}", filter.search, if searching { "▌" } else { "" }),
            styles::search_style(),
        ),
        Span::styled("   [p]latoon: ", styles::muted_style()),
        Span::raw(filter.platoon.clone().unwrap_or_else(|| "all".to_string())),
        Span::styled("   [f] status: ", styles::muted_style()),
        Span::raw(filter.status.map(|s| s.label().to_string()).unwrap_or_else(|| "all".to_string())),
    ];
    let checked = app.roster.selected().len();
    if checked > 0 {
        spans.push(Span::styled(format!("   {} checked", checked), styles::highlight_style()));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(searching));
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let soldiers = app.visible_soldiers();
    let changed: HashSet<&str> = app
        .roster
        .changed_soldiers()
        .into_iter()
        .map(|s| s.id.as_str())
        .collect();

    let header = Row::new(vec![
        Cell::from(" "),
        Cell::from("Personal #"),
        Cell::from("Name"),
        Cell::from("Platoon"),
        Cell::from("Status"),
        Cell::from("Notes"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = soldiers
        .iter()
        .enumerate()
        .map(|(i, soldier)| {
            let style = if i == app.roster_selection {
                styles::selected_style()
            } else if changed.contains(soldier.id.as_str()) {
                styles::changed_style()
            } else {
                styles::list_item_style()
            };
            let mark = match (soldier.is_selected, changed.contains(soldier.id.as_str())) {
                (true, _) => "✓",
                (false, true) => "*",
                _ => " ",
            };

            Row::new(vec![
                Cell::from(mark),
                Cell::from(soldier.id.clone()),
                Cell::from(soldier.display_name()),
                Cell::from(soldier.platoon.clone()),
                Cell::from(Span::styled(
                    soldier.raw_status(),
                    styles::status_style(soldier.status),
                )),
                Cell::from(truncate_string(soldier.notes_display(), 24)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(1),
        Constraint::Length(10),
        Constraint::Fill(3),
        Constraint::Length(8),
        Constraint::Fill(2),
        Constraint::Fill(2),
    ];

    let title = if app.roster.filter.is_active() {
        format!(" Soldiers ({} of {}) ", soldiers.len(), app.roster.len())
    } else {
        format!(" Soldiers ({}) ", app.roster.len())
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.roster_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

fn count_line(label: &str, count: usize, style: ratatui::style::Style) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{:<10}", label), styles::muted_style()),
        Span::styled(count.to_string(), style),
    ])
}

fn detail_lines(soldier: &Soldier) -> Vec<Line<'static>> {
    let placeholder = "-".to_string();
    let mut lines = vec![
        Line::from(Span::styled(soldier.name.clone(), styles::title_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("Personal #: ", styles::muted_style()),
            Span::raw(soldier.id.clone()),
        ]),
        Line::from(vec![
            Span::styled("Platoon:    ", styles::muted_style()),
            Span::raw(if soldier.platoon.is_empty() {
                placeholder.clone()
            } else {
                soldier.platoon.clone()
            }),
        ]),
        Line::from(vec![
            Span::styled("Status:     ", styles::muted_style()),
            Span::styled(soldier.raw_status(), styles::status_style(soldier.status)),
        ]),
    ];
    if soldier.status == Status::Other {
        lines.push(Line::from(vec![
            Span::styled("            ", styles::muted_style()),
            Span::styled(format!("({})", Status::Other.label()), styles::muted_style()),
        ]));
    }
    lines.push(Line::from(vec![
        Span::styled("Notes:      ", styles::muted_style()),
        Span::raw(
            soldier
                .notes
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(placeholder),
        ),
    ]));
    if soldier.manually_added() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Added manually", styles::highlight_style())));
    }
    lines
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let shown = app.roster.status_counts(true);
    let mut lines = vec![
        Line::from(Span::styled("Shown", styles::highlight_style())),
        count_line(Status::Home.label(), shown.home, styles::status_style(Status::Home)),
        count_line(Status::Guard.label(), shown.guard, styles::status_style(Status::Guard)),
        count_line(Status::Other.label(), shown.other, styles::status_style(Status::Other)),
        count_line("Total", shown.total(), styles::list_item_style()),
        Line::from(""),
    ];

    match app.selected_soldier() {
        Some(soldier) => lines.extend(detail_lines(soldier)),
        None => lines.push(Line::from(Span::styled(
            if app.roster.is_empty() {
                "No soldiers loaded - press [u] to update"
            } else {
                "No soldiers match the filter"
            },
            styles::muted_style(),
        ))),
    }

    let block = Block::default()
        .title(" Details ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
