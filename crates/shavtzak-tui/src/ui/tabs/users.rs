use ratatui::{
    layout::{Constraint, Rect},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::ui::styles;

/// Render the Users tab: registered accounts with role and approval state
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec![
        Cell::from("Name"),
        Cell::from("Personal #"),
        Cell::from("Email"),
        Cell::from("Phone"),
        Cell::from("Platoon"),
        Cell::from("Role"),
        Cell::from("Status"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = app
        .user_list
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let style = if i == app.users_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let status_style = if user.is_active {
                styles::success_style()
            } else {
                styles::highlight_style()
            };
            Row::new(vec![
                Cell::from(user.display_name()),
                Cell::from(user.personal_number.clone()),
                Cell::from(user.email.clone()),
                Cell::from(user.phone_display().unwrap_or_default()),
                Cell::from(user.platoon.clone().unwrap_or_default()),
                Cell::from(user.role.title()),
                Cell::from(Span::styled(user.status_display(), status_style)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Fill(3),
        Constraint::Length(10),
        Constraint::Fill(3),
        Constraint::Length(13),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(8),
    ];

    let title = if app.can_manage_users() {
        format!(" Users ({}) - [r]ole [Space] approve/deactivate ", app.user_list.len())
    } else {
        format!(" Users ({}) ", app.user_list.len())
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
    if !app.user_list.is_empty() {
        state.select(Some(app.users_selection));
    }
    frame.render_stateful_widget(table, area, &mut state);
}
