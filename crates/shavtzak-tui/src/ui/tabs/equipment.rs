use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;
use crate::ui::styles;

/// Render the Equipment tab: template list and the items of the selected template
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    render_templates(frame, app, chunks[0]);
    render_items(frame, app, chunks[1]);
}

fn render_templates(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .template_list
        .iter()
        .map(|t| {
            ListItem::new(Line::from(vec![
                Span::raw(t.name.clone()),
                Span::styled(format!("  ({} items)", t.items.len()), styles::muted_style()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(format!(" Templates ({}) - [n]ew [d]elete ", app.template_list.len()))
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .highlight_style(styles::selected_style());

    let mut state = ListState::default();
    if !app.template_list.is_empty() {
        state.select(Some(app.equipment_selection));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_items(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Items - [i] add/change ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let Some(template) = app.selected_template() else {
        let hint = Paragraph::new(Span::styled(
            "No equipment templates yet - press [n] to create one",
            styles::muted_style(),
        ))
        .block(block);
        frame.render_widget(hint, area);
        return;
    };

    let header = Row::new(vec![Cell::from("Item"), Cell::from("Qty"), Cell::from("Category")])
        .style(styles::title_style());
    let mut rows: Vec<Row> = template
        .items
        .iter()
        .map(|item| {
            Row::new(vec![
                Cell::from(item.name.clone()),
                Cell::from(format!("{:>3}", item.quantity)),
                Cell::from(item.category.clone().unwrap_or_default()),
            ])
            .style(styles::list_item_style())
        })
        .collect();
    rows.push(
        Row::new(vec![
            Cell::from("Total"),
            Cell::from(format!("{:>3}", template.total_quantity())),
            Cell::from(""),
        ])
        .style(styles::highlight_style()),
    );

    let widths = [Constraint::Fill(3), Constraint::Length(5), Constraint::Fill(2)];
    let table = Table::new(rows, widths).header(header).block(block.title_bottom(
        Line::from(Span::styled(
            format!(" updated {} ", template.updated_at.format("%d/%m/%Y %H:%M")),
            styles::muted_style(),
        )),
    ));
    frame.render_widget(table, area);
}
