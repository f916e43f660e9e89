use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::model::{AnalysisResponse, CompatibilityMatrixItem, InvalidObject};

fn empty(area: Rect, f: &mut Frame, title: &str, msg: &str) {
    f.render_widget(
        Paragraph::new(msg.to_string())
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::ALL).title(title.to_string())),
        area,
    );
}

/// Bar width that fits `n` bars into `area` with a 1-column gap.
fn bar_width(area: Rect, n: usize) -> u16 {
    let inner = area.width.saturating_sub(2) as usize;
    if n == 0 {
        return 1;
    }
    ((inner / n).saturating_sub(1)).clamp(1, 12) as u16
}

pub fn invalid_object_bars(objects: &[InvalidObject]) -> Vec<Bar<'static>> {
    objects
        .iter()
        .map(|o| {
            Bar::default()
                .value(o.invalid_count)
                .label(Line::from(format!("{}/{}", o.owner, o.object_type)))
                .style(Style::default().fg(Color::Red))
        })
        .collect()
}

pub fn draw_invalid_objects(area: Rect, f: &mut Frame, a: &AnalysisResponse) {
    let objects = a
        .stats
        .as_ref()
        .map(|s| s.invalid_objects.as_slice())
        .unwrap_or_default();
    if objects.is_empty() {
        return empty(area, f, "Invalid objects", "No invalid objects reported.");
    }

    let bars = invalid_object_bars(objects);
    let total = crate::metrics::invalid_objects_total(a);
    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Invalid objects ({total} total)")),
        )
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width(area, bars.len()))
        .bar_gap(1);
    f.render_widget(chart, area);
}

pub fn draw_file_categories(area: Rect, f: &mut Frame, a: &AnalysisResponse) {
    let Some(sp) = a.sharepoint.as_ref() else {
        return empty(area, f, "SharePoint files", "No SharePoint data.");
    };
    if sp.file_category_distribution.is_empty() {
        return empty(area, f, "SharePoint files", "No file categories reported.");
    }

    let bars: Vec<Bar> = sp
        .file_category_distribution
        .iter()
        .map(|(category, count)| {
            Bar::default()
                .value(*count)
                .label(Line::from(category.clone()))
                .style(Style::default().fg(Color::Cyan))
        })
        .collect();
    let gb = crate::metrics::sharepoint_storage_gb(a).unwrap_or(0.0);
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(format!(
            "SharePoint files by category ({} files, {:.2} GB)",
            sp.total_files, gb
        )))
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width(area, bars.len()))
        .bar_gap(1);
    f.render_widget(chart, area);
}

fn matrix_row(item: &CompatibilityMatrixItem) -> Row<'static> {
    let status = if item.is_compatible {
        Cell::from("compatible").style(Style::default().fg(Color::Green))
    } else {
        Cell::from("action needed").style(Style::default().fg(Color::Red))
    };
    Row::new(vec![
        Cell::from(item.component.clone()),
        Cell::from(item.current_version.clone().unwrap_or_else(|| "-".into())),
        Cell::from(item.proposed_target_from_agent.clone()),
        status,
        Cell::from(
            item.action_required
                .clone()
                .unwrap_or_else(|| item.status_message.clone()),
        ),
    ])
}

pub fn draw_compatibility_matrix(area: Rect, f: &mut Frame, a: &AnalysisResponse) {
    let items: Vec<&CompatibilityMatrixItem> = a
        .compatibility
        .iter()
        .flatten()
        .flat_map(|c| c.matrix.iter())
        .collect();
    if items.is_empty() {
        return empty(
            area,
            f,
            "Compatibility matrix",
            "No compatibility matrix yet. Press 'c' to run a compatibility check.",
        );
    }

    let (ok, bad) = crate::metrics::compatibility_counts(a);
    let header = Row::new(vec!["Component", "Current", "Target (agent)", "Status", "Action"])
        .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow));
    let table = Table::new(
        items.into_iter().map(matrix_row),
        [
            Constraint::Percentage(18),
            Constraint::Percentage(14),
            Constraint::Percentage(18),
            Constraint::Length(14),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(format!(
        "Compatibility matrix ({ok} compatible, {bad} need action)"
    )));
    f.render_widget(table, area);
}
