use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Flows:"),
        key_line("d", 11, "Discover, then run the analysis"),
        key_line("a", 11, "Analysis only"),
        key_line("c", 11, "Compatibility check"),
        key_line("g", 11, "Data gathering"),
        key_line("f", 11, "Refresh results (no agent log)"),
        key_line("x", 11, "Cancel the running flow"),
        key_line("R", 11, "Clear results"),
        Line::from(""),
        Line::from("Results:"),
        key_line("e", 11, "Export last result as JSON"),
        key_line("y", 11, "Copy exported path to clipboard"),
        key_line("↑/↓ j/k", 5, "Scroll the agent log"),
        Line::from(""),
        Line::from("General:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Logs:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                "RUST_LOG=debug",
                Style::default().fg(Color::Cyan),
            ),
            Span::raw(" raises verbosity of the log file (see --log-file)"),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
