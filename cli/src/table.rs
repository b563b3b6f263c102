use tabled::settings::{peaker::Priority, style::Style, Settings, Width};
use tabled::{Table, Tabled};
use terminal_size::{terminal_size, Width as TerminalWidth};

/// Fallback when the output is not a terminal
const DEFAULT_WIDTH: usize = 120;

fn terminal_width() -> usize {
    terminal_size()
        .map(|(TerminalWidth(width), _)| width as usize)
        .unwrap_or(DEFAULT_WIDTH)
}

/// Table fitted into the terminal width, long cells are wrapped
pub fn render<T: Tabled>(rows: Vec<T>) -> Table {
    let width = terminal_width();

    let settings = Settings::default().with(Width::wrap(width).priority(Priority::max(true)));

    let mut table = Table::new(rows);
    table.with(Style::modern()).with(settings);
    table
}
