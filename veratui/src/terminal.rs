//! Terminal setup, teardown and drawing.

use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};
use std::io::{self, Stdout};
use std::panic;

use crate::error::{Result, TuiError};
use crate::theme::Theme;
use crate::view::{AnnotationView, Body, DetailView, FilterField, TableView, Tone, ViewModel};

/// Minimum terminal width
pub const MIN_WIDTH: u16 = 80;
/// Minimum terminal height
pub const MIN_HEIGHT: u16 = 24;

/// Terminal wrapper owning raw mode and the alternate screen.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    theme: Theme,
    entered: bool,
}

impl Tui {
    pub fn new() -> Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        Ok(Self {
            terminal,
            theme: Theme::default(),
            entered: false,
        })
    }

    /// Fail when the terminal is smaller than the layout needs.
    pub fn check_size(&self) -> Result<()> {
        let size = self.terminal.size()?;
        if size.width < MIN_WIDTH || size.height < MIN_HEIGHT {
            return Err(TuiError::TerminalTooSmall {
                width: size.width,
                height: size.height,
                min_width: MIN_WIDTH,
                min_height: MIN_HEIGHT,
            });
        }
        Ok(())
    }

    pub fn enter(&mut self) -> Result<()> {
        self.check_size()?;

        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        self.entered = true;

        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    pub fn exit(&mut self) -> Result<()> {
        if !self.entered {
            return Ok(());
        }
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        self.entered = false;
        Ok(())
    }

    pub fn draw(&mut self, view: &ViewModel) -> Result<()> {
        let theme = &self.theme;
        self.terminal.draw(|frame| render(frame, theme, view))?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if self.entered {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            let _ = self.terminal.show_cursor();
        }
    }
}

/// Restore the terminal before the default panic output is printed.
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));
}

fn render(frame: &mut Frame, theme: &Theme, view: &ViewModel) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(
        Paragraph::new(Span::styled(
            format!(" {}", view.header),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
        chunks[0],
    );

    match &view.body {
        Body::Applications { filters, table } | Body::Findings { filters, table } => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(3)])
                .split(chunks[1]);
            render_filters(frame, theme, parts[0], filters);
            render_table(frame, theme, parts[1], table, true);
        }
        Body::Application(detail) | Body::Finding(detail) | Body::DataPaths(detail) => {
            render_detail(frame, theme, chunks[1], detail);
        }
        Body::Annotation(form) => render_annotation(frame, theme, chunks[1], form),
    }

    let status_color = match view.status.tone {
        Tone::Normal => Color::Reset,
        Tone::Loading => theme.warning,
        Tone::Info => theme.success,
        Tone::Error => theme.error,
    };
    frame.render_widget(
        Paragraph::new(Span::styled(
            view.status.text.as_str(),
            Style::default().fg(status_color),
        )),
        chunks[2],
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            format!(" {}", view.help),
            Style::default().fg(theme.muted),
        )),
        chunks[3],
    );
}

fn border_style(theme: &Theme, focused: bool) -> Style {
    if focused {
        Style::default().fg(theme.accent)
    } else {
        Style::default().fg(theme.muted)
    }
}

fn render_filters(frame: &mut Frame, theme: &Theme, area: Rect, filters: &[FilterField]) {
    if filters.is_empty() {
        return;
    }
    let constraints = vec![Constraint::Ratio(1, filters.len() as u32); filters.len()];
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (field, cell) in filters.iter().zip(cells.iter()) {
        let mut text = field.value.clone();
        if field.editing {
            text.push('_');
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(theme, field.focused))
            .title(field.title);
        frame.render_widget(Paragraph::new(text).block(block), *cell);
    }
}

fn render_table(frame: &mut Frame, theme: &Theme, area: Rect, table: &TableView, focused: bool) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(theme, focused && table.selected.is_some()))
        .title(table.title.as_str());

    if let Some(placeholder) = &table.placeholder {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!(" {placeholder}"),
                Style::default().fg(theme.muted),
            )))
            .block(block),
            area,
        );
        return;
    }

    let header = Row::new(table.headers.iter().map(|h| Cell::from(*h)))
        .style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD));
    let rows = table.rows.iter().enumerate().map(|(r, row)| {
        let tones = table.tones.get(r);
        Row::new(row.iter().enumerate().map(move |(c, value)| {
            let tone = tones.and_then(|t| t.get(c)).copied().unwrap_or_default();
            Cell::from(value.as_str()).style(theme.cell_style(tone))
        }))
    });
    let widths = vec![Constraint::Fill(1); table.headers.len().max(1)];

    let widget = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().bg(theme.accent).fg(Color::Black))
        .highlight_symbol("▸ ");
    let mut state = TableState::default().with_selected(table.selected);
    frame.render_stateful_widget(widget, area, &mut state);
}

fn render_detail(frame: &mut Frame, theme: &Theme, area: Rect, detail: &DetailView) {
    let (fields_area, table_area) = match &detail.table {
        Some(_) => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(area);
            (parts[0], Some(parts[1]))
        }
        None => (area, None),
    };

    let lines: Vec<Line> = detail
        .fields
        .iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(format!("{label:>16}: "), Style::default().fg(theme.muted)),
                Span::raw(value.as_str()),
            ])
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(theme, true))
        .title(detail.title.as_str());
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        fields_area,
    );

    if let (Some(table), Some(table_area)) = (&detail.table, table_area) {
        render_table(frame, theme, table_area, table, true);
    }
}

fn render_annotation(frame: &mut Frame, theme: &Theme, area: Rect, form: &AnnotationView) {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Finding: ", Style::default().fg(theme.muted)),
            Span::raw(form.finding.as_str()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Action:  ", Style::default().fg(theme.muted)),
            Span::styled(
                format!("◀ {} ▶", form.action),
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Comment: ", Style::default().fg(theme.muted)),
            Span::raw(format!("{}_", form.comment)),
        ]),
    ];
    if let Some(state) = &form.state {
        let color = match state.tone {
            Tone::Error => theme.error,
            _ => theme.warning,
        };
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            state.text.as_str(),
            Style::default().fg(color),
        )));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(theme, true))
        .title(" Annotate finding ");
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}
