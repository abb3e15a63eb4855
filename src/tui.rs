// src/tui.rs
//
// =============================================================================
// CNCMARKET: CATALOG BROWSER (v 0.3 )
// =============================================================================
//
// The Library View.
//
// Features:
// 1. Product Table fed by the incremental loader (fetches as you scroll).
// 2. Filter / Sort Bar (content type, category, machine, provider, axes, owner).
// 3. Inspector for the selected entry.
// 4. Real-time Log Stream.
//
// The view never touches loader state directly: it fires triggers and
// re-renders from the snapshots the loader publishes.

use crate::core::{ContentCategory, ContentType, FilterCriteria, FilterOptions, MachineType, Product};
use crate::loader::{is_near_end, CatalogLoader, LoadEvent, LoadState, MAX_PAGE_SIZE};
use crate::logs::LogBuffer;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Scrollbar,
        ScrollbarOrientation, ScrollbarState, Table, TableState, Wrap,
    },
    Frame,
};
use std::{io, time::Duration};
use tokio::sync::{broadcast, watch};

/// Next value in `options` after `current`; wraps to "no constraint".
pub fn cycle<T: Clone + PartialEq>(current: &Option<T>, options: &[T]) -> Option<T> {
    match current {
        None => options.first().cloned(),
        Some(v) => options
            .iter()
            .position(|o| o == v)
            .and_then(|i| options.get(i + 1))
            .cloned(),
    }
}

/// Status line for a published state. Failure reasons arrive separately as
/// events and overwrite it until the next state change.
fn load_status(state: &LoadState) -> (&'static str, Color) {
    if state.is_loading_initial {
        ("LOADING", Color::Yellow)
    } else if state.is_loading_more {
        ("FETCHING", Color::Yellow)
    } else if state.entries.is_empty() {
        ("NO RESULTS", Color::Gray)
    } else if !state.has_more {
        ("ALL LOADED", Color::Green)
    } else {
        ("ONLINE", Color::Green)
    }
}

pub struct BrowserApp {
    loader: CatalogLoader,
    state_rx: watch::Receiver<LoadState>,
    events_rx: broadcast::Receiver<LoadEvent>,
    options: FilterOptions,
    log_buffer: LogBuffer,
    source: String,

    // Data
    state: LoadState,

    // UI State
    table_state: TableState,
    scrollbar_state: ScrollbarState,
    should_quit: bool,
    show_help: bool,
    status_msg: String,
    status_color: Color,

    // Entry count at the last automatic fetch; see `auto_fill`.
    last_auto_len: Option<usize>,
}

impl BrowserApp {
    pub fn new(loader: CatalogLoader, options: FilterOptions, log_buffer: LogBuffer, source: String) -> Self {
        let state_rx = loader.subscribe();
        let events_rx = loader.events();
        let state = loader.snapshot();

        Self {
            loader,
            state_rx,
            events_rx,
            options,
            log_buffer,
            source,
            state,
            table_state: TableState::default(),
            scrollbar_state: ScrollbarState::default(),
            should_quit: false,
            show_help: false,
            status_msg: "Init".into(),
            status_color: Color::Gray,
            last_auto_len: None,
        }
    }

    /// Blocks until the user quits. Must run inside a tokio runtime: the
    /// loader spawns its fetches there.
    pub fn run(&mut self, initial: FilterCriteria) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.loader.on_criteria_change(initial);

        let outcome = self.event_loop(&mut terminal);

        self.loader.close();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        outcome
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        while !self.should_quit {
            self.sync_state();
            self.auto_fill();

            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_input(key);
                }
            }
        }
        Ok(())
    }

    // --- Data Management ---

    fn sync_state(&mut self) {
        if self.state_rx.has_changed().unwrap_or(false) {
            self.state = self.state_rx.borrow_and_update().clone();
            self.scrollbar_state = self.scrollbar_state.content_length(self.state.entries.len());

            let len = self.state.entries.len();
            match self.table_state.selected() {
                _ if len == 0 => self.table_state.select(None),
                None => self.table_state.select(Some(0)),
                Some(i) if i >= len => self.table_state.select(Some(len - 1)),
                _ => {}
            }

            let (msg, color) = load_status(&self.state);
            self.set_status(msg, color);
        }

        loop {
            match self.events_rx.try_recv() {
                Ok(ev) => {
                    let color = if ev.error.is_initial() { Color::Red } else { Color::Yellow };
                    self.set_status(&ev.reason(), color);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    log::debug!("Browser skipped {} loader events", n);
                }
                Err(_) => break,
            }
        }
    }

    /// Keeps fetching while the loaded rows don't reach past the selection,
    /// the way a visible sentinel row would. Fires at most once per entry
    /// count, so a failing page is only retried by user movement.
    fn auto_fill(&mut self) {
        let len = self.state.entries.len();
        if self.state.is_loading() || !self.state.has_more || self.last_auto_len == Some(len) {
            return;
        }
        let selected = self.table_state.selected().unwrap_or(0);
        if is_near_end(selected, len) {
            self.last_auto_len = Some(len);
            self.loader.on_scroll_near_end();
        }
    }

    fn set_status(&mut self, msg: &str, color: Color) {
        self.status_msg = msg.to_string();
        self.status_color = color;
    }

    fn change_criteria(&mut self, edit: impl FnOnce(&mut FilterCriteria)) {
        let mut criteria = self.loader.criteria();
        edit(&mut criteria);
        self.last_auto_len = None;
        self.table_state.select(None);
        self.loader.on_criteria_change(criteria.normalized());
    }

    fn selected(&self) -> Option<&Product> {
        self.table_state
            .selected()
            .and_then(|i| self.state.entries.get(i))
    }

    // --- UI Layout ---

    fn ui(&mut self, f: &mut Frame) {
        let layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(f.area());

        self.draw_main(f, layout[0]);
        self.draw_inspector(f, layout[1]);

        if self.show_help {
            self.draw_help(f);
        }
    }

    fn filter_line(&self) -> Line<'static> {
        let c = self.loader.criteria();
        let chip = |label: &str, value: Option<String>| -> Vec<Span<'static>> {
            let (text, style) = match value {
                Some(v) => (v, Style::default().fg(Color::Cyan)),
                None => ("any".to_string(), Style::default().fg(Color::DarkGray)),
            };
            vec![Span::raw(format!("{}: ", label)), Span::styled(text, style), Span::raw("  ")]
        };

        let mut spans = vec![
            Span::styled(
                format!(" {} ", c.sort.label()),
                Style::default().bg(Color::Blue).fg(Color::White),
            ),
            Span::raw(format!(" Filters ({})  ", c.active_filter_count())),
        ];
        spans.extend(chip("Content", c.content_type.map(|v| v.label().to_string())));
        spans.extend(chip("Category", c.category.map(|v| v.label().to_string())));
        spans.extend(chip("Machine", c.machine_type.map(|v| v.label().to_string())));
        spans.extend(chip("Provided by", c.machine_manufacturer.clone()));
        spans.extend(chip("Axes", c.number_of_axes.map(|a| a.to_string())));
        spans.extend(chip("Owner", c.content_owner.clone()));
        Line::from(spans)
    }

    fn draw_main(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(7),
            ])
            .split(area);

        f.render_widget(
            Paragraph::new(self.filter_line())
                .block(Block::default().borders(Borders::ALL).title(" CNC Market ")),
            chunks[0],
        );

        let rows: Vec<Row> = self
            .state
            .entries
            .iter()
            .map(|p| {
                let verified = if p.is_verified() { "✔ " } else { "" };
                Row::new(vec![
                    Cell::from(format!("{}{}", verified, p.name)),
                    Cell::from(p.content_type.map(|t| t.label()).unwrap_or("-")),
                    Cell::from(p.machine_manufacturer.clone()),
                    Cell::from(p.number_of_axes.map(|a| a.to_string()).unwrap_or_default()),
                    Cell::from(p.price_label()),
                    Cell::from(p.download_count.to_string()),
                ])
            })
            .collect();

        let title = format!(
            " Projects [{}{}] ",
            self.state.entries.len(),
            if self.state.has_more { "+" } else { "" }
        );

        let table = Table::new(
            rows,
            [
                Constraint::Min(20),
                Constraint::Length(20),
                Constraint::Length(14),
                Constraint::Length(5),
                Constraint::Length(10),
                Constraint::Length(7),
            ],
        )
        .header(
            Row::new(vec!["Name", "Content", "Provided by", "Axes", "Price", "DL"])
                .style(Style::default().fg(Color::Cyan)),
        )
        .block(Block::default().borders(Borders::LEFT | Borders::RIGHT).title(title))
        .row_highlight_style(Style::default().bg(Color::Rgb(40, 40, 40)));

        f.render_stateful_widget(table, chunks[1], &mut self.table_state);
        f.render_stateful_widget(
            Scrollbar::default().orientation(ScrollbarOrientation::VerticalRight),
            chunks[1],
            &mut self.scrollbar_state,
        );

        let status = Line::from(vec![
            Span::raw(format!(" {} | page size {} | ", self.source, self.loader.page_size())),
            Span::styled(self.status_msg.clone(), Style::default().fg(self.status_color)),
        ]);
        f.render_widget(Paragraph::new(status), chunks[2]);

        let log_list = List::new(
            self.log_buffer
                .latest(6)
                .into_iter()
                .map(|s| ListItem::new(format!("> {}", s)))
                .collect::<Vec<_>>(),
        )
        .block(Block::default().borders(Borders::TOP).title("Events"));
        f.render_widget(log_list, chunks[3]);
    }

    fn draw_inspector(&self, f: &mut Frame, area: Rect) {
        let lines = match self.selected() {
            Some(p) => Self::format_inspector(p),
            None if self.state.is_loading_initial => vec![Line::from("Loading...")],
            None => vec![Line::from("No projects match these filters")],
        };
        f.render_widget(
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title(" Inspector "))
                .wrap(Wrap { trim: true }),
            area,
        );
    }

    fn format_inspector(p: &Product) -> Vec<Line<'static>> {
        let key = |k: &str| Span::styled(format!("{:<12}", k), Style::default().fg(Color::Cyan));
        let section = |t: &str| {
            Line::from(Span::styled(format!(" {} ", t), Style::default().bg(Color::DarkGray)))
        };
        let field = |k: &str, v: String| Line::from(vec![key(k), Span::raw(v)]);

        let mut lines = vec![
            Line::from(Span::styled(
                p.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            field("ID", p.id.to_string()),
            field(
                "Content",
                p.content_type.map(|t| t.label().to_string()).unwrap_or_default(),
            ),
            field(
                "Status",
                p.publication_status.map(|s| s.label().to_string()).unwrap_or_default(),
            ),
            field("Price", p.price_label()),
            field("Downloads", p.download_count.to_string()),
        ];
        if let Some(days) = p.trial_days.filter(|d| *d > 0) {
            lines.push(field("Trial", format!("{} days", days)));
        }
        if p.is_verified() {
            lines.push(Line::from(Span::styled(
                "✔ Verified on equipment",
                Style::default().fg(Color::Green),
            )));
        }

        lines.push(Line::from(""));
        lines.push(section("MACHINE"));
        lines.push(field("Maker", p.machine_manufacturer.clone()));
        lines.push(field("Series", p.machine_series.clone()));
        lines.push(field("Model", p.machine_model.clone()));
        lines.push(field(
            "Type",
            p.machine_type.map(|t| t.label().to_string()).unwrap_or_default(),
        ));
        if let Some(axes) = p.number_of_axes {
            lines.push(field("Axes", axes.to_string()));
        }
        lines.push(field("Controller", p.controller_line()));

        lines.push(Line::from(""));
        lines.push(section("AUTHOR"));
        lines.push(field("Owner", p.product_owner.clone()));
        lines.push(field("Author", p.author_name.clone()));
        if let Some(at) = p.published_at.or(p.created_at) {
            lines.push(field("Since", at.format("%Y-%m-%d").to_string()));
        }

        if !p.description.is_empty() {
            lines.push(Line::from(""));
            lines.push(section("DESCRIPTION"));
            for l in p.description.lines().take(8) {
                lines.push(Line::from(l.to_string()));
            }
        }
        if !p.supported_codes.is_empty() {
            lines.push(Line::from(""));
            lines.push(section("SUPPORTED CODES"));
            lines.push(Line::from(p.supported_codes.clone()));
        }
        lines
    }

    fn handle_input(&mut self, key: event::KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
                self.show_help = false;
            }
            return;
        }

        let options = self.options.clone();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('r') => {
                self.last_auto_len = None;
                self.loader.on_criteria_change(self.loader.criteria());
            }
            KeyCode::Char('s') => self.change_criteria(|c| c.sort = c.sort.toggled()),
            KeyCode::Char('t') => self.change_criteria(|c| c.content_type = cycle(&c.content_type, &ContentType::ALL)),
            KeyCode::Char('c') => self.change_criteria(|c| c.category = cycle(&c.category, &ContentCategory::ALL)),
            KeyCode::Char('m') => self.change_criteria(|c| c.machine_type = cycle(&c.machine_type, &MachineType::ALL)),
            KeyCode::Char('p') => self.change_criteria(|c| {
                c.machine_manufacturer = cycle(&c.machine_manufacturer, &options.machine_manufacturers)
            }),
            KeyCode::Char('a') => {
                self.change_criteria(|c| c.number_of_axes = cycle(&c.number_of_axes, &options.number_of_axes))
            }
            KeyCode::Char('o') => {
                self.change_criteria(|c| c.content_owner = cycle(&c.content_owner, &options.content_owners))
            }
            KeyCode::Char('x') => self.change_criteria(|c| *c = c.cleared()),
            KeyCode::Char('+') => {
                self.last_auto_len = None;
                let size = self.loader.page_size().saturating_mul(2).min(MAX_PAGE_SIZE);
                if size != self.loader.page_size() {
                    self.loader.on_page_size_change(size);
                }
            }
            KeyCode::Char('-') => {
                self.last_auto_len = None;
                let size = (self.loader.page_size() / 2).max(1);
                if size != self.loader.page_size() {
                    self.loader.on_page_size_change(size);
                }
            }
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(10),
            KeyCode::PageUp => self.move_selection(-10),
            KeyCode::End | KeyCode::Char('G') => self.move_selection(i32::MAX / 2),
            KeyCode::Home | KeyCode::Char('g') => self.move_selection(i32::MIN / 2),
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: i32) {
        let len = self.state.entries.len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) => (i as i64 + delta as i64).clamp(0, len as i64 - 1) as usize,
            None => 0,
        };
        self.table_state.select(Some(i));
        self.scrollbar_state = self.scrollbar_state.position(i);

        // The scroll-proximity trigger.
        if is_near_end(i, len) {
            self.loader.on_scroll_near_end();
        }
    }

    fn draw_help(&self, f: &mut Frame) {
        let area = centered_rect(50, 60, f.area());
        f.render_widget(Clear, area);
        let block = Block::default()
            .title("Help")
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::DarkGray));
        let text = "[Keys]\n\
            j/k: Nav   g/G: Top/Bottom\n\
            s: Recent / Popular\n\
            t: Content type   c: Category\n\
            m: Machine type   p: Provider\n\
            a: Axes   o: Owner\n\
            x: Clear filters\n\
            +/-: Page size\n\
            r: Retry   q: Quit   ?: Help";
        f.render_widget(Paragraph::new(text).block(block).alignment(Alignment::Center), area);
    }
}

fn centered_rect(px: u16, py: u16, r: Rect) -> Rect {
    let popup = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - py) / 2),
            Constraint::Percentage(py),
            Constraint::Percentage((100 - py) / 2),
        ])
        .split(r)[1];
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - px) / 2),
            Constraint::Percentage(px),
            Constraint::Percentage((100 - px) / 2),
        ])
        .split(popup)[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_walks_options_then_clears() {
        let opts = [ContentCategory::CncMachines, ContentCategory::Robots];
        let a = cycle(&None, &opts);
        assert_eq!(a, Some(ContentCategory::CncMachines));
        let b = cycle(&a, &opts);
        assert_eq!(b, Some(ContentCategory::Robots));
        assert_eq!(cycle(&b, &opts), None);

        // A value the options no longer offer falls back to "any".
        let stale = Some("Mazak".to_string());
        assert_eq!(cycle(&stale, &["Haas".to_string()]), None);
        assert_eq!(cycle::<u32>(&None, &[]), None);
    }

    #[test]
    fn status_line_tracks_every_state() {
        let loading = LoadState {
            has_more: true,
            is_loading_initial: true,
            ..Default::default()
        };
        assert_eq!(load_status(&loading).0, "LOADING");

        // A reset that matched nothing must not leave "LOADING" behind.
        let empty = LoadState::default();
        assert_eq!(load_status(&empty), ("NO RESULTS", Color::Gray));

        let one = vec![Product::new(1, "Haas VF-2 post")];
        let partial = LoadState {
            entries: one.clone(),
            has_more: true,
            ..Default::default()
        };
        assert_eq!(load_status(&partial).0, "ONLINE");

        let fetching = LoadState {
            is_loading_more: true,
            ..partial.clone()
        };
        assert_eq!(load_status(&fetching).0, "FETCHING");

        let complete = LoadState {
            entries: one,
            ..Default::default()
        };
        assert_eq!(load_status(&complete), ("ALL LOADED", Color::Green));
    }
}
