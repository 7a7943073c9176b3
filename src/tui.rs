use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Wrap};
use tokio::sync::mpsc;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::board::Board;
use crate::command::Command;
use crate::config::{FeedConfig, FeedMode};
use crate::error_log::{ErrorKind, ErrorLogStore};
use crate::feed::{FEED_CHANNEL_CAPACITY, FeedDriver, FeedEvent};
use crate::flash::{CellState, cell_state};
use crate::pin::PinState;
use crate::row::{Direction, Field, LevelPart, RowSnapshot};
use crate::store::BoardError;

const LOADING_SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];
const PIN_MARKER: &str = "📌";
const PIN_COLUMN_WIDTH: usize = 2;
const SYMBOL_COLUMN_WIDTH: usize = 6;
const STATUS_HEIGHT: u16 = 4;

#[derive(Clone, Copy)]
enum CellFormat {
    Price,
    Volume,
    Percent,
}

struct GridColumn {
    title: &'static str,
    field: Field,
    format: CellFormat,
    width: usize,
}

const fn column(title: &'static str, field: Field, format: CellFormat, width: usize) -> GridColumn {
    GridColumn {
        title,
        field,
        format,
        width,
    }
}

// Bid level 0 is the deepest, so the bid block reads 3..1 towards the last price.
const GRID_COLUMNS: [GridColumn; 21] = [
    column("Ceil", Field::Ceiling, CellFormat::Price, 8),
    column("Floor", Field::Floor, CellFormat::Price, 8),
    column("Ref", Field::Reference, CellFormat::Price, 8),
    column("Bid3", Field::bid(0, LevelPart::Price), CellFormat::Price, 8),
    column("Vol3", Field::bid(0, LevelPart::Volume), CellFormat::Volume, 7),
    column("Bid2", Field::bid(1, LevelPart::Price), CellFormat::Price, 8),
    column("Vol2", Field::bid(1, LevelPart::Volume), CellFormat::Volume, 7),
    column("Bid1", Field::bid(2, LevelPart::Price), CellFormat::Price, 8),
    column("Vol1", Field::bid(2, LevelPart::Volume), CellFormat::Volume, 7),
    column("Last", Field::Last, CellFormat::Price, 8),
    column("+/-", Field::Change, CellFormat::Price, 7),
    column("%", Field::ChangePct, CellFormat::Percent, 8),
    column("Ask1", Field::ask(0, LevelPart::Price), CellFormat::Price, 8),
    column("Vol1", Field::ask(0, LevelPart::Volume), CellFormat::Volume, 7),
    column("Ask2", Field::ask(1, LevelPart::Price), CellFormat::Price, 8),
    column("Vol2", Field::ask(1, LevelPart::Volume), CellFormat::Volume, 7),
    column("Ask3", Field::ask(2, LevelPart::Price), CellFormat::Price, 8),
    column("Vol3", Field::ask(2, LevelPart::Volume), CellFormat::Volume, 7),
    column("Total Vol", Field::Volume, CellFormat::Volume, 11),
    column("High", Field::DayHigh, CellFormat::Price, 8),
    column("Low", Field::DayLow, CellFormat::Price, 8),
];

struct LoadingOverlay {
    message: String,
    spinner_index: usize,
    last_tick: Instant,
    block_input: bool,
}

impl LoadingOverlay {
    fn new(message: impl Into<String>, block_input: bool) -> Self {
        LoadingOverlay {
            message: message.into(),
            spinner_index: 0,
            last_tick: Instant::now(),
            block_input,
        }
    }

    fn tick(&mut self) -> bool {
        let interval = Duration::from_millis(120);
        if self.last_tick.elapsed() < interval {
            return false;
        }
        self.spinner_index = (self.spinner_index + 1) % LOADING_SPINNER_FRAMES.len();
        self.last_tick = Instant::now();
        true
    }

    fn spinner(&self) -> char {
        LOADING_SPINNER_FRAMES[self.spinner_index % LOADING_SPINNER_FRAMES.len()]
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn blocks_input(&self) -> bool {
        self.block_input
    }
}

/// A grid line chosen for the current viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
struct VisibleRow {
    symbol: String,
    display_idx: usize,
    pinned: bool,
    stripe: bool,
}

pub struct TuiApp {
    board: Option<Board>,
    driver: Option<FeedDriver>,
    feed_config: FeedConfig,
    rng: StdRng,
    error_log: ErrorLogStore,
    selected: usize,
    scroll: usize,
    main_height: usize,
    last_draw: Instant,
    min_redraw_gap: Duration,
    status_message: Option<String>,
    status_visible_until: Option<Instant>,
    status_is_error: bool,
    exit_confirmation: bool,
    loading_overlay: Option<LoadingOverlay>,
}

impl TuiApp {
    fn is_exit_key(key: &KeyEvent) -> bool {
        matches!(
            key.code,
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc
        ) || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
    }

    pub fn new(feed_config: FeedConfig, error_log: ErrorLogStore, source_label: &str) -> TuiApp {
        let min_redraw_gap = Duration::from_millis(50);
        let rng = match feed_config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        TuiApp {
            board: None,
            driver: None,
            feed_config,
            rng,
            error_log,
            selected: 0,
            scroll: 0,
            main_height: 0,
            last_draw: Instant::now() - min_redraw_gap,
            min_redraw_gap,
            status_message: None,
            status_visible_until: None,
            status_is_error: false,
            exit_confirmation: false,
            loading_overlay: Some(LoadingOverlay::new(
                format!("Loading {source_label}..."),
                true,
            )),
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(3));
        self.status_is_error = false;
    }

    fn set_error_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(5));
        self.status_is_error = true;
    }

    /// Error that stays up until another message replaces it.
    fn set_sticky_error(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = None;
        self.status_is_error = true;
    }

    fn clear_status_if_allowed(&mut self) {
        match self.status_visible_until {
            Some(visible_until) if Instant::now() >= visible_until => {
                self.status_message = None;
                self.status_visible_until = None;
                self.status_is_error = false;
            }
            _ => {}
        }
    }

    fn loading_blocks_input(&self) -> bool {
        self.loading_overlay
            .as_ref()
            .map(|overlay| overlay.blocks_input())
            .unwrap_or(false)
    }

    fn update_loading_overlay_animation(&mut self) -> bool {
        if let Some(overlay) = &mut self.loading_overlay {
            return overlay.tick();
        }
        false
    }

    /// Cancels every feed timer and hands the terminal back.
    pub fn dispose(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.shutdown();
        }
        ratatui::restore();
    }

    pub async fn run(&mut self, rx: &mut mpsc::Receiver<Command>) -> Result<()> {
        color_eyre::install()?;
        let mut terminal = ratatui::init();
        let (feed_tx, mut feed_rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let mut input_tick = tokio::time::interval(self.min_redraw_gap);
        let mut commands_open = true;
        terminal.draw(|frame| self.render(frame))?;
        self.last_draw = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = input_tick.tick() => {
                    self.update_loading_overlay_animation();
                    self.clear_status_if_allowed();
                    if self.poll_input()? {
                        return Ok(());
                    }
                    if self.last_draw.elapsed() >= self.min_redraw_gap {
                        terminal.draw(|frame| self.render(frame))?;
                        self.last_draw = Instant::now();
                    }
                }
                command = rx.recv(), if commands_open => match command {
                    Some(command) => {
                        self.handle_command(command, &feed_tx);
                        terminal.draw(|frame| self.render(frame))?;
                        self.last_draw = Instant::now();
                    }
                    None => commands_open = false,
                },
                Some(event) = feed_rx.recv() => {
                    self.handle_feed_event(event);
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command, feed_tx: &mpsc::Sender<FeedEvent>) {
        match command {
            Command::SnapshotLoaded(rows) => {
                let board = Board::new(rows);
                let count = board.store().len();
                self.board = Some(board);
                self.selected = 0;
                self.scroll = 0;
                self.loading_overlay = None;
                if let Some(mut previous) = self.driver.take() {
                    previous.shutdown();
                }
                self.driver = Some(FeedDriver::start(&self.feed_config, feed_tx.clone()));
                self.set_status_message(format!("Loaded {count} rows"));
            }
            Command::LoadFailed(message) => {
                self.loading_overlay = None;
                if let Err(err) = self.error_log.append_message(ErrorKind::Load, message.clone()) {
                    tracing::warn!(error = %err, "failed to write error journal");
                }
                self.set_sticky_error(format!("Load error: {message}"));
            }
        }
    }

    fn handle_feed_event(&mut self, event: FeedEvent) {
        let Some(board) = self.board.as_mut() else {
            return;
        };
        let result = match &event {
            FeedEvent::Incoming => board
                .incoming_tick(&mut self.rng, Instant::now())
                .map(|_| ()),
            FeedEvent::Flush => Ok(()),
            FeedEvent::ExpireFlash { symbol, revision } => {
                board.expire_flash(symbol, *revision).map(|_| ())
            }
        };
        if let Err(err) = result {
            self.swallow(err);
            return;
        }
        let flush_now = match event {
            FeedEvent::Flush => true,
            FeedEvent::Incoming => self.feed_config.mode == FeedMode::Direct,
            FeedEvent::ExpireFlash { .. } => false,
        };
        if flush_now {
            self.flush_pending();
        }
    }

    fn flush_pending(&mut self) {
        let Some(board) = self.board.as_mut() else {
            return;
        };
        let expiries = board.flush();
        if let Some(driver) = self.driver.as_mut() {
            for expiry in expiries {
                driver.schedule_expiry(expiry);
            }
        }
    }

    fn swallow(&mut self, err: BoardError) {
        if let Some(board) = self.board.as_mut() {
            board.record_swallowed();
        }
        tracing::debug!(error = %err, "feed step skipped");
        if let Err(log_err) = self.error_log.append_message(ErrorKind::Feed, err.to_string()) {
            tracing::warn!(error = %log_err, "failed to write error journal");
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let [grid_area, status_area] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(STATUS_HEIGHT)])
                .areas(frame.area());
        self.render_grid(frame, grid_area);
        self.render_status(frame, status_area);
        if self.loading_overlay.is_some() {
            self.render_loading_overlay(frame);
        }
        if self.exit_confirmation {
            self.render_exit_confirmation(frame);
        }
    }

    fn render_grid(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title("Price Board")
            .title_bottom(" ↑/↓ j/k move · PgUp/PgDn · Home/End · p/Enter pin · q quit ");
        let capacity = area.height.saturating_sub(3) as usize;
        let rows = self.layout_viewport(capacity);
        let now = Instant::now();
        let mut lines = vec![header_line()];
        if let Some(board) = &self.board {
            for visible in &rows {
                if let Some(snapshot) = board.display_row(&visible.symbol) {
                    lines.push(self.grid_line(snapshot, visible, now));
                }
            }
        }
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    /// Picks the rows that fit in `capacity` lines and tells the board which
    /// symbols are on screen.
    fn layout_viewport(&mut self, capacity: usize) -> Vec<VisibleRow> {
        let Some(board) = self.board.as_mut() else {
            return Vec::new();
        };
        let pinned = board.pins().pinned();
        let main = board.pins().main();
        let total = pinned.len() + main.len();
        self.selected = clamp_index(self.selected, total);

        let pinned_shown = pinned.len().min(capacity);
        let main_height = capacity - pinned_shown;
        let anchor = self.selected.checked_sub(pinned.len()).unwrap_or(self.scroll);
        self.scroll = scroll_offset(self.scroll, anchor, main_height, main.len());
        self.main_height = main_height;

        let mut rows: Vec<VisibleRow> = pinned[..pinned_shown]
            .iter()
            .enumerate()
            .map(|(idx, symbol)| VisibleRow {
                symbol: symbol.clone(),
                display_idx: idx,
                pinned: true,
                stripe: false,
            })
            .collect();
        let end = (self.scroll + main_height).min(main.len());
        for (offset, symbol) in main[self.scroll..end].iter().enumerate() {
            let main_idx = self.scroll + offset;
            rows.push(VisibleRow {
                symbol: symbol.clone(),
                display_idx: pinned.len() + main_idx,
                pinned: false,
                stripe: main_idx % 2 == 1,
            });
        }
        board.set_viewport(rows.iter().map(|row| &row.symbol));
        rows
    }

    fn grid_line(&self, snapshot: &RowSnapshot, visible: &VisibleRow, now: Instant) -> Line<'static> {
        let selected = visible.display_idx == self.selected;
        let base = row_base_style(selected, visible.stripe);
        let window = self.feed_config.flash;
        let marker = if visible.pinned { PIN_MARKER } else { "" };
        let mut spans = vec![
            Span::styled(pad_to_width(marker, PIN_COLUMN_WIDTH, ColumnAlign::Left), base),
            Span::styled(" ", base),
        ];
        let symbol_state = cell_state(snapshot, Field::Last, now, window);
        spans.push(Span::styled(
            format_column_value(snapshot.symbol(), ColumnAlign::Left, SYMBOL_COLUMN_WIDTH),
            base.fg(tone_color(symbol_state.tone))
                .add_modifier(Modifier::BOLD),
        ));
        for column in &GRID_COLUMNS {
            spans.push(Span::styled(" ", base));
            let text = column_text(snapshot, column);
            let state = cell_state(snapshot, column.field, now, window);
            spans.push(Span::styled(
                format_column_value(&text, ColumnAlign::Right, column.width),
                cell_style(base, state),
            ));
        }
        Line::from(spans)
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let mut lines = Vec::new();
        if let Some(board) = &self.board {
            let stats = board.stats();
            let mode = match self.feed_config.mode {
                FeedMode::Batched => "batched",
                FeedMode::Direct => "direct",
            };
            lines.push(Line::from(format!(
                "{rows} rows · {pinned} pinned · {mode} · staged {staged} · applied {applied} · coalesced {coalesced} · expired {expired} · swallowed {swallowed}",
                rows = board.store().len(),
                pinned = board.pins().pinned().len(),
                staged = board.pending_len(),
                applied = stats.applied,
                coalesced = stats.coalesced,
                expired = stats.expired,
                swallowed = stats.swallowed,
            )));
        } else {
            lines.push(Line::from("No rows loaded"));
        }
        if let Some(message) = &self.status_message {
            let color = if self.status_is_error {
                Color::Red
            } else {
                Color::Yellow
            };
            lines.push(Line::from(Span::styled(
                message.clone(),
                Style::default().fg(color),
            )));
        }
        let status = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .block(Block::bordered().title("Status"));
        frame.render_widget(status, area);
    }

    fn render_exit_confirmation(&self, frame: &mut Frame) {
        let area = frame.area();
        if area.width < 24 || area.height < 5 {
            return;
        }
        let popup_width = area.width.saturating_sub(20).min(50).max(28);
        let popup_height = 6;
        let left = area.x + (area.width.saturating_sub(popup_width)) / 2;
        let top = area.y + (area.height.saturating_sub(popup_height)) / 2;
        let popup = Rect::new(left, top, popup_width, popup_height);
        let lines = vec![
            Line::from(Span::styled(
                "Quit the price board?",
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from("Y/Enter confirm · N/Esc cancel"),
            Line::from("q again also confirms · Ctrl+C quits at once"),
        ];
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .block(Block::bordered().title("Quit"));
        frame.render_widget(Clear, popup);
        frame.render_widget(paragraph, popup);
    }

    fn render_loading_overlay(&self, frame: &mut Frame) {
        if let Some(overlay) = &self.loading_overlay {
            let area = frame.area();
            if area.width < 24 || area.height < 5 {
                return;
            }
            let popup_width = area.width.saturating_sub(10).min(60).max(30);
            let popup_height = 6;
            let left = area.x + (area.width.saturating_sub(popup_width)) / 2;
            let top = area.y + (area.height.saturating_sub(popup_height)) / 2;
            let popup = Rect::new(left, top, popup_width, popup_height);
            let message = format!("{} {}", overlay.spinner(), overlay.message());
            let lines = vec![
                Line::from(Span::styled(
                    message,
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from("Only Q/Esc work until the snapshot arrives"),
            ];
            let paragraph = Paragraph::new(lines)
                .alignment(Alignment::Left)
                .wrap(Wrap { trim: true })
                .block(Block::bordered().title("Loading"));
            frame.render_widget(Clear, popup);
            frame.render_widget(paragraph, popup);
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<bool> {
        if self.exit_confirmation {
            return self.handle_exit_confirmation_key(key);
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char('c') = key.code {
                return Ok(true);
            }
        }
        if self.loading_blocks_input() && !Self::is_exit_key(&key) {
            self.set_status_message("Snapshot still loading. Press Q/Esc to quit");
            return Ok(false);
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.prompt_exit_confirmation();
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-(self.page_size() as isize)),
            KeyCode::PageDown => self.move_selection(self.page_size() as isize),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.row_count().saturating_sub(1),
            KeyCode::Char('p') | KeyCode::Char('P') | KeyCode::Enter => self.toggle_selected_pin(),
            _ => {}
        }
        Ok(false)
    }

    fn prompt_exit_confirmation(&mut self) {
        if self.exit_confirmation {
            return;
        }
        self.exit_confirmation = true;
        self.set_status_message("Quit? Y/Enter confirm · N/Esc cancel");
    }

    fn handle_exit_confirmation_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char('c') = key.code {
                self.exit_confirmation = false;
                return Ok(true);
            }
        }
        match key.code {
            KeyCode::Char('y')
            | KeyCode::Char('Y')
            | KeyCode::Char('q')
            | KeyCode::Char('Q')
            | KeyCode::Enter => {
                self.exit_confirmation = false;
                Ok(true)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.exit_confirmation = false;
                self.set_status_message("Quit cancelled");
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn row_count(&self) -> usize {
        self.board
            .as_ref()
            .map(|board| board.store().len())
            .unwrap_or(0)
    }

    fn page_size(&self) -> usize {
        self.main_height.max(1)
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let next = self.selected as isize + delta;
        self.selected = clamp_index(next.max(0) as usize, len);
    }

    fn selected_symbol(&self) -> Option<String> {
        let board = self.board.as_ref()?;
        board.display_order().nth(self.selected).cloned()
    }

    fn toggle_selected_pin(&mut self) {
        let Some(symbol) = self.selected_symbol() else {
            return;
        };
        let Some(board) = self.board.as_mut() else {
            return;
        };
        match board.toggle_pin(&symbol) {
            Ok(state) => {
                if let Some(idx) = board.display_order().position(|s| *s == symbol) {
                    self.selected = idx;
                }
                let label = match state {
                    PinState::Pinned => "pinned",
                    PinState::Unpinned => "unpinned",
                };
                self.set_status_message(format!("{symbol} {label}"));
            }
            Err(err) => {
                tracing::debug!(error = %err, "pin toggle skipped");
                self.set_error_status_message(format!("Pin failed: {err}"));
            }
        }
    }

    fn poll_input(&mut self) -> Result<bool> {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if self.handle_key_event(key)? {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }
        Ok(false)
    }
}

#[derive(Clone, Copy)]
enum ColumnAlign {
    Left,
    Right,
}

fn header_line() -> Line<'static> {
    let mut columns: Vec<(&str, ColumnAlign, usize)> = vec![
        ("", ColumnAlign::Left, PIN_COLUMN_WIDTH),
        ("Symbol", ColumnAlign::Left, SYMBOL_COLUMN_WIDTH),
    ];
    columns.extend(
        GRID_COLUMNS
            .iter()
            .map(|column| (column.title, ColumnAlign::Right, column.width)),
    );
    Line::from(Span::styled(
        format_columns(&columns),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn column_text(snapshot: &RowSnapshot, column: &GridColumn) -> String {
    let value = match snapshot.row.get(column.field) {
        Some(value) => value,
        None => return String::new(),
    };
    // Empty book levels stay blank.
    if matches!(column.field, Field::Book(..)) && value == 0.0 {
        return String::new();
    }
    match column.format {
        CellFormat::Price => {
            let decimals = if value.fract() == 0.0 { 0 } else { 2 };
            format_number(value, decimals)
        }
        CellFormat::Volume => format_number(value, 0),
        CellFormat::Percent => format!("{}%", format_number(value, 2)),
    }
}

fn tone_color(direction: Direction) -> Color {
    match direction {
        Direction::Up => Color::Green,
        Direction::Down => Color::Red,
        Direction::Neutral => Color::Yellow,
    }
}

fn row_base_style(selected: bool, stripe: bool) -> Style {
    if selected {
        Style::default()
            .bg(Color::Blue)
            .add_modifier(Modifier::BOLD)
    } else if stripe {
        Style::default().bg(Color::Indexed(236))
    } else {
        Style::default()
    }
}

fn cell_style(base: Style, state: CellState) -> Style {
    match state.flash {
        Some(direction) => base.bg(tone_color(direction)).fg(Color::Black),
        None => base.fg(tone_color(state.tone)),
    }
}

/// en-US grouping: 1234567.5 with two decimals is "1,234,567.50".
fn format_number(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };
    let mut result = String::new();
    let negative = value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0');
    if negative {
        result.push('-');
    }
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    if let Some(frac_part) = frac_part {
        result.push('.');
        result.push_str(frac_part);
    }
    result
}

/// First main-sequence row to draw so that `selected` stays on screen,
/// moving the window as little as possible.
fn scroll_offset(offset: usize, selected: usize, visible: usize, len: usize) -> usize {
    if visible == 0 || len <= visible {
        return 0;
    }
    let max_start = len - visible;
    let offset = offset.min(max_start);
    if selected < offset {
        selected
    } else if selected >= offset + visible {
        (selected + 1 - visible).min(max_start)
    } else {
        offset
    }
}

fn format_columns(columns: &[(&str, ColumnAlign, usize)]) -> String {
    let mut row = String::new();
    for (idx, (value, align, width)) in columns.iter().enumerate() {
        row.push_str(&format_column_value(value, *align, *width));
        if idx + 1 != columns.len() {
            row.push(' ');
        }
    }
    row
}

fn format_column_value(value: &str, align: ColumnAlign, width: usize) -> String {
    let clipped = clip_to_width(value, width);
    pad_to_width(&clipped, width, align)
}

fn clip_to_width(value: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(value) <= width {
        return value.to_string();
    }
    let mut result = String::new();
    let mut remaining = width.saturating_sub(1);
    for ch in value.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if ch_width > remaining {
            break;
        }
        result.push(ch);
        remaining = remaining.saturating_sub(ch_width);
    }
    result.push('…');
    result
}

fn pad_to_width(value: &str, width: usize, align: ColumnAlign) -> String {
    let current = UnicodeWidthStr::width(value);
    if current >= width {
        return value.to_string();
    }
    let padding = " ".repeat(width - current);
    match align {
        ColumnAlign::Left => format!("{value}{padding}"),
        ColumnAlign::Right => format!("{padding}{value}"),
    }
}

fn clamp_index(idx: usize, len: usize) -> usize {
    if len == 0 { 0 } else { idx.min(len - 1) }
}
