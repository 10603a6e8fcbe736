// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use datachat_app::{
    ApiError, ApiOutcome, ApiRequest, ChatCommand, ChatEffect, ChatReply, ChatState,
    ColumnsResponse, ConnectResponse, Message, Sender as Author, TablesResponse, truncate_label,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::io;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

const BADGE_CHARS: usize = 15;
const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);

/// Bridge between the chat view and the backend.
///
/// The four calls block; `spawn_request` decides where they run. The default
/// runs inline and posts the outcome on `tx`, which is what tests want. The
/// binary overrides it to run on a worker thread so the UI keeps drawing.
pub trait AppRuntime {
    fn connect(&mut self) -> Result<ConnectResponse, ApiError>;
    fn list_tables(&mut self) -> Result<TablesResponse, ApiError>;
    fn list_columns(&mut self, table: &str) -> Result<ColumnsResponse, ApiError>;
    fn send_chat_message(&mut self, session_id: &str, message: &str)
    -> Result<ChatReply, ApiError>;
    fn spawn_request(&mut self, request: ApiRequest, tx: mpsc::Sender<InternalEvent>) -> Result<()> {
        let outcome = run_request(self, request);
        tx.send(InternalEvent::Api(outcome))
            .map_err(|_| anyhow!("api event channel closed"))?;
        Ok(())
    }
}

pub fn run_request<R: AppRuntime + ?Sized>(runtime: &mut R, request: ApiRequest) -> ApiOutcome {
    match request {
        ApiRequest::Connect { ticket } => ApiOutcome::Connect {
            ticket,
            result: runtime.connect(),
        },
        ApiRequest::ListTables { ticket } => ApiOutcome::ListTables {
            ticket,
            result: runtime.list_tables(),
        },
        ApiRequest::ListColumns { ticket, table } => {
            let result = runtime.list_columns(&table);
            ApiOutcome::ListColumns {
                ticket,
                table,
                result,
            }
        }
        ApiRequest::SendChat {
            ticket,
            session_id,
            message,
        } => ApiOutcome::SendChat {
            ticket,
            result: runtime.send_chat_message(&session_id, &message),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Api(ApiOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum MenuFocus {
    #[default]
    Tables,
    Columns,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct DbMenuUiState {
    visible: bool,
    focus: MenuFocus,
    table_cursor: usize,
    column_cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    menu: DbMenuUiState,
    help_visible: bool,
    status_line: Option<String>,
    status_token: u64,
}

pub fn run_app<R: AppRuntime>(state: &mut ChatState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();
    tracing::info!(session_id = state.session_id(), "chat view opened");

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    tracing::info!(messages = state.transcript().len(), "chat view closed");
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut ChatState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &mpsc::Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status_line = None;
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Api(outcome) => {
                let ticket = outcome.ticket();
                let effects = state.settle(outcome);
                if effects.is_empty() {
                    tracing::debug!(ticket = ticket.get(), "outcome produced no effects");
                }
                apply_effects(state, runtime, view_data, tx, effects);
            }
        }
    }
}

fn apply_effects<R: AppRuntime>(
    state: &ChatState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &mpsc::Sender<InternalEvent>,
    effects: Vec<ChatEffect>,
) {
    for effect in effects {
        match effect {
            ChatEffect::Appended(id) => {
                tracing::debug!(message_id = id.get(), "transcript appended");
            }
            ChatEffect::Request(request) => {
                tracing::debug!(?request, "dispatching backend request");
                if let Err(error) = runtime.spawn_request(request, tx.clone()) {
                    tracing::error!(%error, "dispatch backend request");
                    emit_status(view_data, tx, format!("request failed to start: {error}"));
                }
            }
        }
    }
    clamp_menu_cursors(state, view_data);
}

fn schedule_status_clear(internal_tx: &mpsc::Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &mpsc::Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status_line = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn dispatch<R: AppRuntime>(
    state: &mut ChatState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &mpsc::Sender<InternalEvent>,
    command: ChatCommand,
) {
    let effects = state.dispatch(command);
    apply_effects(state, runtime, view_data, internal_tx, effects);
}

/// Returns true when the app should exit.
fn handle_key_event<R: AppRuntime>(
    state: &mut ChatState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &mpsc::Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => return true,
            KeyCode::Char('d') => {
                view_data.menu.visible = !view_data.menu.visible;
                return false;
            }
            _ => {}
        }
    }

    if key.code == KeyCode::F(1) {
        view_data.help_visible = !view_data.help_visible;
        return false;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc {
            view_data.help_visible = false;
        }
        return false;
    }

    if view_data.menu.visible {
        handle_menu_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => return true,
        (KeyCode::Enter, _) => submit_input(state, runtime, view_data, internal_tx),
        (KeyCode::Backspace, _) => {
            dispatch(state, runtime, view_data, internal_tx, ChatCommand::Backspace);
        }
        (KeyCode::Char(ch), modifiers)
            if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
        {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                ChatCommand::InsertChar(ch),
            );
        }
        _ => {}
    }
    false
}

fn submit_input<R: AppRuntime>(
    state: &mut ChatState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &mpsc::Sender<InternalEvent>,
) {
    if state.input().trim().is_empty() {
        emit_status(view_data, internal_tx, "type a message first");
        return;
    }
    if !state.can_send() {
        emit_status(view_data, internal_tx, "still waiting for the last answer");
        return;
    }
    dispatch(state, runtime, view_data, internal_tx, ChatCommand::Submit);
}

fn handle_menu_key<R: AppRuntime>(
    state: &mut ChatState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &mpsc::Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => view_data.menu.visible = false,
        KeyCode::Char('c') => {
            if state.can_connect() {
                dispatch(state, runtime, view_data, internal_tx, ChatCommand::Connect);
            } else {
                emit_status(view_data, internal_tx, "already connected or connecting");
            }
        }
        KeyCode::Char('t') => {
            if state.is_connected() && !state.can_choose_table() {
                emit_status(view_data, internal_tx, "tables are loading");
            } else {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    ChatCommand::ChooseTable,
                );
            }
        }
        KeyCode::Char('l') => {
            if state.can_choose_column() {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    ChatCommand::ChooseColumn(None),
                );
            } else {
                emit_status(view_data, internal_tx, "choose a table first");
            }
        }
        KeyCode::Tab | KeyCode::BackTab => {
            view_data.menu.focus = match view_data.menu.focus {
                MenuFocus::Tables => MenuFocus::Columns,
                MenuFocus::Columns => MenuFocus::Tables,
            };
        }
        KeyCode::Up | KeyCode::Char('k') => move_menu_cursor(state, view_data, -1),
        KeyCode::Down | KeyCode::Char('j') => move_menu_cursor(state, view_data, 1),
        KeyCode::Enter => {
            let command = match view_data.menu.focus {
                MenuFocus::Tables => menu_item(
                    state.selection().available_tables.as_deref(),
                    view_data.menu.table_cursor,
                )
                .map(ChatCommand::PickTable),
                MenuFocus::Columns => menu_item(
                    state.selection().available_columns.as_deref(),
                    view_data.menu.column_cursor,
                )
                .map(ChatCommand::PickColumn),
            };
            if let Some(command) = command {
                dispatch(state, runtime, view_data, internal_tx, command);
            }
        }
        _ => {}
    }
}

fn menu_item(items: Option<&[String]>, cursor: usize) -> Option<String> {
    items.and_then(|items| items.get(cursor)).cloned()
}

fn move_menu_cursor(state: &ChatState, view_data: &mut ViewData, delta: isize) {
    let (len, cursor) = match view_data.menu.focus {
        MenuFocus::Tables => (
            state.selection().available_tables.as_ref().map_or(0, Vec::len),
            &mut view_data.menu.table_cursor,
        ),
        MenuFocus::Columns => (
            state.selection().available_columns.as_ref().map_or(0, Vec::len),
            &mut view_data.menu.column_cursor,
        ),
    };
    if len == 0 {
        *cursor = 0;
        return;
    }
    let next = (*cursor as isize + delta).clamp(0, len as isize - 1);
    *cursor = next as usize;
}

fn clamp_menu_cursors(state: &ChatState, view_data: &mut ViewData) {
    let tables = state.selection().available_tables.as_ref().map_or(0, Vec::len);
    let columns = state
        .selection()
        .available_columns
        .as_ref()
        .map_or(0, Vec::len);
    view_data.menu.table_cursor = view_data.menu.table_cursor.min(tables.saturating_sub(1));
    view_data.menu.column_cursor = view_data.menu.column_cursor.min(columns.saturating_sub(1));
}

fn render(frame: &mut ratatui::Frame<'_>, state: &ChatState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let header = Paragraph::new(render_header_text(state))
        .block(Block::default().title("datachat").borders(Borders::ALL))
        .style(Style::default().fg(Color::White));
    frame.render_widget(header, layout[0]);

    let transcript_area = layout[1];
    let lines = render_transcript_lines(state);
    let visible_rows = usize::from(transcript_area.height.saturating_sub(2));
    let skip = lines.len().saturating_sub(visible_rows);
    let styled = lines
        .into_iter()
        .skip(skip)
        .map(|(author, text)| Line::from(Span::styled(text, author_style(author))))
        .collect::<Vec<Line<'_>>>();
    let transcript = Paragraph::new(styled)
        .block(Block::default().title("conversation").borders(Borders::ALL));
    frame.render_widget(transcript, transcript_area);

    let input_style = if state.chat_state().in_flight() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let input = Paragraph::new(render_input_text(state))
        .style(input_style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(input, layout[2]);

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, layout[3]);

    if view_data.menu.visible {
        let area = centered_rect(60, 60, frame.area());
        frame.render_widget(Clear, area);
        let menu = Paragraph::new(render_menu_text(state, &view_data.menu)).block(
            Block::default()
                .title("database")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(menu, area);
    }

    if view_data.help_visible {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn author_style(author: Author) -> Style {
    match author {
        Author::User => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
        Author::Ai => Style::default().fg(Color::Green),
        Author::System => Style::default().fg(Color::Magenta),
    }
}

fn selection_badge(value: Option<&str>) -> String {
    value.map_or_else(|| "none".to_owned(), |name| truncate_label(name, BADGE_CHARS))
}

fn render_header_text(state: &ChatState) -> String {
    let selection = state.selection();
    format!(
        "db: {} | table: {} | column: {} | {}",
        if state.is_connected() {
            "connected"
        } else {
            "disconnected"
        },
        selection_badge(selection.selected_table.as_deref()),
        selection_badge(selection.selected_column.as_deref()),
        state.phase().label(),
    )
}

fn format_clock(message: &Message) -> String {
    message
        .created_at
        .format(&time::macros::format_description!(
            "[hour]:[minute]:[second]"
        ))
        .unwrap_or_default()
}

fn render_transcript_lines(state: &ChatState) -> Vec<(Author, String)> {
    let mut lines = Vec::new();
    for message in state.transcript() {
        let clock = format_clock(message);
        let mut body = message.text.lines();
        let first = body.next().unwrap_or_default();
        lines.push((
            message.sender,
            format!("{clock} {}: {first}", message.sender.label()),
        ));
        for rest in body {
            lines.push((message.sender, format!("    {rest}")));
        }
        if message.sender == Author::System
            && let Some(detail) = &message.detail
        {
            for segment in detail.lines() {
                lines.push((message.sender, format!("    detail: {segment}")));
            }
        }
    }
    lines
}

fn render_input_text(state: &ChatState) -> String {
    if state.chat_state().in_flight() && state.input().is_empty() {
        return "> (waiting for ai...)".to_owned();
    }
    if state.input().is_empty() {
        return "> Type your message here...".to_owned();
    }
    format!("> {}", state.input())
}

fn action_line(key: char, label: &str, enabled: bool) -> String {
    if enabled {
        format!("  [{key}] {label}")
    } else {
        format!("  [{key}] {label} (unavailable)")
    }
}

fn render_list(
    lines: &mut Vec<String>,
    title: &str,
    items: Option<&[String]>,
    selected: Option<&str>,
    cursor: usize,
    focused: bool,
) {
    let marker = if focused { "*" } else { " " };
    lines.push(format!("{marker}{title}"));
    match items {
        None => lines.push("    (not loaded)".to_owned()),
        Some([]) => lines.push("    (none found)".to_owned()),
        Some(items) => {
            for (index, item) in items.iter().enumerate() {
                let pointer = if focused && index == cursor { ">" } else { " " };
                let check = if Some(item.as_str()) == selected {
                    "●"
                } else {
                    " "
                };
                lines.push(format!("  {pointer} {check} {item}"));
            }
        }
    }
}

fn render_menu_text(state: &ChatState, menu: &DbMenuUiState) -> String {
    let selection = state.selection();
    let mut lines = vec![
        action_line(
            'c',
            if state.is_connected() {
                "connected"
            } else if state.connect_state().in_flight() {
                "connecting..."
            } else {
                "connect to database"
            },
            state.can_connect(),
        ),
        action_line('t', "choose table", state.can_choose_table()),
        action_line('l', "choose column", state.can_choose_column()),
        String::new(),
    ];
    render_list(
        &mut lines,
        &format!(
            "tables (selected: {})",
            selection_badge(selection.selected_table.as_deref())
        ),
        selection.available_tables.as_deref(),
        selection.selected_table.as_deref(),
        menu.table_cursor,
        menu.focus == MenuFocus::Tables,
    );
    lines.push(String::new());
    if selection.selected_table.is_some() {
        render_list(
            &mut lines,
            &format!(
                "columns (selected: {})",
                selection_badge(selection.selected_column.as_deref())
            ),
            selection.available_columns.as_deref(),
            selection.selected_column.as_deref(),
            menu.column_cursor,
            menu.focus == MenuFocus::Columns,
        );
        lines.push(String::new());
    }
    lines.push("tab switch list | up/down move | enter pick | esc close".to_owned());
    lines.join("\n")
}

fn help_overlay_text() -> &'static str {
    "enter      send message\n\
     ctrl+d     database menu\n\
     c / t / l  connect, choose table, choose column (in menu)\n\
     tab        switch between table and column lists\n\
     f1         toggle help\n\
     esc        close overlay or quit\n\
     ctrl+c     quit"
}

fn status_text(state: &ChatState, view_data: &ViewData) -> String {
    if let Some(status) = &view_data.status_line {
        return status.clone();
    }
    let mut hints = vec!["enter send", "ctrl+d database", "f1 help", "esc quit"];
    if state.chat_state().in_flight() {
        hints.insert(0, "waiting for ai");
    }
    hints.join(" | ")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, MenuFocus, ViewData, handle_key_event, process_internal_events,
        render_header_text, render_input_text, render_menu_text, render_transcript_lines,
        status_text,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use datachat_app::{
        ApiError, ChatReply, ChatState, ColumnsResponse, ConnectResponse, Sender as Author,
        TablesResponse,
    };
    use std::collections::VecDeque;
    use std::sync::mpsc;

    #[derive(Debug, Default)]
    struct TestRuntime {
        connect_results: VecDeque<Result<ConnectResponse, ApiError>>,
        table_results: VecDeque<Result<TablesResponse, ApiError>>,
        column_results: VecDeque<Result<ColumnsResponse, ApiError>>,
        chat_results: VecDeque<Result<ChatReply, ApiError>>,
        calls: Vec<String>,
    }

    impl AppRuntime for TestRuntime {
        fn connect(&mut self) -> Result<ConnectResponse, ApiError> {
            self.calls.push("connect".to_owned());
            self.connect_results
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::new("unscripted connect")))
        }

        fn list_tables(&mut self) -> Result<TablesResponse, ApiError> {
            self.calls.push("tables".to_owned());
            self.table_results
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::new("unscripted tables")))
        }

        fn list_columns(&mut self, table: &str) -> Result<ColumnsResponse, ApiError> {
            self.calls.push(format!("columns:{table}"));
            self.column_results
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::new("unscripted columns")))
        }

        fn send_chat_message(
            &mut self,
            session_id: &str,
            message: &str,
        ) -> Result<ChatReply, ApiError> {
            self.calls.push(format!("chat:{session_id}:{message}"));
            self.chat_results
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::new("unscripted chat")))
        }
    }

    struct Harness {
        state: ChatState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: mpsc::Sender<InternalEvent>,
        rx: mpsc::Receiver<InternalEvent>,
    }

    impl Harness {
        fn new(runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                state: ChatState::new("default_session", None),
                runtime,
                view_data: ViewData::default(),
                tx,
                rx,
            }
        }

        fn press(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            let quit = handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, modifiers),
            );
            self.pump();
            quit
        }

        fn key(&mut self, code: KeyCode) -> bool {
            self.press(code, KeyModifiers::NONE)
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.key(KeyCode::Char(ch));
            }
        }

        fn pump(&mut self) {
            process_internal_events(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn texts(&self) -> Vec<&str> {
            self.state
                .transcript()
                .iter()
                .map(|message| message.text.as_str())
                .collect()
        }
    }

    fn connected_ok() -> Result<ConnectResponse, ApiError> {
        Ok(ConnectResponse {
            status: "success".to_owned(),
            message: "Successfully connected to the database.".to_owned(),
        })
    }

    #[test]
    fn typing_and_enter_round_trips_through_runtime() {
        let mut harness = Harness::new(TestRuntime {
            chat_results: VecDeque::from([Ok(ChatReply::Response {
                response: "42 rows".to_owned(),
            })]),
            ..TestRuntime::default()
        });

        harness.type_text("count orders");
        assert_eq!(harness.state.input(), "count orders");
        harness.key(KeyCode::Enter);

        assert_eq!(
            harness.runtime.calls,
            vec!["chat:default_session:count orders".to_owned()]
        );
        assert_eq!(harness.texts(), vec!["count orders", "42 rows"]);
        assert_eq!(harness.state.transcript()[1].sender, Author::Ai);
        assert!(harness.state.input().is_empty());
    }

    #[test]
    fn enter_on_blank_input_only_sets_status() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.type_text("  ");
        harness.key(KeyCode::Enter);

        assert!(harness.runtime.calls.is_empty());
        assert!(harness.state.transcript().is_empty());
        assert_eq!(
            harness.view_data.status_line.as_deref(),
            Some("type a message first")
        );
    }

    #[test]
    fn menu_connect_then_choose_table_cascades_to_columns() {
        let mut harness = Harness::new(TestRuntime {
            connect_results: VecDeque::from([connected_ok()]),
            table_results: VecDeque::from([Ok(vec!["orders".to_owned(), "users".to_owned()])]),
            column_results: VecDeque::from([Ok(vec!["id".to_owned(), "total".to_owned()])]),
            ..TestRuntime::default()
        });

        harness.press(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert!(harness.view_data.menu.visible);
        harness.key(KeyCode::Char('c'));
        harness.key(KeyCode::Char('t'));

        assert_eq!(
            harness.runtime.calls,
            vec![
                "connect".to_owned(),
                "tables".to_owned(),
                "columns:orders".to_owned()
            ]
        );
        assert_eq!(
            harness.texts(),
            vec![
                "Successfully connected to the database.",
                "Available tables loaded. Selected: orders",
                "Columns for orders loaded. Selected: id",
            ]
        );
        assert_eq!(
            render_header_text(&harness.state),
            "db: connected | table: orders | column: id | connected"
        );
    }

    #[test]
    fn choose_table_before_connect_appends_guidance_without_call() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.press(KeyCode::Char('d'), KeyModifiers::CONTROL);
        harness.key(KeyCode::Char('t'));

        assert!(harness.runtime.calls.is_empty());
        assert_eq!(harness.texts(), vec!["Please connect to the database first."]);
    }

    #[test]
    fn picking_from_the_menu_lists_updates_selection() {
        let mut harness = Harness::new(TestRuntime {
            connect_results: VecDeque::from([connected_ok()]),
            table_results: VecDeque::from([Ok(vec!["orders".to_owned(), "users".to_owned()])]),
            column_results: VecDeque::from([
                Ok(vec!["id".to_owned(), "total".to_owned()]),
                Ok(vec!["email".to_owned()]),
            ]),
            ..TestRuntime::default()
        });
        harness.press(KeyCode::Char('d'), KeyModifiers::CONTROL);
        harness.key(KeyCode::Char('c'));
        harness.key(KeyCode::Char('t'));

        harness.key(KeyCode::Tab);
        assert_eq!(harness.view_data.menu.focus, MenuFocus::Columns);
        harness.key(KeyCode::Down);
        harness.key(KeyCode::Enter);
        assert_eq!(
            harness.state.selection().selected_column.as_deref(),
            Some("total")
        );

        harness.key(KeyCode::Tab);
        harness.key(KeyCode::Down);
        harness.key(KeyCode::Down);
        harness.key(KeyCode::Enter);
        assert_eq!(
            harness.state.selection().selected_table.as_deref(),
            Some("users")
        );
        assert_eq!(
            harness.runtime.calls.last().map(String::as_str),
            Some("columns:users")
        );
        assert_eq!(
            harness.state.selection().available_columns,
            Some(vec!["email".to_owned()])
        );
        assert_eq!(
            harness.state.selection().selected_column.as_deref(),
            Some("email")
        );
        assert_eq!(harness.view_data.menu.column_cursor, 0);
    }

    #[test]
    fn connect_error_surfaces_as_one_system_message() {
        let mut harness = Harness::new(TestRuntime {
            connect_results: VecDeque::from([Err(ApiError::new("connection refused"))]),
            ..TestRuntime::default()
        });
        harness.press(KeyCode::Char('d'), KeyModifiers::CONTROL);
        harness.key(KeyCode::Char('c'));

        assert_eq!(harness.texts(), vec!["DB Connection Error: connection refused"]);
        assert!(!harness.state.is_connected());
    }

    #[test]
    fn escape_closes_menu_before_quitting() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.press(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert!(!harness.key(KeyCode::Esc));
        assert!(!harness.view_data.menu.visible);
        assert!(harness.key(KeyCode::Esc));
        assert!(harness.press(KeyCode::Char('c'), KeyModifiers::CONTROL));
    }

    #[test]
    fn transcript_lines_show_detail_under_system_errors() {
        let mut harness = Harness::new(TestRuntime {
            chat_results: VecDeque::from([Err(ApiError::new("quota exceeded"))]),
            ..TestRuntime::default()
        });
        harness.type_text("hi");
        harness.key(KeyCode::Enter);

        let lines = render_transcript_lines(&harness.state);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].1.ends_with("you: hi"));
        assert!(lines[1].1.ends_with("sys: Error from AI: quota exceeded"));
        assert_eq!(lines[2], (Author::System, "    detail: quota exceeded".to_owned()));
    }

    #[test]
    fn header_badges_truncate_long_names() {
        let mut harness = Harness::new(TestRuntime {
            connect_results: VecDeque::from([connected_ok()]),
            table_results: VecDeque::from([Ok(vec!["customer_addresses_archive".to_owned()])]),
            column_results: VecDeque::from([Ok(Vec::new())]),
            ..TestRuntime::default()
        });
        harness.press(KeyCode::Char('d'), KeyModifiers::CONTROL);
        harness.key(KeyCode::Char('c'));
        harness.key(KeyCode::Char('t'));

        let header = render_header_text(&harness.state);
        assert!(header.contains("table: customer_addres..."));
        assert!(header.contains("column: none"));
        assert_eq!(
            harness.texts().last().copied(),
            Some("No columns found for table customer_addresses_archive.")
        );
    }

    #[test]
    fn menu_text_marks_unavailable_actions() {
        let state = ChatState::new("s", None);
        let text = render_menu_text(&state, &super::DbMenuUiState::default());
        assert!(text.contains("[c] connect to database"));
        assert!(text.contains("[t] choose table (unavailable)"));
        assert!(text.contains("[l] choose column (unavailable)"));
        assert!(text.contains("(not loaded)"));
        assert!(!text.contains("columns (selected"));
    }

    #[test]
    fn input_and_status_hints() {
        let harness = Harness::new(TestRuntime::default());
        assert_eq!(
            render_input_text(&harness.state),
            "> Type your message here..."
        );
        assert!(status_text(&harness.state, &harness.view_data).contains("ctrl+d database"));
    }

    #[test]
    fn stale_status_clear_is_ignored() {
        let mut harness = Harness::new(TestRuntime::default());
        harness.view_data.status_line = Some("fresh".to_owned());
        harness.view_data.status_token = 2;
        harness
            .tx
            .send(InternalEvent::ClearStatus { token: 1 })
            .expect("channel open");
        harness.pump();
        assert_eq!(harness.view_data.status_line.as_deref(), Some("fresh"));

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: 2 })
            .expect("channel open");
        harness.pump();
        assert!(harness.view_data.status_line.is_none());
    }
}
