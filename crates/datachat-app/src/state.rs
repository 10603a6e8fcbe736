// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    ApiError, ChatReply, ColumnsResponse, ConnectResponse, EMPTY_QUERY_MESSAGE, MISSING_TABLE_NAME,
    Message, MessageId, RequestState, RequestTicket, Sender, TablesResponse,
};
use time::OffsetDateTime;

pub const DEFAULT_SESSION_ID: &str = "default_session";
pub const DEFAULT_GREETING: &str = "Hello! How can I help you today?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    InsertChar(char),
    Backspace,
    SetInput(String),
    Submit,
    Connect,
    ChooseTable,
    ChooseColumn(Option<String>),
    PickTable(String),
    PickColumn(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    Connect {
        ticket: RequestTicket,
    },
    ListTables {
        ticket: RequestTicket,
    },
    ListColumns {
        ticket: RequestTicket,
        table: String,
    },
    SendChat {
        ticket: RequestTicket,
        session_id: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    Connect {
        ticket: RequestTicket,
        result: Result<ConnectResponse, ApiError>,
    },
    ListTables {
        ticket: RequestTicket,
        result: Result<TablesResponse, ApiError>,
    },
    ListColumns {
        ticket: RequestTicket,
        table: String,
        result: Result<ColumnsResponse, ApiError>,
    },
    SendChat {
        ticket: RequestTicket,
        result: Result<ChatReply, ApiError>,
    },
}

impl ApiOutcome {
    pub const fn ticket(&self) -> RequestTicket {
        match self {
            Self::Connect { ticket, .. }
            | Self::ListTables { ticket, .. }
            | Self::ListColumns { ticket, .. }
            | Self::SendChat { ticket, .. } => *ticket,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEffect {
    Appended(MessageId),
    Request(ApiRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    Connecting,
    Connected,
    ListingTables,
    ListingColumns,
    SendingMessage,
}

impl ChatPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ListingTables => "listing tables",
            Self::ListingColumns => "listing columns",
            Self::SendingMessage => "waiting for ai",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub selected_table: Option<String>,
    pub selected_column: Option<String>,
    pub available_tables: Option<Vec<String>>,
    pub available_columns: Option<Vec<String>>,
}

impl Selection {
    fn select_table(&mut self, table: Option<String>) {
        if self.selected_table != table {
            self.selected_column = None;
            self.available_columns = None;
        }
        self.selected_table = table;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    transcript: Vec<Message>,
    input: String,
    connected: bool,
    selection: Selection,
    session_id: String,
    connect: RequestState<ConnectResponse>,
    tables: RequestState<TablesResponse>,
    columns: RequestState<ColumnsResponse>,
    chat: RequestState<ChatReply>,
    next_message_id: MessageId,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_ID, Some(DEFAULT_GREETING))
    }
}

impl ChatState {
    pub fn new(session_id: &str, greeting: Option<&str>) -> Self {
        let mut state = Self {
            transcript: Vec::new(),
            input: String::new(),
            connected: false,
            selection: Selection::default(),
            session_id: session_id.to_owned(),
            connect: RequestState::default(),
            tables: RequestState::default(),
            columns: RequestState::default(),
            chat: RequestState::default(),
            next_message_id: MessageId::new(1),
        };
        if let Some(greeting) = greeting.filter(|text| !text.trim().is_empty()) {
            state.append(Sender::Ai, greeting, None);
        }
        state
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn connect_state(&self) -> &RequestState<ConnectResponse> {
        &self.connect
    }

    pub fn tables_state(&self) -> &RequestState<TablesResponse> {
        &self.tables
    }

    pub fn columns_state(&self) -> &RequestState<ColumnsResponse> {
        &self.columns
    }

    pub fn chat_state(&self) -> &RequestState<ChatReply> {
        &self.chat
    }

    pub fn phase(&self) -> ChatPhase {
        if self.connect.in_flight() {
            ChatPhase::Connecting
        } else if self.tables.in_flight() {
            ChatPhase::ListingTables
        } else if self.columns.in_flight() {
            ChatPhase::ListingColumns
        } else if self.chat.in_flight() {
            ChatPhase::SendingMessage
        } else if self.connected {
            ChatPhase::Connected
        } else {
            ChatPhase::Idle
        }
    }

    pub fn can_send(&self) -> bool {
        !self.chat.in_flight() && !self.input.trim().is_empty()
    }

    pub fn can_connect(&self) -> bool {
        !self.connected && !self.connect.in_flight()
    }

    pub fn can_choose_table(&self) -> bool {
        self.connected && !self.tables.in_flight() && !self.connect.in_flight()
    }

    pub fn can_choose_column(&self) -> bool {
        self.selection.selected_table.is_some()
            && !self.columns.in_flight()
            && !self.connect.in_flight()
    }

    pub fn dispatch(&mut self, command: ChatCommand) -> Vec<ChatEffect> {
        let mut effects = Vec::new();
        match command {
            ChatCommand::InsertChar(ch) => self.input.push(ch),
            ChatCommand::Backspace => {
                self.input.pop();
            }
            ChatCommand::SetInput(text) => self.input = text,
            ChatCommand::Submit => self.submit(&mut effects),
            ChatCommand::Connect => {
                let ticket = self.connect.begin();
                effects.push(ChatEffect::Request(ApiRequest::Connect { ticket }));
            }
            ChatCommand::ChooseTable => self.choose_table(&mut effects),
            ChatCommand::ChooseColumn(table) => self.choose_column(table, &mut effects),
            ChatCommand::PickTable(table) => {
                let known = self
                    .selection
                    .available_tables
                    .as_ref()
                    .is_some_and(|tables| tables.contains(&table));
                if known {
                    self.selection.select_table(Some(table.clone()));
                    self.choose_column(Some(table), &mut effects);
                }
            }
            ChatCommand::PickColumn(column) => {
                let known = self
                    .selection
                    .available_columns
                    .as_ref()
                    .is_some_and(|columns| columns.contains(&column));
                if known {
                    self.selection.selected_column = Some(column);
                }
            }
        }
        self.observe_errors(&mut effects);
        effects
    }

    pub fn settle(&mut self, outcome: ApiOutcome) -> Vec<ChatEffect> {
        let mut effects = Vec::new();
        match outcome {
            ApiOutcome::Connect { ticket, result } => {
                if let Some(result) = self.connect.settle(ticket, result) {
                    self.connect_settled(result, &mut effects);
                }
            }
            ApiOutcome::ListTables { ticket, result } => {
                if let Some(result) = self.tables.settle(ticket, result) {
                    self.tables_settled(result, &mut effects);
                }
            }
            ApiOutcome::ListColumns {
                ticket,
                table,
                result,
            } => {
                if let Some(result) = self.columns.settle(ticket, result) {
                    self.columns_settled(&table, result, &mut effects);
                }
            }
            ApiOutcome::SendChat { ticket, result } => {
                let result = result.and_then(|reply| match reply.soft_error() {
                    Some(detail) => Err(ApiError::new(detail)),
                    None => Ok(reply),
                });
                if let Some(Ok(reply)) = self.chat.settle(ticket, result) {
                    effects.push(self.append(Sender::Ai, reply.text(), None));
                }
            }
        }
        self.observe_errors(&mut effects);
        effects
    }

    fn submit(&mut self, effects: &mut Vec<ChatEffect>) {
        if self.input.trim().is_empty() {
            self.chat.reject(ApiError::new(EMPTY_QUERY_MESSAGE));
            return;
        }

        let message = std::mem::take(&mut self.input);
        effects.push(self.append(Sender::User, &message, None));
        let ticket = self.chat.begin();
        effects.push(ChatEffect::Request(ApiRequest::SendChat {
            ticket,
            session_id: self.session_id.clone(),
            message,
        }));
    }

    fn choose_table(&mut self, effects: &mut Vec<ChatEffect>) {
        if !self.connected {
            effects.push(self.append(
                Sender::System,
                "Please connect to the database first.",
                None,
            ));
            return;
        }
        let ticket = self.tables.begin();
        effects.push(ChatEffect::Request(ApiRequest::ListTables { ticket }));
    }

    fn choose_column(&mut self, table: Option<String>, effects: &mut Vec<ChatEffect>) {
        let table = table
            .filter(|name| !name.is_empty())
            .or_else(|| self.selection.selected_table.clone());
        let Some(table) = table else {
            effects.push(self.append(
                Sender::System,
                "No table selected to fetch columns for.",
                None,
            ));
            return;
        };
        if table.trim().is_empty() {
            self.columns.reject(ApiError::new(MISSING_TABLE_NAME));
            return;
        }
        let ticket = self.columns.begin();
        effects.push(ChatEffect::Request(ApiRequest::ListColumns { ticket, table }));
    }

    fn connect_settled(
        &mut self,
        result: Result<ConnectResponse, ApiError>,
        effects: &mut Vec<ChatEffect>,
    ) {
        match result {
            Ok(response) if response.is_success() => {
                self.connected = true;
                let text = response
                    .message()
                    .unwrap_or("Successfully connected to database.");
                effects.push(self.append(Sender::System, text, None));
                self.selection = Selection::default();
            }
            Ok(response) => {
                self.connected = false;
                let text = response
                    .message()
                    .unwrap_or("Connection attempt returned a response, but status is unclear.");
                effects.push(self.append(Sender::System, text, None));
            }
            Err(error) => {
                self.connect.mark_error_reported();
                self.connected = false;
                self.selection = Selection::default();
                let detail = error
                    .detail()
                    .unwrap_or("Failed to connect to the database. Unknown error.");
                let text = format!("DB Connection Error: {detail}");
                effects.push(self.append(Sender::System, &text, None));
            }
        }
    }

    fn tables_settled(
        &mut self,
        result: Result<TablesResponse, ApiError>,
        effects: &mut Vec<ChatEffect>,
    ) {
        match result {
            Ok(tables) => {
                let Some(first) = tables.first().cloned() else {
                    self.selection.available_tables = Some(Vec::new());
                    self.selection.select_table(None);
                    self.selection.selected_column = None;
                    effects.push(self.append(
                        Sender::System,
                        "No tables found in the database.",
                        None,
                    ));
                    return;
                };
                self.selection.available_tables = Some(tables);
                self.selection.selected_table = Some(first.clone());
                let text = format!("Available tables loaded. Selected: {first}");
                effects.push(self.append(Sender::System, &text, None));
                self.selection.selected_column = None;
                self.selection.available_columns = None;
                self.choose_column(Some(first), effects);
            }
            Err(error) => {
                self.tables.mark_error_reported();
                let detail = error
                    .detail()
                    .unwrap_or("Failed to fetch tables. Unknown error.");
                let text = format!("Error fetching tables: {detail}");
                effects.push(self.append(Sender::System, &text, None));
                self.selection.available_tables = None;
                self.selection.select_table(None);
                self.selection.selected_column = None;
            }
        }
    }

    fn columns_settled(
        &mut self,
        table: &str,
        result: Result<ColumnsResponse, ApiError>,
        effects: &mut Vec<ChatEffect>,
    ) {
        match result {
            Ok(columns) => {
                let Some(first) = columns.first().cloned() else {
                    self.selection.available_columns = Some(Vec::new());
                    self.selection.selected_column = None;
                    let text = format!("No columns found for table {table}.");
                    effects.push(self.append(Sender::System, &text, None));
                    return;
                };
                self.selection.available_columns = Some(columns);
                self.selection.selected_column = Some(first.clone());
                let text = format!("Columns for {table} loaded. Selected: {first}");
                effects.push(self.append(Sender::System, &text, None));
            }
            Err(error) => {
                self.columns.mark_error_reported();
                let text = match error.detail() {
                    Some(detail) => format!("Error fetching columns: {detail}"),
                    None => format!(
                        "Error fetching columns: Failed to fetch columns for table \"{table}\". Unknown error."
                    ),
                };
                effects.push(self.append(Sender::System, &text, None));
                self.selection.available_columns = None;
                self.selection.selected_column = None;
            }
        }
    }

    fn observe_errors(&mut self, effects: &mut Vec<ChatEffect>) {
        if let Some(error) = self.chat.take_unreported_error() {
            let text = format!(
                "Error from AI: {}",
                error.detail().unwrap_or("An unknown error occurred.")
            );
            effects.push(self.append(Sender::System, &text, Some(error.detail.clone())));
        }
        if let Some(error) = self.connect.take_unreported_error() {
            self.connected = false;
            let text = format!(
                "DB Connection Error: {}",
                error.detail().unwrap_or("Unknown error.")
            );
            effects.push(self.append(Sender::System, &text, None));
        }
        if let Some(error) = self.tables.take_unreported_error() {
            self.selection.available_tables = None;
            let text = format!(
                "Error fetching tables: {}",
                error.detail().unwrap_or("Unknown error.")
            );
            effects.push(self.append(Sender::System, &text, None));
        }
        if let Some(error) = self.columns.take_unreported_error() {
            self.selection.available_columns = None;
            let text = format!(
                "Error fetching columns: {}",
                error.detail().unwrap_or("Unknown error.")
            );
            effects.push(self.append(Sender::System, &text, None));
        }
    }

    fn append(&mut self, sender: Sender, text: &str, detail: Option<String>) -> ChatEffect {
        let id = self.next_message_id.advance();
        self.transcript.push(Message {
            id,
            text: text.to_owned(),
            sender,
            detail,
            created_at: OffsetDateTime::now_utc(),
        });
        ChatEffect::Appended(id)
    }
}
