use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Insert,
    Command,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub content: String,
    pub message_type: MessageType,
    created_at: Instant,
}

impl StatusMessage {
    fn new(content: String, message_type: MessageType) -> Self {
        Self {
            content,
            message_type,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self) -> bool {
        let ttl = match self.message_type {
            MessageType::Info => Duration::from_secs(4),
            MessageType::Success => Duration::from_secs(3),
            MessageType::Error => Duration::from_secs(7),
        };
        self.created_at.elapsed() > ttl
    }
}

const HISTORY_LIMIT: usize = 100;

pub struct UIState {
    pub mode: Mode,
    pub command_buffer: String,
    pub should_quit: bool,
    status: Option<StatusMessage>,
    command_history: Vec<String>,
    history_index: Option<usize>,
}

impl UIState {
    pub fn new() -> Self {
        Self {
            mode: Mode::Normal,
            command_buffer: String::new(),
            should_quit: false,
            status: None,
            command_history: Vec::new(),
            history_index: None,
        }
    }

    pub fn enter_normal_mode(&mut self) {
        self.mode = Mode::Normal;
    }

    pub fn enter_insert_mode(&mut self) {
        self.mode = Mode::Insert;
    }

    pub fn enter_command_mode(&mut self) {
        self.mode = Mode::Command;
        self.command_buffer.clear();
        self.history_index = None;
    }

    pub fn toggle_help(&mut self) {
        self.mode = if self.mode == Mode::Help {
            Mode::Normal
        } else {
            Mode::Help
        };
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn set_info_message(&mut self, message: String) {
        self.status = Some(StatusMessage::new(message, MessageType::Info));
    }

    pub fn set_success_message(&mut self, message: String) {
        self.status = Some(StatusMessage::new(message, MessageType::Success));
    }

    pub fn set_error_message(&mut self, message: String) {
        self.status = Some(StatusMessage::new(message, MessageType::Error));
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    /// Drops the status message once it has been shown long enough.
    pub fn update_status(&mut self) {
        if self.status.as_ref().is_some_and(StatusMessage::is_expired) {
            self.status = None;
        }
    }

    pub fn add_to_history(&mut self, command: String) {
        // Skip empty commands and repeats of the last one
        if !command.is_empty() && self.command_history.last() != Some(&command) {
            self.command_history.push(command);
            if self.command_history.len() > HISTORY_LIMIT {
                self.command_history.remove(0);
            }
        }
        self.history_index = None;
    }

    pub fn history_up(&mut self) {
        if self.command_history.is_empty() {
            return;
        }

        let new_index = match self.history_index {
            None => self.command_history.len() - 1,
            Some(i) => i.saturating_sub(1),
        };

        self.history_index = Some(new_index);
        self.command_buffer = self.command_history[new_index].clone();
    }

    pub fn history_down(&mut self) {
        match self.history_index {
            Some(i) if i + 1 < self.command_history.len() => {
                self.history_index = Some(i + 1);
                self.command_buffer = self.command_history[i + 1].clone();
            }
            Some(_) => {
                self.history_index = None;
                self.command_buffer.clear();
            }
            None => {}
        }
    }
}

impl Default for UIState {
    fn default() -> Self {
        Self::new()
    }
}
