use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use mdcallout::markdown::to_html_document;
use mdcallout::{
    CalloutDecorator, CalloutMapping, CalloutSettings, DecorationSet, ManagedStyleBlock,
    MappingTable, SharedMappings,
};
use std::cell::{Ref, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use crate::color::CalloutPalette;
use crate::command_processor::{CalloutCommand, Command, CommandProcessor};
use crate::config::SettingsStore;
use crate::editor::{Editor, EditorView, SyntaxCache, ViewState};
use crate::file_manager::FileManager;
use crate::ui_state::{Mode, UIState};

pub struct App {
    pub editor: Editor,
    pub ui_state: UIState,
    pub file_manager: FileManager,
    command_processor: CommandProcessor,
    settings_store: SettingsStore,
    mappings: SharedMappings,
    decorator: CalloutDecorator<SharedMappings>,
    styles: ManagedStyleBlock,
    palette: CalloutPalette,
    syntax: SyntaxCache,
    last_view: ViewState,
    last_key: Option<char>,
}

impl App {
    pub async fn new() -> Result<Self> {
        Self::with_store(SettingsStore::locate()).await
    }

    pub async fn with_store(settings_store: SettingsStore) -> Result<Self> {
        let settings = settings_store.load().await?;
        let editor = Editor::new();

        let mut styles = ManagedStyleBlock::new();
        styles.inject(settings.mappings.as_slice());
        let palette = CalloutPalette::from_mappings(settings.mappings.as_slice());

        let mappings: SharedMappings = Rc::new(RefCell::new(settings.mappings));
        let mut syntax = SyntaxCache::new();
        let decorator = {
            let tree = syntax.refresh(&editor);
            CalloutDecorator::new(Rc::clone(&mappings), &EditorView::new(&editor, Some(tree)))
        };
        let last_view = editor.view_state();

        Ok(Self {
            editor,
            ui_state: UIState::new(),
            file_manager: FileManager::new(),
            command_processor: CommandProcessor::new(),
            settings_store,
            mappings,
            decorator,
            styles,
            palette,
            syntax,
            last_view,
            last_key: None,
        })
    }

    pub fn should_quit(&self) -> bool {
        self.ui_state.should_quit
    }

    pub fn is_modified(&self) -> bool {
        self.editor.is_modified()
    }

    pub fn quit(&mut self) {
        if self.styles.remove().is_some() {
            log::debug!("Removed callout style block");
        }
        self.ui_state.quit();
    }

    pub fn decorations(&self) -> &DecorationSet {
        self.decorator.decorations()
    }

    pub fn palette(&self) -> &CalloutPalette {
        &self.palette
    }

    pub fn mappings(&self) -> Ref<'_, MappingTable> {
        self.mappings.borrow()
    }

    pub fn styles(&self) -> &ManagedStyleBlock {
        &self.styles
    }

    pub async fn open_file(&mut self, path: PathBuf) -> Result<()> {
        let content = self.file_manager.open_file(path).await?;
        self.editor.set_content(content);
        self.sync_decorations();
        Ok(())
    }

    /// Fits the viewport to the terminal's editor area.
    pub fn resize(&mut self, height: usize) {
        if self.editor.viewport_height() != height {
            self.editor.set_viewport_height(height);
            self.sync_decorations();
        }
    }

    /// Rebuilds decorations if the document, viewport or cursor moved
    /// since the last sync.
    pub fn sync_decorations(&mut self) {
        let state = self.editor.view_state();
        let update = self.last_view.diff(&state);
        self.last_view = state;
        if !update.needs_rebuild() {
            return;
        }

        let tree = self.syntax.refresh(&self.editor);
        let view = EditorView::new(&self.editor, Some(tree));
        self.decorator.update(update, &view);
    }

    fn refresh_decorations(&mut self) {
        self.last_view = self.editor.view_state();
        let tree = self.syntax.refresh(&self.editor);
        let view = EditorView::new(&self.editor, Some(tree));
        self.decorator.refresh(&view);
    }

    pub fn update_status(&mut self) {
        self.ui_state.update_status();
    }

    pub async fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        let result = match self.ui_state.mode {
            Mode::Normal => {
                self.handle_normal_mode_key(key);
                Ok(())
            }
            Mode::Insert => {
                self.handle_insert_mode_key(key);
                Ok(())
            }
            Mode::Command => self.handle_command_key(key).await,
            Mode::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                    self.ui_state.toggle_help();
                }
                Ok(())
            }
        };
        self.sync_decorations();
        result
    }

    fn handle_normal_mode_key(&mut self, key: KeyEvent) {
        let pending = self.last_key.take();

        match key.code {
            KeyCode::Char('h') | KeyCode::Left => self.editor.move_cursor_left(),
            KeyCode::Char('j') | KeyCode::Down => self.editor.move_cursor_down(),
            KeyCode::Char('k') | KeyCode::Up => self.editor.move_cursor_up(),
            KeyCode::Char('l') | KeyCode::Right => self.editor.move_cursor_right(),

            KeyCode::Char('0') | KeyCode::Home => self.editor.move_to_line_start(),
            KeyCode::Char('$') | KeyCode::End => self.editor.move_to_line_end(),
            KeyCode::PageUp => self.editor.page_up(),
            KeyCode::PageDown => self.editor.page_down(),

            KeyCode::Char('i') => self.ui_state.enter_insert_mode(),
            KeyCode::Char('a') => {
                self.editor.move_cursor_right();
                self.ui_state.enter_insert_mode();
            }
            KeyCode::Char('o') => {
                self.editor.move_to_line_end();
                self.editor.insert_newline();
                self.ui_state.enter_insert_mode();
            }
            KeyCode::Char('O') => {
                self.editor.move_to_line_start();
                self.editor.insert_newline();
                self.editor.move_cursor_up();
                self.ui_state.enter_insert_mode();
            }

            KeyCode::Char('x') => self.editor.delete_char_forward(),
            KeyCode::Char('d') if pending == Some('d') => {
                self.editor.delete_line();
                self.ui_state
                    .set_success_message("Line deleted and yanked".to_string());
            }
            KeyCode::Char('y') if pending == Some('y') => {
                self.editor.yank_line();
                self.ui_state.set_info_message("Line yanked".to_string());
            }
            KeyCode::Char(c @ ('d' | 'y')) => self.last_key = Some(c),
            KeyCode::Char('p') => self.editor.paste(),

            KeyCode::Char(':') => self.ui_state.enter_command_mode(),
            KeyCode::Char('?') => self.ui_state.toggle_help(),

            _ => {}
        }
    }

    fn handle_insert_mode_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.ui_state.enter_normal_mode(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.editor.insert_char(c)
            }
            KeyCode::Enter => self.editor.insert_newline(),
            KeyCode::Backspace => self.editor.delete_char_backward(),
            KeyCode::Delete => self.editor.delete_char_forward(),
            KeyCode::Tab => self.editor.insert_tab(),

            KeyCode::Left => self.editor.move_cursor_left(),
            KeyCode::Right => self.editor.move_cursor_right(),
            KeyCode::Up => self.editor.move_cursor_up(),
            KeyCode::Down => self.editor.move_cursor_down(),

            _ => {}
        }
    }

    async fn handle_command_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Enter => {
                let command = std::mem::take(&mut self.ui_state.command_buffer);
                self.ui_state.add_to_history(command.clone());
                self.ui_state.enter_normal_mode();

                match self.run_command_line(&command).await {
                    Ok(message) if message.is_empty() => {}
                    Ok(message) => self.ui_state.set_success_message(message),
                    Err(e) => {
                        log::warn!("Command '{}' failed: {}", command, e);
                        self.ui_state.set_error_message(e.to_string());
                    }
                }
            }
            KeyCode::Esc => {
                self.ui_state.command_buffer.clear();
                self.ui_state.enter_normal_mode();
            }
            KeyCode::Up => self.ui_state.history_up(),
            KeyCode::Down => self.ui_state.history_down(),
            KeyCode::Backspace => {
                if self.ui_state.command_buffer.pop().is_none() {
                    self.ui_state.enter_normal_mode();
                }
            }
            KeyCode::Char(c) => self.ui_state.command_buffer.push(c),
            _ => {}
        }
        Ok(())
    }

    /// Parses and runs one `:` command, returning the status message.
    pub async fn run_command_line(&mut self, line: &str) -> Result<String> {
        match self.command_processor.parse(line)? {
            Some(command) => self.execute(command).await,
            None => Ok(String::new()),
        }
    }

    async fn execute(&mut self, command: Command) -> Result<String> {
        match command {
            Command::Write(Some(path)) => self.file_manager.save_file_as(path, &mut self.editor).await,
            Command::Write(None) => self.file_manager.save_file(&mut self.editor).await,
            Command::Quit => {
                if self.editor.is_modified() {
                    Err(anyhow::anyhow!(
                        "No write since last change (use :q! to override)"
                    ))
                } else {
                    self.quit();
                    Ok(String::new())
                }
            }
            Command::ForceQuit => {
                self.quit();
                Ok(String::new())
            }
            Command::WriteQuit => {
                let message = self.file_manager.save_file(&mut self.editor).await?;
                self.quit();
                Ok(message)
            }
            Command::Export(path) => self.export(path).await,
            Command::Help => {
                self.ui_state.toggle_help();
                Ok(String::new())
            }
            Command::Callout(command) => self.run_callout_command(command).await,
        }
    }

    async fn export(&mut self, explicit: Option<PathBuf>) -> Result<String> {
        let path = self
            .file_manager
            .export_path(explicit)
            .ok_or_else(|| anyhow::anyhow!("No file name specified"))?;

        let html = {
            let mappings = self.mappings.borrow();
            to_html_document(
                &self.editor.get_content(),
                mappings.as_slice(),
                &self.styles,
                &self.file_manager.display_name(),
            )
        };
        self.file_manager.write_export(&path, &html).await
    }

    async fn run_callout_command(&mut self, command: CalloutCommand) -> Result<String> {
        if command == CalloutCommand::List {
            return Ok(self.describe_mappings());
        }

        let message = {
            let mut table = self.mappings.borrow_mut();
            match command {
                CalloutCommand::List => String::new(),
                CalloutCommand::Add => {
                    let index = table.push(CalloutMapping::placeholder());
                    format!(
                        "Added callout #{} (set its prefix with :callout set {} prefix <char>)",
                        index + 1,
                        index + 1
                    )
                }
                CalloutCommand::Set {
                    index,
                    field,
                    value,
                } => {
                    let mapping = table
                        .get_mut(index)
                        .ok_or_else(|| anyhow::anyhow!("No callout #{}", index + 1))?;
                    mapping.set_field(field, &value);
                    format!(
                        "Callout #{} {} = '{}'",
                        index + 1,
                        field.name(),
                        mapping.field(field)
                    )
                }
                CalloutCommand::Delete(index) => {
                    let removed = table
                        .remove(index)
                        .ok_or_else(|| anyhow::anyhow!("No callout #{}", index + 1))?;
                    format!("Deleted callout '{}'", removed.label)
                }
                CalloutCommand::Reset => {
                    table.reset();
                    String::from("Restored default callouts")
                }
            }
        };

        self.settings_changed().await?;
        Ok(message)
    }

    /// Persists the table and brings styles and decorations up to date.
    async fn settings_changed(&mut self) -> Result<()> {
        let settings = CalloutSettings {
            mappings: self.mappings.borrow().clone(),
        };
        self.styles.inject(settings.mappings.as_slice());
        self.palette = CalloutPalette::from_mappings(settings.mappings.as_slice());
        self.refresh_decorations();
        self.settings_store.save(&settings).await
    }

    fn describe_mappings(&self) -> String {
        let table = self.mappings.borrow();
        if table.is_empty() {
            return String::from("No callouts configured");
        }
        table
            .iter()
            .enumerate()
            .map(|(i, m)| format!("{}: '{}' {} {}", i + 1, m.prefix, m.emoji, m.label))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
