// Marginalia library exports

pub mod app;
pub mod color;
pub mod command_processor;
pub mod config;
pub mod editor;
pub mod file_manager;
pub mod ui;
pub mod ui_state;

pub use app::App;
pub use config::SettingsStore;
pub use editor::{Editor, EditorView};
pub use ui_state::{Mode, UIState};
