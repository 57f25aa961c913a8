use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::LevelFilter;
use marginalia::app::App;
use marginalia::config::SettingsStore;
use marginalia::ui;
use mdcallout::markdown::to_html_document;
use mdcallout::ManagedStyleBlock;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::path::PathBuf;
use std::{env, io, time::Duration};

const USAGE: &str = "Usage:
  marginalia [FILE]              Edit FILE with live callouts
  marginalia render FILE [OUT]   Write FILE as an HTML page (to OUT or stdout)";

#[tokio::main]
async fn main() -> Result<()> {
    let mut logger = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(LevelFilter::Info);
        logger.filter_module("marginalia", LevelFilter::Debug);
    }
    logger.init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some("render") => match (args.get(1), args.get(2)) {
            (Some(input), output) => render(PathBuf::from(input), output.map(PathBuf::from)).await,
            (None, _) => Err(anyhow::anyhow!("render needs an input file\n{}", USAGE)),
        },
        file => run_editor(file.map(PathBuf::from)).await,
    }
}

/// Renders a Markdown file to a standalone HTML page without the TUI.
async fn render(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let settings = SettingsStore::locate().load().await?;
    let source = tokio::fs::read_to_string(&input)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", input.display(), e))?;

    let mut styles = ManagedStyleBlock::new();
    styles.inject(settings.mappings.as_slice());
    let title = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let page = to_html_document(&source, settings.mappings.as_slice(), &styles, &title);

    match output {
        Some(path) => {
            tokio::fs::write(&path, page)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
            log::info!("Rendered {} to {}", input.display(), path.display());
        }
        None => print!("{}", page),
    }
    Ok(())
}

async fn run_editor(file: Option<PathBuf>) -> Result<()> {
    // Restore the terminal before the panic message is printed
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));

    let mut app = App::new().await?;
    if let Some(path) = file {
        match app.open_file(path.clone()).await {
            Ok(()) => {
                app.ui_state
                    .set_info_message(format!("Opened {}", path.display()));
            }
            Err(e) => {
                log::error!("Failed to load file '{}': {}", path.display(), e);
                app.ui_state.set_error_message(e.to_string());
                // Keep the name so :w creates the file
                if !path.exists() {
                    app.file_manager.current_path = Some(path);
                }
            }
        }
    } else {
        log::info!("No file specified, starting with empty buffer");
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
        let _ = disable_raw_mode();
        return Err(e.into());
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app).await;

    restore_terminal()?;

    if let Err(err) = res {
        log::error!("Application error: {}", err);
        eprintln!("Error: {}", err);
    }
    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    loop {
        let height = terminal.size()?.height.saturating_sub(ui::CHROME_HEIGHT);
        app.resize(height as usize);

        if let Err(e) = terminal.draw(|f| ui::draw(f, &app)) {
            log::error!("Terminal draw error: {}", e);
        }

        app.update_status();

        if app.should_quit() {
            log::info!("Application shutdown requested");
            break;
        }

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        if app.is_modified() {
                            app.ui_state.set_info_message(
                                "Unsaved changes (:wq to save and quit, :q! to discard)"
                                    .to_string(),
                            );
                        } else {
                            app.quit();
                        }
                        continue;
                    }
                    if let Err(e) = app.handle_key_event(key).await {
                        log::error!("Key event handling error: {}", e);
                        app.ui_state.set_error_message(e.to_string());
                    }
                }
                Event::Resize(_, _) => {
                    log::debug!("Terminal resized");
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen, DisableMouseCapture)?;
    let _ = execute!(stdout, crossterm::cursor::Show);
    Ok(())
}
