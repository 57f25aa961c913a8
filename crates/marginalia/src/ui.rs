use mdcallout::Decoration;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::color::{CalloutColors, CalloutPalette};
use crate::ui_state::{MessageType, Mode};

const GUTTER_WIDTH: u16 = 6;
const CALLOUT_BORDER: &str = "▌";

/// Rows taken by the title and status bars.
pub const CHROME_HEIGHT: u16 = 3;

/// One editor row with callout decorations applied.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedLine {
    pub spans: Vec<Span<'static>>,
    pub colors: CalloutColors,
}

impl DecoratedLine {
    pub fn width(&self) -> usize {
        self.spans.iter().map(|s| s.content.width()).sum()
    }
}

/// Applies the decorations that start on a line to its text.
///
/// `line_from` is the document position of the line's first character.
/// A line decoration colors the row; a replacement swaps its range for the
/// widget's emoji.
pub fn decorate_line(
    text: &str,
    line_from: usize,
    decorations: &[Decoration],
    palette: &CalloutPalette,
) -> DecoratedLine {
    let chars: Vec<char> = text.chars().collect();
    let mut colors = CalloutColors::default();
    let mut spans = Vec::new();
    let mut rest_from = 0;

    for decoration in decorations {
        match decoration {
            Decoration::Line { classes, .. } => {
                colors = palette.colors_for(classes);
            }
            Decoration::Replace { range, widget } => {
                let start = range.start.saturating_sub(line_from).min(chars.len());
                let end = range.end.saturating_sub(line_from).min(chars.len());
                if start < rest_from {
                    continue;
                }
                if start > rest_from {
                    spans.push(Span::raw(chars[rest_from..start].iter().collect::<String>()));
                }
                spans.push(Span::raw(format!("{} ", widget.emoji)));
                rest_from = end;
            }
        }
    }

    if rest_from < chars.len() || spans.is_empty() {
        spans.push(Span::raw(chars[rest_from..].iter().collect::<String>()));
    }

    DecoratedLine { spans, colors }
}

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(0),    // Editor area
            Constraint::Length(2), // Status bar
        ])
        .split(f.size());

    draw_title_bar(f, app, chunks[0]);

    if app.ui_state.mode == Mode::Help {
        draw_help(f, app, chunks[1]);
    } else {
        draw_editor(f, app, chunks[1]);
    }

    draw_status_bar(f, app, chunks[2]);
}

fn draw_title_bar(f: &mut Frame, app: &App, area: Rect) {
    let title = match app.file_manager.get_current_path() {
        Some(path) => format!("  Marginalia -- {}", path.display()),
        None => String::from("  Marginalia -- [New File]"),
    };

    let modified_str = if app.editor.is_modified() {
        " [Modified]"
    } else {
        ""
    };
    let title = format!("{}{}", title, modified_str);

    let title_bar = Paragraph::new(title)
        .style(Style::default().bg(Color::Blue).fg(Color::White))
        .alignment(Alignment::Left);

    f.render_widget(title_bar, area);
}

fn draw_editor(f: &mut Frame, app: &App, area: Rect) {
    let editor_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(GUTTER_WIDTH), // Line numbers and callout border
            Constraint::Min(0),               // Editor content
        ])
        .split(area);

    let editor = &app.editor;
    let decorations = app.decorations();
    let content_width = editor_area[1].width as usize;

    let mut gutter = Vec::new();
    let mut text_lines = Vec::new();
    for line in editor.viewport_lines() {
        let text = editor.line_text(line);
        let line_from = editor.line_start(line);
        let starting = decorations.starting_in(line_from..line_from + text.chars().count() + 1);
        let decorated = decorate_line(&text, line_from, starting, app.palette());

        let border = match decorated.colors.border {
            Some(color) => Span::styled(CALLOUT_BORDER, Style::default().fg(color)),
            None => Span::raw(" "),
        };
        gutter.push(Line::from(vec![
            Span::styled(
                format!("{:>4} ", line + 1),
                Style::default().fg(Color::DarkGray),
            ),
            border,
        ]));

        let width = decorated.width();
        let mut spans = decorated.spans;
        match decorated.colors.background {
            Some(bg) => {
                // Pad so the tint covers the whole row
                if width < content_width {
                    spans.push(Span::raw(" ".repeat(content_width - width)));
                }
                text_lines.push(Line::from(spans).style(Style::default().bg(bg)));
            }
            None => text_lines.push(Line::from(spans)),
        }
    }

    f.render_widget(Paragraph::new(gutter), editor_area[0]);
    f.render_widget(
        Paragraph::new(text_lines).style(Style::default().fg(Color::White)),
        editor_area[1],
    );

    if app.ui_state.mode != Mode::Command {
        let (cursor_line, cursor_col) = editor.cursor_position();
        let viewport = editor.viewport_lines();
        if viewport.contains(&cursor_line) {
            let before: String = editor.line_text(cursor_line).chars().take(cursor_col).collect();
            let x = cell_offset(editor_area[1].x, before.width());
            let y = cell_offset(editor_area[1].y, cursor_line - viewport.start);
            if x < editor_area[1].right() {
                f.set_cursor(x, y);
            }
        }
    }
}

/// Terminal cell `offset` cells past `origin`, clamped to the screen
/// coordinate range.
fn cell_offset(origin: u16, offset: usize) -> u16 {
    origin.saturating_add(u16::try_from(offset).unwrap_or(u16::MAX))
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Command shortcuts
            Constraint::Length(1), // Status message
        ])
        .split(area);

    let key = |k: &'static str| {
        Span::styled(
            k,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    };

    match app.ui_state.mode {
        Mode::Command => {
            let input = Paragraph::new(format!(":{}", app.ui_state.command_buffer))
                .style(Style::default().fg(Color::Yellow));
            f.render_widget(input, chunks[0]);
            let x = cell_offset(chunks[0].x, app.ui_state.command_buffer.width() + 1);
            f.set_cursor(x.min(chunks[0].right().saturating_sub(1)), chunks[0].y);
        }
        mode => {
            let mode_label = match mode {
                Mode::Insert => " -- INSERT -- ",
                _ => " NORMAL ",
            };
            let shortcuts = vec![
                Span::styled(
                    mode_label,
                    Style::default().bg(Color::Blue).fg(Color::White),
                ),
                Span::raw(" "),
                key(":"),
                Span::raw(" Command  "),
                key("i"),
                Span::raw(" Insert  "),
                key(":callout"),
                Span::raw(" Callouts  "),
                key("?"),
                Span::raw(" Help"),
            ];

            let shortcut_bar =
                Paragraph::new(Line::from(shortcuts)).style(Style::default().bg(Color::DarkGray));
            f.render_widget(shortcut_bar, chunks[0]);
        }
    }

    if let Some(status) = app.ui_state.status() {
        let color = match status.message_type {
            MessageType::Info => Color::Yellow,
            MessageType::Success => Color::Green,
            MessageType::Error => Color::Red,
        };
        let message = Paragraph::new(status.content.clone()).style(Style::default().fg(color));
        f.render_widget(message, chunks[1]);
    }
}

fn draw_help(f: &mut Frame, app: &App, area: Rect) {
    let mut help_text = vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            " HELP -- Key Bindings and Commands",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from(" Normal Mode:"),
        Line::from("  h j k l / arrows       - Move"),
        Line::from("  0 $                    - Line start / end"),
        Line::from("  i a o O                - Insert, append, open line below / above"),
        Line::from("  x dd yy p              - Delete char, delete line, yank line, paste"),
        Line::from("  Esc                    - Back to normal mode"),
        Line::from(""),
        Line::from(" File Commands:"),
        Line::from("  :w [file]              - Save"),
        Line::from("  :q  :q!  :wq           - Quit, force quit, save and quit"),
        Line::from("  :export [file]         - Write an HTML page with callouts"),
        Line::from(""),
        Line::from(" Callout Commands:"),
        Line::from("  :callout list          - Show mappings"),
        Line::from("  :callout add           - Append a new mapping"),
        Line::from("  :callout set N F V     - Set field F of mapping N to V"),
        Line::from("                           (prefix, emoji, label, bg, border)"),
        Line::from("  :callout delete N      - Remove mapping N"),
        Line::from("  :callout reset         - Restore default mappings"),
        Line::from(""),
        Line::from(" Current Callouts:"),
    ];

    for (i, mapping) in app.mappings().iter().enumerate() {
        help_text.push(Line::from(format!(
            "  {:>2}. '{}'  {}  {:<16} bg {}  border {}",
            i + 1,
            mapping.prefix,
            mapping.emoji,
            mapping.label,
            mapping.background_color,
            mapping.border_color
        )));
    }

    help_text.push(Line::from(""));
    help_text.push(Line::from(vec![Span::styled(
        " Press ? or Esc to exit help",
        Style::default().add_modifier(Modifier::ITALIC),
    )]));

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Left);

    f.render_widget(help, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdcallout::{EmojiWidget, MappingTable};

    fn palette() -> CalloutPalette {
        CalloutPalette::from_mappings(MappingTable::defaults().as_slice())
    }

    #[test]
    fn test_cursor_cell_offset_saturates() {
        assert_eq!(cell_offset(5, 3), 8);
        assert_eq!(cell_offset(5, 100_000), u16::MAX);
        assert_eq!(cell_offset(u16::MAX - 1, 4), u16::MAX);
    }

    fn text_of(line: &DecoratedLine) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_plain_line_is_untouched() {
        let line = decorate_line("hello", 10, &[], &palette());
        assert_eq!(text_of(&line), "hello");
        assert_eq!(line.colors, CalloutColors::default());
    }

    #[test]
    fn test_callout_line_gets_emoji_and_colors() {
        let decorations = vec![
            Decoration::Line {
                range: 10..10,
                classes: vec![
                    "paragraph-callout".to_string(),
                    "paragraph-callout-alert".to_string(),
                ],
            },
            Decoration::Replace {
                range: 10..12,
                widget: EmojiWidget::new("🚨"),
            },
        ];
        let line = decorate_line("! Server is down", 10, &decorations, &palette());

        assert_eq!(text_of(&line), "🚨 Server is down");
        assert_eq!(line.colors.border, Some(Color::Rgb(255, 0, 0)));
        assert_eq!(line.colors.background, Some(Color::Rgb(26, 0, 0)));
    }

    #[test]
    fn test_line_decoration_without_replacement_keeps_prefix() {
        let decorations = vec![Decoration::Line {
            range: 0..0,
            classes: vec![
                "paragraph-callout".to_string(),
                "paragraph-callout-note".to_string(),
            ],
        }];
        let line = decorate_line("; editing here", 0, &decorations, &palette());

        assert_eq!(text_of(&line), "; editing here");
        assert_eq!(line.colors.border, Some(Color::Rgb(0, 0, 255)));
    }

    #[test]
    fn test_replacement_on_bare_prefix_line() {
        let decorations = vec![Decoration::Replace {
            range: 4..6,
            widget: EmojiWidget::new("💡"),
        }];
        let line = decorate_line("~ ", 4, &decorations, &palette());
        assert_eq!(text_of(&line), "💡 ");
        assert_eq!(line.width(), 3);
    }
}
