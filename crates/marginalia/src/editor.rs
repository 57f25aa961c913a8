use mdcallout::{DocLine, LiveDocument, MarkdownTree, SyntaxTree, ViewUpdate};
use ropey::Rope;
use std::borrow::Cow;
use std::cmp;
use std::ops::Range;

#[derive(Clone)]
pub struct Editor {
    rope: Rope,
    cursor_line: usize,
    /// Character index within the cursor line.
    cursor_col: usize,
    viewport_offset: usize,
    viewport_height: usize,
    modified: bool,
    clipboard: String,
    // Bumped on every content change
    revision: u64,
    tab_size: usize,
}

/// What the live view looked like at one point, for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub revision: u64,
    pub viewport: (usize, usize),
    pub cursor: usize,
}

impl ViewState {
    /// The update that leads from `self` to `next`.
    pub fn diff(&self, next: &ViewState) -> ViewUpdate {
        ViewUpdate {
            doc_changed: self.revision != next.revision,
            viewport_changed: self.viewport != next.viewport,
            selection_changed: self.cursor != next.cursor,
        }
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            rope: Rope::new(),
            cursor_line: 0,
            cursor_col: 0,
            viewport_offset: 0,
            viewport_height: 24, // Default, will be updated
            modified: false,
            clipboard: String::new(),
            revision: 0,
            tab_size: 4,
        }
    }

    pub fn set_content(&mut self, content: String) {
        self.rope = Rope::from_str(&content);
        self.cursor_line = 0;
        self.cursor_col = 0;
        self.viewport_offset = 0;
        self.modified = false;
        self.revision += 1;
    }

    pub fn get_content(&self) -> String {
        self.rope.to_string()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn cursor_position(&self) -> (usize, usize) {
        (self.cursor_line, self.cursor_col)
    }

    pub fn set_cursor_position(&mut self, line: usize, col: usize) {
        let max_line = self.rope.len_lines().saturating_sub(1);
        self.cursor_line = line.min(max_line);
        self.cursor_col = col.min(self.line_len(self.cursor_line));
        self.adjust_viewport();
    }

    /// Document position of the cursor.
    pub fn cursor_char_idx(&self) -> usize {
        self.line_col_to_char_idx(self.cursor_line, self.cursor_col)
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height;
        self.adjust_viewport();
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    pub fn set_viewport_offset(&mut self, offset: usize) {
        let max_offset = self.rope.len_lines().saturating_sub(self.viewport_height);
        self.viewport_offset = offset.min(max_offset);
    }

    pub fn get_viewport_offset(&self) -> usize {
        self.viewport_offset
    }

    /// Line indices currently on screen.
    pub fn viewport_lines(&self) -> Range<usize> {
        let end_line = cmp::min(
            self.viewport_offset + self.viewport_height,
            self.rope.len_lines(),
        );
        self.viewport_offset..end_line
    }

    /// Text of `line` without its line break.
    pub fn line_text(&self, line: usize) -> String {
        match self.rope.get_line(line) {
            Some(slice) => slice.chars().take(self.line_len(line)).collect(),
            None => String::new(),
        }
    }

    /// Length of `line` in characters, excluding the line break.
    pub fn line_len(&self, line: usize) -> usize {
        let Some(slice) = self.rope.get_line(line) else {
            return 0;
        };
        let mut len = slice.len_chars();
        if len > 0 && slice.char(len - 1) == '\n' {
            len -= 1;
            if len > 0 && slice.char(len - 1) == '\r' {
                len -= 1;
            }
        }
        len
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.rope.line_to_char(line.min(self.rope.len_lines()))
    }

    pub fn view_state(&self) -> ViewState {
        ViewState {
            revision: self.revision,
            viewport: (self.viewport_offset, self.viewport_height),
            cursor: self.cursor_char_idx(),
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let char_idx = self.cursor_char_idx();
        self.rope.insert_char(char_idx, c);
        self.cursor_col += 1;
        self.touch();
    }

    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.insert_newline();
            } else {
                self.insert_char(c);
            }
        }
    }

    pub fn insert_newline(&mut self) {
        let char_idx = self.cursor_char_idx();
        self.rope.insert_char(char_idx, '\n');
        self.cursor_line += 1;
        self.cursor_col = 0;
        self.adjust_viewport();
        self.touch();
    }

    pub fn insert_tab(&mut self) {
        for _ in 0..self.tab_size {
            self.insert_char(' ');
        }
    }

    pub fn delete_char_backward(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
            let char_idx = self.cursor_char_idx();
            self.rope.remove(char_idx..char_idx + 1);
            self.touch();
        } else if self.cursor_line > 0 {
            let line_start = self.rope.line_to_char(self.cursor_line);
            self.cursor_line -= 1;
            self.cursor_col = self.line_len(self.cursor_line);
            self.rope.remove(line_start - 1..line_start);
            self.adjust_viewport();
            self.touch();
        }
    }

    pub fn delete_char_forward(&mut self) {
        let char_idx = self.cursor_char_idx();
        if char_idx < self.rope.len_chars() {
            self.rope.remove(char_idx..char_idx + 1);
            self.touch();
        }
    }

    pub fn delete_line(&mut self) {
        if let Some(line) = self.rope.get_line(self.cursor_line) {
            self.clipboard = line.to_string();
            let start_idx = self.rope.line_to_char(self.cursor_line);
            let end_idx = if self.cursor_line + 1 < self.rope.len_lines() {
                self.rope.line_to_char(self.cursor_line + 1)
            } else {
                self.rope.len_chars()
            };
            self.rope.remove(start_idx..end_idx);
            self.cursor_line = self.cursor_line.min(self.rope.len_lines().saturating_sub(1));
            self.cursor_col = 0;
            self.adjust_viewport();
            self.touch();
        }
    }

    pub fn yank_line(&mut self) {
        if let Some(line) = self.rope.get_line(self.cursor_line) {
            self.clipboard = line.to_string();
        }
    }

    pub fn paste(&mut self) {
        if !self.clipboard.is_empty() {
            let char_idx = self.cursor_char_idx();
            self.rope.insert(char_idx, &self.clipboard);
            self.touch();
        }
    }

    pub fn move_cursor_up(&mut self) {
        if self.cursor_line > 0 {
            self.cursor_line -= 1;
            self.adjust_cursor_col();
            self.adjust_viewport();
        }
    }

    pub fn move_cursor_down(&mut self) {
        if self.cursor_line + 1 < self.rope.len_lines() {
            self.cursor_line += 1;
            self.adjust_cursor_col();
            self.adjust_viewport();
        }
    }

    pub fn move_cursor_left(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        } else if self.cursor_line > 0 {
            self.cursor_line -= 1;
            self.cursor_col = self.line_len(self.cursor_line);
            self.adjust_viewport();
        }
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_col < self.line_len(self.cursor_line) {
            self.cursor_col += 1;
        } else if self.cursor_line + 1 < self.rope.len_lines() {
            self.cursor_line += 1;
            self.cursor_col = 0;
            self.adjust_viewport();
        }
    }

    pub fn move_to_line_start(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_to_line_end(&mut self) {
        self.cursor_col = self.line_len(self.cursor_line);
    }

    pub fn page_up(&mut self) {
        self.cursor_line = self.cursor_line.saturating_sub(self.viewport_height);
        self.viewport_offset = self.viewport_offset.saturating_sub(self.viewport_height);
        self.adjust_cursor_col();
    }

    pub fn page_down(&mut self) {
        let max_line = self.rope.len_lines().saturating_sub(1);
        self.cursor_line = cmp::min(self.cursor_line + self.viewport_height, max_line);
        self.viewport_offset = cmp::min(
            self.viewport_offset + self.viewport_height,
            max_line.saturating_sub(self.viewport_height.saturating_sub(1)),
        );
        self.adjust_cursor_col();
        self.adjust_viewport();
    }

    fn touch(&mut self) {
        self.modified = true;
        self.revision += 1;
    }

    fn line_col_to_char_idx(&self, line: usize, col: usize) -> usize {
        self.rope.line_to_char(line) + col.min(self.line_len(line))
    }

    fn adjust_cursor_col(&mut self) {
        self.cursor_col = cmp::min(self.cursor_col, self.line_len(self.cursor_line));
    }

    fn adjust_viewport(&mut self) {
        if self.viewport_height == 0 {
            return;
        }
        if self.cursor_line < self.viewport_offset {
            self.viewport_offset = self.cursor_line;
        } else if self.cursor_line >= self.viewport_offset + self.viewport_height {
            self.viewport_offset = self.cursor_line + 1 - self.viewport_height;
        }
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only live view over an [`Editor`] for the callout decorator.
pub struct EditorView<'a> {
    editor: &'a Editor,
    tree: Option<&'a MarkdownTree>,
}

impl<'a> EditorView<'a> {
    pub fn new(editor: &'a Editor, tree: Option<&'a MarkdownTree>) -> Self {
        Self { editor, tree }
    }
}

impl LiveDocument for EditorView<'_> {
    fn visible_ranges(&self) -> Vec<Range<usize>> {
        let lines = self.editor.viewport_lines();
        if lines.is_empty() {
            return Vec::new();
        }
        let last = lines.end - 1;
        let from = self.editor.line_start(lines.start);
        let to = self.editor.line_start(last) + self.editor.line_len(last);
        vec![from..to]
    }

    fn line_at(&self, position: usize) -> DocLine<'_> {
        let position = position.min(self.editor.len_chars());
        let mut index = self.editor.rope.char_to_line(position);
        // Past the content of a line means inside its terminator; that
        // belongs to the line after it.
        let end = self.editor.line_start(index) + self.editor.line_len(index);
        if position > end && index + 1 < self.editor.line_count() {
            index += 1;
        }
        let from = self.editor.line_start(index);
        DocLine {
            number: index + 1,
            from,
            to: from + self.editor.line_len(index),
            text: Cow::Owned(self.editor.line_text(index)),
        }
    }

    fn selection_head(&self) -> usize {
        self.editor.cursor_char_idx()
    }

    fn syntax_tree(&self) -> Option<&dyn SyntaxTree> {
        self.tree.map(|tree| tree as &dyn SyntaxTree)
    }
}

/// Parsed document structure, reparsed only when the document changes.
#[derive(Default)]
pub struct SyntaxCache {
    revision: Option<u64>,
    tree: MarkdownTree,
}

impl SyntaxCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, editor: &Editor) -> &MarkdownTree {
        if self.revision != Some(editor.revision()) {
            self.tree = MarkdownTree::parse(&editor.get_content());
            self.revision = Some(editor.revision());
            log::debug!("Reparsed document at revision {}", editor.revision());
        }
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdcallout::{build_decorations, MappingTable};

    fn editor_with(content: &str) -> Editor {
        let mut editor = Editor::new();
        editor.set_content(content.to_string());
        editor
    }

    #[test]
    fn test_editor_creation() {
        let editor = Editor::new();
        assert_eq!(editor.cursor_position(), (0, 0));
        assert_eq!(editor.line_count(), 1); // Empty editor has one empty line
        assert!(!editor.is_modified());
    }

    #[test]
    fn test_text_insertion() {
        let mut editor = Editor::new();
        editor.insert_char('H');
        editor.insert_char('i');

        assert_eq!(editor.get_content(), "Hi");
        assert_eq!(editor.cursor_position(), (0, 2));
        assert!(editor.is_modified());
    }

    #[test]
    fn test_newline_insertion() {
        let mut editor = Editor::new();
        editor.insert_str("Hi\n!");

        assert_eq!(editor.get_content(), "Hi\n!");
        assert_eq!(editor.cursor_position(), (1, 1));
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut editor = editor_with("ab\ncd");
        editor.set_cursor_position(1, 0);
        editor.delete_char_backward();

        assert_eq!(editor.get_content(), "abcd");
        assert_eq!(editor.cursor_position(), (0, 2));
    }

    #[test]
    fn test_cursor_movement_stays_in_line() {
        let mut editor = editor_with("abc\nx");
        editor.move_to_line_end();
        assert_eq!(editor.cursor_position(), (0, 3));

        editor.move_cursor_down();
        assert_eq!(editor.cursor_position(), (1, 1));

        editor.move_cursor_right();
        assert_eq!(editor.cursor_position(), (1, 1));

        editor.move_cursor_left();
        editor.move_cursor_left();
        assert_eq!(editor.cursor_position(), (0, 3));
    }

    #[test]
    fn test_revision_tracks_edits_only() {
        let mut editor = editor_with("abc");
        let rev = editor.revision();

        editor.move_cursor_right();
        assert_eq!(editor.revision(), rev);

        editor.insert_char('x');
        assert_eq!(editor.revision(), rev + 1);
    }

    #[test]
    fn test_line_operations() {
        let mut editor = editor_with("one\ntwo\nthree");
        editor.set_cursor_position(1, 0);
        editor.delete_line();
        assert_eq!(editor.get_content(), "one\nthree");

        editor.paste();
        assert_eq!(editor.get_content(), "one\ntwo\nthree");
    }

    #[test]
    fn test_crlf_line_len() {
        let editor = editor_with("! a\r\nb");
        assert_eq!(editor.line_len(0), 3);
        assert_eq!(editor.line_text(0), "! a");
    }

    #[test]
    fn test_line_at_inside_crlf_moves_to_next_line() {
        let editor = editor_with("! a\r\n! b\r\nplain");
        let view = EditorView::new(&editor, None);

        let line = view.line_at(3);
        assert_eq!((line.number, line.from, line.to), (1, 0, 3));

        let line = view.line_at(4);
        assert_eq!((line.number, line.from, line.to), (2, 5, 8));
        assert_eq!(line.text, "! b");

        let line = view.line_at(9);
        assert_eq!((line.number, line.from), (3, 10));
    }

    #[test]
    fn test_crlf_document_decorates_every_callout_line() {
        let mut editor = editor_with("! a\r\n! b\r\n? c\r\nplain");
        editor.set_viewport_height(20);
        editor.set_cursor_position(3, 0);
        let view = EditorView::new(&editor, None);

        let set = build_decorations(&view, &MappingTable::defaults());
        let line_starts: Vec<usize> = set
            .iter()
            .filter(|d| matches!(d, mdcallout::Decoration::Line { .. }))
            .map(|d| d.from())
            .collect();
        assert_eq!(line_starts, vec![0, 5, 10]);
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn test_view_state_diff() {
        let mut editor = editor_with("a\nb");
        let before = editor.view_state();

        editor.move_cursor_down();
        let update = before.diff(&editor.view_state());
        assert!(update.selection_changed);
        assert!(!update.doc_changed);
        assert!(!update.viewport_changed);
    }

    #[test]
    fn test_visible_ranges_follow_viewport() {
        let mut editor = editor_with("l1\nl2\nl3\nl4\nl5");
        editor.set_viewport_height(2);
        editor.set_viewport_offset(1);

        let view = EditorView::new(&editor, None);
        assert_eq!(view.visible_ranges(), vec![3..8]);
    }

    #[test]
    fn test_line_at_reports_bounds() {
        let editor = editor_with("abc\n; note\n");
        let view = EditorView::new(&editor, None);

        let line = view.line_at(6);
        assert_eq!(line.number, 2);
        assert_eq!((line.from, line.to), (4, 10));
        assert_eq!(line.text, "; note");

        let last = view.line_at(editor.len_chars());
        assert_eq!(last.number, 3);
        assert_eq!(last.text, "");
    }

    #[test]
    fn test_editor_view_drives_decorator() {
        let mut editor = editor_with("# Title\n\n! down\n\n```\n! code\n```\n");
        editor.set_viewport_height(20);
        let mut cache = SyntaxCache::new();
        let tree = cache.refresh(&editor);
        let view = EditorView::new(&editor, Some(tree));

        let set = build_decorations(&view, &MappingTable::defaults());
        let starts: Vec<usize> = set.iter().map(|d| d.from()).collect();
        assert_eq!(starts, vec![9, 9]);
    }

    #[test]
    fn test_cursor_on_callout_line_suppresses_emoji() {
        let mut editor = editor_with("x\n? why");
        editor.set_cursor_position(1, 3);
        let view = EditorView::new(&editor, None);

        let set = build_decorations(&view, &MappingTable::defaults());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_syntax_cache_reparses_on_edit() {
        let mut editor = editor_with("text");
        let mut cache = SyntaxCache::new();
        assert_eq!(cache.refresh(&editor).len(), 1);

        editor.move_to_line_end();
        editor.insert_str("\n\n```\ncode\n```");
        assert_eq!(cache.refresh(&editor).len(), 2);
    }
}
