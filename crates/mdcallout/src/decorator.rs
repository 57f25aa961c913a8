//! Live-view decorations for callout lines.
//!
//! [`CalloutDecorator`] owns the decoration set of one live view. Every
//! qualifying update throws the old set away and scans the visible ranges
//! again:
//!
//! - each callout line outside code gets a [`Decoration::Line`] carrying the
//!   generic and label-derived classes;
//! - unless the selection head sits on that line, its prefix and the
//!   following space are hidden behind an emoji widget
//!   ([`Decoration::Replace`]), so the line being edited keeps its raw text.
//!
//! The host implements [`LiveDocument`] over its own document model and
//! paints the resulting [`DecorationSet`].

use std::borrow::Cow;
use std::ops::Range;

use crate::classify::classify;
use crate::mapping::{MappingSource, MappingTable};
use crate::style::callout_classes;
use crate::syntax::{is_inside_code_region, SyntaxTree};

/// One line of the live document. `from..to` excludes the line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocLine<'a> {
    /// 1-based line number.
    pub number: usize,
    pub from: usize,
    pub to: usize,
    pub text: Cow<'a, str>,
}

/// What the decorator reads from the host's live view. Positions are
/// character offsets into the document.
pub trait LiveDocument {
    /// Currently visible ranges, in document order.
    fn visible_ranges(&self) -> Vec<Range<usize>>;

    /// The line containing `position`.
    fn line_at(&self, position: usize) -> DocLine<'_>;

    /// Head of the main selection, i.e. the edit cursor.
    fn selection_head(&self) -> usize;

    /// Parsed document structure, if the host has one ready.
    fn syntax_tree(&self) -> Option<&dyn SyntaxTree>;
}

/// Widget substituted for a hidden prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiWidget {
    pub emoji: String,
}

impl EmojiWidget {
    pub fn new(emoji: &str) -> Self {
        Self {
            emoji: emoji.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoration {
    /// Style classes for the whole line.
    Line { range: Range<usize>, classes: Vec<String> },
    /// Source span hidden behind a widget.
    Replace { range: Range<usize>, widget: EmojiWidget },
}

impl Decoration {
    pub fn range(&self) -> &Range<usize> {
        match self {
            Decoration::Line { range, .. } | Decoration::Replace { range, .. } => range,
        }
    }

    pub fn from(&self) -> usize {
        self.range().start
    }

    /// Line decorations sort before other decorations at the same position.
    fn sort_key(&self) -> (usize, u8) {
        match self {
            Decoration::Line { range, .. } => (range.start, 0),
            Decoration::Replace { range, .. } => (range.start, 1),
        }
    }
}

/// Decorations of one rebuild, ordered by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Decoration> {
        self.decorations.iter()
    }

    /// Decorations starting inside `range`.
    pub fn starting_in(&self, range: Range<usize>) -> &[Decoration] {
        let lo = self.decorations.partition_point(|d| d.from() < range.start);
        let hi = self.decorations.partition_point(|d| d.from() < range.end);
        &self.decorations[lo..hi.max(lo)]
    }

    pub fn line_decorations(&self) -> impl Iterator<Item = (&Range<usize>, &[String])> {
        self.decorations.iter().filter_map(|d| match d {
            Decoration::Line { range, classes } => Some((range, classes.as_slice())),
            Decoration::Replace { .. } => None,
        })
    }

    pub fn replacements(&self) -> impl Iterator<Item = (&Range<usize>, &EmojiWidget)> {
        self.decorations.iter().filter_map(|d| match d {
            Decoration::Replace { range, widget } => Some((range, widget)),
            Decoration::Line { .. } => None,
        })
    }
}

impl<'a> IntoIterator for &'a DecorationSet {
    type Item = &'a Decoration;
    type IntoIter = std::slice::Iter<'a, Decoration>;

    fn into_iter(self) -> Self::IntoIter {
        self.decorations.iter()
    }
}

/// Accepts decorations in strictly increasing position order only.
#[derive(Debug, Default)]
pub struct DecorationSetBuilder {
    decorations: Vec<Decoration>,
    last_key: Option<(usize, u8)>,
}

impl DecorationSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `decoration`, or drops it with a warning when it would break the
    /// ordering. Returns whether it was kept.
    pub fn add(&mut self, decoration: Decoration) -> bool {
        let key = decoration.sort_key();
        if let Some(last) = self.last_key {
            if key <= last {
                log::warn!(
                    "Dropping out-of-order decoration at {} (previous at {})",
                    key.0,
                    last.0
                );
                return false;
            }
        }
        self.last_key = Some(key);
        self.decorations.push(decoration);
        true
    }

    pub fn finish(self) -> DecorationSet {
        DecorationSet {
            decorations: self.decorations,
        }
    }
}

/// What changed since the last update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewUpdate {
    pub doc_changed: bool,
    pub viewport_changed: bool,
    pub selection_changed: bool,
}

impl ViewUpdate {
    pub fn doc_changed() -> Self {
        Self {
            doc_changed: true,
            ..Self::default()
        }
    }

    pub fn viewport_changed() -> Self {
        Self {
            viewport_changed: true,
            ..Self::default()
        }
    }

    pub fn selection_changed() -> Self {
        Self {
            selection_changed: true,
            ..Self::default()
        }
    }

    pub fn needs_rebuild(&self) -> bool {
        self.doc_changed || self.viewport_changed || self.selection_changed
    }
}

/// Scans the visible ranges of `view` and decorates callout lines.
pub fn build_decorations(view: &dyn LiveDocument, mappings: &MappingTable) -> DecorationSet {
    let lookup = mappings.lookup();
    let mut builder = DecorationSetBuilder::new();
    if lookup.is_empty() {
        return builder.finish();
    }

    let cursor_line = view.line_at(view.selection_head()).number;
    let tree = view.syntax_tree();

    for range in view.visible_ranges() {
        let mut pos = range.start;
        while pos <= range.end {
            let line = view.line_at(pos);

            if let Some(mapping) = classify(&line.text, &lookup) {
                let in_code = tree.is_some_and(|tree| is_inside_code_region(tree, line.from));
                if !in_code {
                    builder.add(Decoration::Line {
                        range: line.from..line.to,
                        classes: callout_classes(mapping),
                    });
                    if line.number != cursor_line {
                        builder.add(Decoration::Replace {
                            range: line.from..line.from + 2,
                            widget: EmojiWidget::new(&mapping.emoji),
                        });
                    }
                }
            }

            let next = line.to + 1;
            if next <= pos {
                log::warn!("Line lookup did not advance past {}, stopping scan", pos);
                break;
            }
            pos = next;
        }
    }

    builder.finish()
}

/// Owns the decoration set of one live view.
pub struct CalloutDecorator<S> {
    source: S,
    decorations: DecorationSet,
}

impl<S: MappingSource> CalloutDecorator<S> {
    pub fn new(source: S, view: &dyn LiveDocument) -> Self {
        let mut decorator = Self {
            source,
            decorations: DecorationSet::empty(),
        };
        decorator.rebuild(view);
        decorator
    }

    /// Rebuilds when the update touched the document, viewport or
    /// selection. Returns whether a rebuild happened.
    pub fn update(&mut self, update: ViewUpdate, view: &dyn LiveDocument) -> bool {
        if !update.needs_rebuild() {
            return false;
        }
        self.rebuild(view);
        true
    }

    /// Forces a rebuild, e.g. after the mapping table changed.
    pub fn refresh(&mut self, view: &dyn LiveDocument) {
        self.rebuild(view);
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn rebuild(&mut self, view: &dyn LiveDocument) {
        self.decorations = self
            .source
            .with_mappings(|mappings| build_decorations(view, mappings));
        log::debug!("Rebuilt callout decorations: {}", self.decorations.len());
    }
}
