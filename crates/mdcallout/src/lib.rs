//! Callout paragraphs for Markdown.
//!
//! A paragraph whose first character is a configured prefix followed by a
//! space becomes a *callout*: the prefix is shown as an emoji and the block
//! gets a label-derived style class. Two surfaces are supported:
//!
//! - live editing, through [`CalloutDecorator`] over a host's
//!   [`LiveDocument`];
//! - rendered HTML, through [`render`] over an element tree (or
//!   [`markdown::to_html`] end to end).

pub mod classify;
pub mod decorator;
pub mod dom;
pub mod mapping;
pub mod markdown;
pub mod render;
pub mod sanitize;
pub mod style;
pub mod syntax;

pub use classify::classify;
pub use decorator::{
    build_decorations, CalloutDecorator, Decoration, DecorationSet, DocLine, EmojiWidget,
    LiveDocument, ViewUpdate,
};
pub use mapping::{
    CalloutMapping, CalloutSettings, MappingField, MappingSource, MappingTable, SharedMappings,
};
pub use markdown::to_html;
pub use render::render;
pub use style::{class_name, synthesize, ManagedStyleBlock};
pub use syntax::{is_inside_code_region, MarkdownTree, SyntaxTree};
