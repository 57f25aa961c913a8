use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::Write;

use crate::mapping::CalloutMapping;

/// Class carried by every callout, whatever its mapping.
pub const CALLOUT_CLASS: &str = "paragraph-callout";
/// Class of the inline emoji marker injected by the static renderer.
pub const EMOJI_CLASS: &str = "paragraph-callout-emoji";
/// `id` of the managed `<style>` element.
pub const STYLE_BLOCK_ID: &str = "paragraph-callout-styles";

lazy_static! {
    static ref NON_ALNUM_RUN: Regex =
        Regex::new(r"[^a-z0-9]+").expect("Invalid NON_ALNUM_RUN regex pattern");
}

/// Style class derived from a mapping label: `"Quick Tip!"` becomes
/// `paragraph-callout-quick-tip-`.
pub fn class_name(label: &str) -> String {
    let lowered = label.to_lowercase();
    format!("{}-{}", CALLOUT_CLASS, NON_ALNUM_RUN.replace_all(&lowered, "-"))
}

/// Both classes a decorated callout carries.
pub fn callout_classes(mapping: &CalloutMapping) -> Vec<String> {
    vec![CALLOUT_CLASS.to_string(), class_name(&mapping.label)]
}

/// One rule per mapping binding its class to the configured colors. Color
/// values are emitted verbatim.
pub fn synthesize(mappings: &[CalloutMapping]) -> String {
    let mut css = String::new();
    for mapping in mappings {
        // Writing into a String cannot fail.
        let _ = writeln!(
            css,
            ".{} {{ background-color: {}; border-left: 3px solid {}; }}",
            class_name(&mapping.label),
            mapping.background_color,
            mapping.border_color
        );
    }
    css
}

/// The single style element a host keeps in sync with the mapping table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ManagedStyleBlock {
    css: Option<String>,
}

impl ManagedStyleBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previously injected rules with rules for `mappings`.
    /// Returns `true` when the stylesheet text changed.
    pub fn inject(&mut self, mappings: &[CalloutMapping]) -> bool {
        let css = synthesize(mappings);
        let changed = self.css.as_deref() != Some(css.as_str());
        if let Some(previous) = self.css.replace(css) {
            log::debug!("Replaced callout style block ({} bytes)", previous.len());
        }
        changed
    }

    /// Removes the block, returning its last contents.
    pub fn remove(&mut self) -> Option<String> {
        self.css.take()
    }

    pub fn is_injected(&self) -> bool {
        self.css.is_some()
    }

    pub fn css(&self) -> Option<&str> {
        self.css.as_deref()
    }

    /// The block as an HTML `<style>` element, if injected.
    pub fn to_html(&self) -> Option<String> {
        // A color value containing `</` must not close the element early.
        self.css.as_ref().map(|css| {
            format!(
                "<style id=\"{}\">\n{}</style>",
                STYLE_BLOCK_ID,
                css.replace("</", "<\\/")
            )
        })
    }
}
