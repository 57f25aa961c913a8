//! Prefix → callout style records and their persisted settings shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One configured callout: lines starting with `prefix` followed by a space
/// are shown with `emoji` and the colors below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalloutMapping {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub background_color: String,
    #[serde(default)]
    pub border_color: String,
}

impl CalloutMapping {
    pub fn new(prefix: char, emoji: &str, label: &str, background_color: &str, border_color: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            emoji: emoji.to_string(),
            label: label.to_string(),
            background_color: background_color.to_string(),
            border_color: border_color.to_string(),
        }
    }

    /// Record appended by the settings surface's "add" action. The empty
    /// prefix keeps it inert until the user picks one.
    pub fn placeholder() -> Self {
        Self {
            prefix: String::new(),
            emoji: String::from("📌"),
            label: String::from("New Callout"),
            background_color: String::from("rgba(128, 128, 128, 0.1)"),
            border_color: String::from("gray"),
        }
    }

    /// The prefix character, if the prefix is exactly one character.
    pub fn prefix_char(&self) -> Option<char> {
        let mut chars = self.prefix.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    pub fn set_field(&mut self, field: MappingField, value: &str) {
        match field {
            MappingField::Prefix => self.prefix = normalize_prefix(value),
            MappingField::Emoji => self.emoji = value.to_string(),
            MappingField::Label => self.label = value.to_string(),
            MappingField::BackgroundColor => self.background_color = value.to_string(),
            MappingField::BorderColor => self.border_color = value.to_string(),
        }
    }

    pub fn field(&self, field: MappingField) -> &str {
        match field {
            MappingField::Prefix => &self.prefix,
            MappingField::Emoji => &self.emoji,
            MappingField::Label => &self.label,
            MappingField::BackgroundColor => &self.background_color,
            MappingField::BorderColor => &self.border_color,
        }
    }
}

/// Truncates user input to the single-character prefix the matcher expects.
pub fn normalize_prefix(input: &str) -> String {
    input.chars().next().map(String::from).unwrap_or_default()
}

/// Editable fields of a [`CalloutMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingField {
    Prefix,
    Emoji,
    Label,
    BackgroundColor,
    BorderColor,
}

impl MappingField {
    pub const ALL: [MappingField; 5] = [
        MappingField::Prefix,
        MappingField::Emoji,
        MappingField::Label,
        MappingField::BackgroundColor,
        MappingField::BorderColor,
    ];

    /// Accepts both the persisted camelCase names and a few short aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "prefix" => Some(MappingField::Prefix),
            "emoji" => Some(MappingField::Emoji),
            "label" => Some(MappingField::Label),
            "backgroundcolor" | "background" | "bg" => Some(MappingField::BackgroundColor),
            "bordercolor" | "border" => Some(MappingField::BorderColor),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MappingField::Prefix => "prefix",
            MappingField::Emoji => "emoji",
            MappingField::Label => "label",
            MappingField::BackgroundColor => "backgroundColor",
            MappingField::BorderColor => "borderColor",
        }
    }
}

/// Ordered mapping list. Order is match priority: the first mapping with a
/// given prefix shadows every later one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    mappings: Vec<CalloutMapping>,
}

impl MappingTable {
    pub fn new(mappings: Vec<CalloutMapping>) -> Self {
        Self { mappings }
    }

    pub fn defaults() -> Self {
        Self::new(vec![
            CalloutMapping::new('!', "🚨", "Alert", "rgba(255, 0, 0, 0.1)", "red"),
            CalloutMapping::new('?', "❓", "Question", "rgba(255, 255, 0, 0.1)", "yellow"),
            CalloutMapping::new('~', "💡", "Idea", "rgba(0, 255, 0, 0.1)", "green"),
            CalloutMapping::new(';', "📝", "Note", "rgba(0, 0, 255, 0.1)", "blue"),
        ])
    }

    pub fn as_slice(&self) -> &[CalloutMapping] {
        &self.mappings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CalloutMapping> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CalloutMapping> {
        self.mappings.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CalloutMapping> {
        self.mappings.get_mut(index)
    }

    /// First mapping in declared order whose prefix is `prefix`.
    pub fn find_by_prefix(&self, prefix: char) -> Option<&CalloutMapping> {
        self.mappings.iter().find(|m| m.prefix_char() == Some(prefix))
    }

    /// Builds the per-pass prefix index.
    pub fn lookup(&self) -> PrefixLookup<'_> {
        PrefixLookup::new(&self.mappings)
    }

    pub fn push(&mut self, mapping: CalloutMapping) -> usize {
        self.mappings.push(mapping);
        self.mappings.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<CalloutMapping> {
        if index < self.mappings.len() {
            Some(self.mappings.remove(index))
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        *self = Self::defaults();
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::defaults()
    }
}

impl<'a> IntoIterator for &'a MappingTable {
    type Item = &'a CalloutMapping;
    type IntoIter = std::slice::Iter<'a, CalloutMapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.mappings.iter()
    }
}

/// Transient prefix → mapping index, first declaration wins.
#[derive(Debug)]
pub struct PrefixLookup<'m> {
    by_prefix: HashMap<char, &'m CalloutMapping>,
}

impl<'m> PrefixLookup<'m> {
    pub fn new(mappings: &'m [CalloutMapping]) -> Self {
        let mut by_prefix = HashMap::with_capacity(mappings.len());
        for mapping in mappings {
            // Empty or multi-character prefixes can never match.
            if let Some(prefix) = mapping.prefix_char() {
                by_prefix.entry(prefix).or_insert(mapping);
            }
        }
        Self { by_prefix }
    }

    pub fn get(&self, prefix: char) -> Option<&'m CalloutMapping> {
        self.by_prefix.get(&prefix).copied()
    }

    pub fn len(&self) -> usize {
        self.by_prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_prefix.is_empty()
    }
}

/// Where a long-lived consumer reads the current mapping table from.
///
/// The decorator resolves mappings through this at every rebuild, so edits
/// made through the settings surface show up without recreating it.
pub trait MappingSource {
    fn with_mappings<R>(&self, f: impl FnOnce(&MappingTable) -> R) -> R;
}

impl MappingSource for MappingTable {
    fn with_mappings<R>(&self, f: impl FnOnce(&MappingTable) -> R) -> R {
        f(self)
    }
}

impl MappingSource for Rc<RefCell<MappingTable>> {
    fn with_mappings<R>(&self, f: impl FnOnce(&MappingTable) -> R) -> R {
        f(&self.borrow())
    }
}

impl<T: MappingSource + ?Sized> MappingSource for &T {
    fn with_mappings<R>(&self, f: impl FnOnce(&MappingTable) -> R) -> R {
        (**self).with_mappings(f)
    }
}

/// Mapping table shared between the settings surface and the live view.
pub type SharedMappings = Rc<RefCell<MappingTable>>;

/// The persisted settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalloutSettings {
    pub mappings: MappingTable,
}

impl Default for CalloutSettings {
    fn default() -> Self {
        Self {
            mappings: MappingTable::defaults(),
        }
    }
}

impl CalloutSettings {
    /// Merges a loaded JSON value over the defaults.
    ///
    /// A missing `mappings` key or one that is not an array yields the
    /// default list wholesale. Array entries that are not objects are dropped;
    /// prefixes longer than one character are truncated.
    pub fn from_value(value: Value) -> Self {
        let mut settings = Self::default();

        let Value::Object(mut record) = value else {
            log::warn!("Callout settings are not an object, using defaults");
            return settings;
        };

        match record.remove("mappings") {
            Some(Value::Array(entries)) => {
                let mut mappings = Vec::with_capacity(entries.len());
                for (index, entry) in entries.into_iter().enumerate() {
                    match serde_json::from_value::<CalloutMapping>(entry) {
                        Ok(mut mapping) => {
                            mapping.prefix = normalize_prefix(&mapping.prefix);
                            mappings.push(mapping);
                        }
                        Err(e) => {
                            log::warn!("Skipping malformed callout mapping #{}: {}", index, e);
                        }
                    }
                }
                settings.mappings = MappingTable::new(mappings);
            }
            Some(other) => {
                log::warn!(
                    "Callout mappings must be a list, found {}; using defaults",
                    json_type_name(&other)
                );
            }
            None => {
                log::debug!("No callout mappings stored, using defaults");
            }
        }

        settings
    }

    pub fn from_json_str(content: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        Ok(Self::from_value(value))
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
