//! Terminal colors for callout lines.
//!
//! Mappings carry CSS color strings. The terminal can only show opaque
//! colors, so translucent values are blended toward a black background.

use mdcallout::{class_name, CalloutMapping};
use ratatui::style::Color;
use std::collections::HashMap;

/// RGBA color with 8-bit components
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseColorError {
    InvalidFormat,
    InvalidLength,
    InvalidHexDigit,
    InvalidComponent,
    UnknownName,
}

impl std::fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseColorError::InvalidFormat => write!(f, "Unrecognized color syntax"),
            ParseColorError::InvalidLength => {
                write!(f, "Color must be #RGB, #RRGGBB, or #RRGGBBAA")
            }
            ParseColorError::InvalidHexDigit => write!(f, "Invalid hex digit in color"),
            ParseColorError::InvalidComponent => write!(f, "Invalid rgb() component"),
            ParseColorError::UnknownName => write!(f, "Unknown color name"),
        }
    }
}

impl std::error::Error for ParseColorError {}

fn hex_digit(byte: u8) -> Result<u8, ParseColorError> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'A'..=b'F' => Ok(byte - b'A' + 10),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        _ => Err(ParseColorError::InvalidHexDigit),
    }
}

fn hex_pair(high: u8, low: u8) -> Result<u8, ParseColorError> {
    Ok((hex_digit(high)? << 4) | hex_digit(low)?)
}

const NAMED: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("red", (255, 0, 0)),
    ("green", (0, 128, 0)),
    ("lime", (0, 255, 0)),
    ("blue", (0, 0, 255)),
    ("yellow", (255, 255, 0)),
    ("orange", (255, 165, 0)),
    ("purple", (128, 0, 128)),
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
    ("cyan", (0, 255, 255)),
    ("aqua", (0, 255, 255)),
    ("magenta", (255, 0, 255)),
    ("fuchsia", (255, 0, 255)),
    ("pink", (255, 192, 203)),
    ("brown", (165, 42, 42)),
    ("gold", (255, 215, 0)),
    ("teal", (0, 128, 128)),
    ("navy", (0, 0, 128)),
    ("silver", (192, 192, 192)),
];

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Supports #RGB, #RRGGBB, and #RRGGBBAA formats
    pub fn from_hex(hex: &str) -> Result<Self, ParseColorError> {
        let bytes = hex.as_bytes();
        if bytes.first() != Some(&b'#') {
            return Err(ParseColorError::InvalidFormat);
        }

        match bytes.len() {
            4 => {
                let expand = |b: u8| hex_digit(b).map(|v| v * 16 + v);
                Ok(Self::opaque(expand(bytes[1])?, expand(bytes[2])?, expand(bytes[3])?))
            }
            7 | 9 => {
                let a = if bytes.len() == 9 {
                    hex_pair(bytes[7], bytes[8])?
                } else {
                    255
                };
                Ok(Self {
                    r: hex_pair(bytes[1], bytes[2])?,
                    g: hex_pair(bytes[3], bytes[4])?,
                    b: hex_pair(bytes[5], bytes[6])?,
                    a,
                })
            }
            _ => Err(ParseColorError::InvalidLength),
        }
    }

    /// `rgb(r, g, b)` or `rgba(r, g, b, a)` with alpha in `0..=1`.
    fn from_functional(spec: &str) -> Result<Self, ParseColorError> {
        let inner = spec
            .strip_prefix("rgba(")
            .or_else(|| spec.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or(ParseColorError::InvalidFormat)?;

        let parts: Vec<&str> = inner
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(ParseColorError::InvalidComponent);
        }

        let channel = |s: &str| -> Result<u8, ParseColorError> {
            let value: f32 = s.parse().map_err(|_| ParseColorError::InvalidComponent)?;
            Ok(value.clamp(0.0, 255.0).round() as u8)
        };
        let a = match parts.get(3) {
            Some(s) => {
                let alpha: f32 = s.parse().map_err(|_| ParseColorError::InvalidComponent)?;
                (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
            }
            None => 255,
        };

        Ok(Self {
            r: channel(parts[0])?,
            g: channel(parts[1])?,
            b: channel(parts[2])?,
            a,
        })
    }

    pub fn parse(spec: &str) -> Result<Self, ParseColorError> {
        let spec = spec.trim().to_ascii_lowercase();
        if spec.starts_with('#') {
            return Self::from_hex(&spec);
        }
        if spec.starts_with("rgb") {
            return Self::from_functional(&spec);
        }
        if spec == "transparent" {
            return Ok(Self { r: 0, g: 0, b: 0, a: 0 });
        }
        NAMED
            .iter()
            .find(|(name, _)| *name == spec)
            .map(|(_, (r, g, b))| Self::opaque(*r, *g, *b))
            .ok_or(ParseColorError::UnknownName)
    }

    /// Composites over black and converts for the terminal. Fully
    /// transparent colors yield `None`.
    pub fn to_terminal(self) -> Option<Color> {
        if self.a == 0 {
            return None;
        }
        let blend = |c: u8| ((c as u16 * self.a as u16 + 127) / 255) as u8;
        Some(Color::Rgb(blend(self.r), blend(self.g), blend(self.b)))
    }
}

/// Parses a CSS color into a terminal color, `None` when unparsable.
pub fn css_to_terminal(spec: &str) -> Option<Color> {
    match Rgba::parse(spec) {
        Ok(color) => color.to_terminal(),
        Err(e) => {
            log::debug!("Ignoring color '{}': {}", spec, e);
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalloutColors {
    pub background: Option<Color>,
    pub border: Option<Color>,
}

/// Terminal colors per callout class, the live-view counterpart of the
/// synthesized stylesheet.
#[derive(Debug, Clone, Default)]
pub struct CalloutPalette {
    by_class: HashMap<String, CalloutColors>,
}

impl CalloutPalette {
    pub fn from_mappings(mappings: &[CalloutMapping]) -> Self {
        let mut by_class = HashMap::new();
        for mapping in mappings {
            // Later rules win in the stylesheet, so they win here too
            by_class.insert(
                class_name(&mapping.label),
                CalloutColors {
                    background: css_to_terminal(&mapping.background_color),
                    border: css_to_terminal(&mapping.border_color),
                },
            );
        }
        Self { by_class }
    }

    /// Colors for a decorated line, merged over all of its classes.
    pub fn colors_for(&self, classes: &[String]) -> CalloutColors {
        let mut colors = CalloutColors::default();
        for class in classes {
            if let Some(found) = self.by_class.get(class) {
                colors.background = found.background.or(colors.background);
                colors.border = found.border.or(colors.border);
            }
        }
        colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdcallout::MappingTable;

    #[test]
    fn test_hex_colors() {
        assert_eq!(Rgba::from_hex("#f00"), Ok(Rgba::opaque(255, 0, 0)));
        assert_eq!(Rgba::from_hex("#1e1e1e"), Ok(Rgba::opaque(30, 30, 30)));
        assert_eq!(
            Rgba::from_hex("#ff000080"),
            Ok(Rgba { r: 255, g: 0, b: 0, a: 128 })
        );
        assert_eq!(Rgba::from_hex("#ff00"), Err(ParseColorError::InvalidLength));
        assert_eq!(Rgba::from_hex("#gg0000"), Err(ParseColorError::InvalidHexDigit));
    }

    #[test]
    fn test_functional_colors() {
        assert_eq!(
            Rgba::parse("rgba(255, 0, 0, 0.1)"),
            Ok(Rgba { r: 255, g: 0, b: 0, a: 26 })
        );
        assert_eq!(Rgba::parse("rgb(0 128 255)"), Ok(Rgba::opaque(0, 128, 255)));
        assert_eq!(
            Rgba::parse("rgb(1, 2)"),
            Err(ParseColorError::InvalidComponent)
        );
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(Rgba::parse(" Red "), Ok(Rgba::opaque(255, 0, 0)));
        assert_eq!(Rgba::parse("grey"), Rgba::parse("gray"));
        assert_eq!(Rgba::parse("blurple"), Err(ParseColorError::UnknownName));
    }

    #[test]
    fn test_translucent_colors_blend_toward_black() {
        assert_eq!(css_to_terminal("rgba(255, 0, 0, 0.1)"), Some(Color::Rgb(26, 0, 0)));
        assert_eq!(css_to_terminal("blue"), Some(Color::Rgb(0, 0, 255)));
        assert_eq!(css_to_terminal("transparent"), None);
        assert_eq!(css_to_terminal("not a color"), None);
    }

    #[test]
    fn test_palette_matches_default_classes() {
        let table = MappingTable::defaults();
        let palette = CalloutPalette::from_mappings(table.as_slice());

        let classes = vec![
            "paragraph-callout".to_string(),
            "paragraph-callout-idea".to_string(),
        ];
        let colors = palette.colors_for(&classes);
        assert_eq!(colors.border, Some(Color::Rgb(0, 128, 0)));
        assert_eq!(colors.background, Some(Color::Rgb(0, 26, 0)));

        assert_eq!(
            palette.colors_for(&["paragraph-callout-missing".to_string()]),
            CalloutColors::default()
        );
    }
}
