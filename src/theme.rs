use crate::types::Color;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(raw: &str) -> Option<Theme> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Light => Palette {
                background: Color::rgb8(0xff, 0xff, 0xff),
                card: Color::rgb8(0xff, 0xff, 0xff),
                foreground: Color::rgb8(0x09, 0x09, 0x0b),
                muted_foreground: Color::rgb8(0x71, 0x71, 0x7a),
                border: Color::rgb8(0xe4, 0xe4, 0xe7),
                input: Color::rgb8(0xe4, 0xe4, 0xe7),
                secondary: Color::rgb8(0xf4, 0xf4, 0xf5),
                ring: Color::rgb8(0x18, 0x18, 0x1b),
            },
            Theme::Dark => Palette {
                background: Color::rgb8(0x09, 0x09, 0x0b),
                card: Color::rgb8(0x09, 0x09, 0x0b),
                foreground: Color::rgb8(0xfa, 0xfa, 0xfa),
                muted_foreground: Color::rgb8(0xa1, 0xa1, 0xaa),
                border: Color::rgb8(0x27, 0x27, 0x2a),
                input: Color::rgb8(0x27, 0x27, 0x2a),
                secondary: Color::rgb8(0x27, 0x27, 0x2a),
                ring: Color::rgb8(0xd4, 0xd4, 0xd8),
            },
        }
    }
}

/// Surface colors for one theme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub card: Color,
    pub foreground: Color,
    pub muted_foreground: Color,
    pub border: Color,
    pub input: Color,
    pub secondary: Color,
    pub ring: Color,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_between_two_values() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled().toggled(), Theme::Dark);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Theme::parse(" DARK "), Some(Theme::Dark));
        assert_eq!(Theme::parse("sepia"), None);
    }

    #[test]
    fn palettes_differ_in_background() {
        assert_eq!(Theme::Light.palette().background.to_rgb8(), [255, 255, 255]);
        assert_eq!(Theme::Dark.palette().background.to_rgb8(), [9, 9, 11]);
    }
}
