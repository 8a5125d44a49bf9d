//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::Palette;
use crate::token::TokenColor;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Gem colours plus UI colours, optionally loaded from a theme file.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// Gem colours indexed by `TokenColor::index`: red, blue, green, yellow.
    pub token: [Color; 4],
    /// Board background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (hp, block readouts).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Empty-cell dots and secondary text.
    pub inactive_fg: Color,
    /// Opponent intent (wind-up) bar.
    pub windup: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const RED: Color = Color::Rgb(0xE4, 0x53, 0x57);
const BLUE: Color = Color::Rgb(0x58, 0xA8, 0xFF);
const GREEN: Color = Color::Rgb(0x6B, 0xD4, 0x6B);
const YELLOW: Color = Color::Rgb(0xF7, 0xC6, 0x4B);

impl Default for Theme {
    fn default() -> Self {
        Self {
            token: [RED, BLUE, GREEN, YELLOW],
            bg: Color::Rgb(0x31, 0x35, 0x3F),
            div_line: Color::Rgb(0x9A, 0xA1, 0xA8),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
            windup: Color::Rgb(0xFF, 0x4B, 0x6B),
        }
    }
}

impl Theme {
    /// Load a btop-style file. Falls back to defaults when `path` is None or missing;
    /// `palette` overrides gem colours afterwards.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let mut theme = Self::from_map(&parse_theme_file(&s));
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn default_for_palette(palette: Palette) -> Self {
        let mut t = Self::default();
        t.apply_palette(palette);
        t
    }

    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.token = [
                    Color::Rgb(0xFF, 0x00, 0x00),
                    Color::Rgb(0x00, 0x88, 0xFF),
                    Color::Rgb(0x00, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0xFF, 0x00),
                ];
            }
            Palette::Colorblind => {
                // Heal/poison must not rely on red vs green.
                self.token = [
                    Color::Rgb(0xEE, 0x77, 0x33), // orange
                    Color::Rgb(0x00, 0x77, 0xBB), // blue
                    Color::Rgb(0xEE, 0x33, 0x77), // magenta
                    Color::Rgb(0xBB, 0xBB, 0x00), // yellow
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        let d = Self::default();
        Self {
            token: [
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(d.token[0]),
                get("cpu_box").unwrap_or(d.token[1]),
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(d.token[2]),
                get("cpu_mid").or_else(|| get("title")).unwrap_or(d.token[3]),
            ],
            bg: get("meter_bg").unwrap_or(d.bg),
            div_line: get("div_line").unwrap_or(d.div_line),
            main_fg: get("main_fg").unwrap_or(d.main_fg),
            title: get("title").unwrap_or(d.title),
            inactive_fg: get("inactive_fg").unwrap_or(d.inactive_fg),
            windup: get("temp_end").unwrap_or(d.windup),
        }
    }

    #[inline]
    pub fn token_color(&self, color: TokenColor) -> Color {
        self.token[color.index()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    match s.len() {
        6 => Ok(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => Ok(Color::Rgb(
            channel(0..1)? * 17,
            channel(1..2)? * 17,
            channel(2..3)? * 17,
        )),
        _ => Err(invalid()),
    }
}
