//! Mapping attribute maps to terminal styles.
//!
//! Styled text carries symbolic `style` attributes; the theme resolves
//! those names to concrete [`ratatui::style::Style`] values. Style
//! definitions come from the `[styles]` table of the configuration, which
//! always includes the built-in set.

use std::collections::HashMap;

use ratatui::style::{Color, Modifier, Style};

use crate::config::{Config, ConfigError, StyleSpec};
use crate::markup::{AttrValue, Attrs};
use crate::tree::ATTR_CURSOR;

#[derive(Debug, Clone, Default)]
pub struct Theme {
    styles: HashMap<String, Style>,
}

impl Theme {
    /// Resolve every configured style up front so color errors surface at
    /// startup rather than mid-render.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut styles = HashMap::new();
        for (name, spec) in &config.styles {
            styles.insert(name.clone(), resolve_style(name, spec)?);
        }
        Ok(Self { styles })
    }

    /// The terminal style for one rendered cell.
    pub fn style_for(&self, attrs: &Attrs) -> Style {
        let mut style = match attrs.get("style").and_then(AttrValue::as_str) {
            Some(name) => self.styles.get(name).copied().unwrap_or_default(),
            None => Style::default(),
        };
        // The cursor line stands out even when its parts are unstyled.
        if attrs.contains_key(ATTR_CURSOR) {
            style = style.add_modifier(Modifier::BOLD);
        }
        style
    }

    /// Look up a named style directly, for chrome drawn outside the line
    /// buffer (headers, dividers, prompts).
    pub fn named(&self, name: &str) -> Style {
        self.styles.get(name).copied().unwrap_or_default()
    }
}

fn resolve_style(name: &str, spec: &StyleSpec) -> Result<Style, ConfigError> {
    let mut style = Style::default();
    if let Some(fg) = &spec.fg {
        style = style.fg(parse_color(name, fg)?);
    }
    if let Some(bg) = &spec.bg {
        style = style.bg(parse_color(name, bg)?);
    }
    if spec.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    Ok(style)
}

/// Parse a color name or `#rrggbb` value.
fn parse_color(style_name: &str, value: &str) -> Result<Color, ConfigError> {
    let normalized: String = value
        .to_ascii_lowercase()
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
        .collect();

    let color = match normalized.as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "gray" | "grey" => Color::Gray,
        "darkgray" | "darkgrey" => Color::DarkGray,
        "lightred" => Color::LightRed,
        "lightgreen" => Color::LightGreen,
        "lightyellow" => Color::LightYellow,
        "lightblue" => Color::LightBlue,
        "lightmagenta" => Color::LightMagenta,
        "lightcyan" => Color::LightCyan,
        "white" => Color::White,
        hex if hex.starts_with('#') && hex.len() == 7 => {
            let parse = |range| u8::from_str_radix(&hex[range], 16);
            match (parse(1..3), parse(3..5), parse(5..7)) {
                (Ok(r), Ok(g), Ok(b)) => Color::Rgb(r, g, b),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: format!("styles.{style_name}"),
                        reason: format!("invalid hex color {value:?}"),
                    })
                }
            }
        }
        _ => {
            return Err(ConfigError::Invalid {
                key: format!("styles.{style_name}"),
                reason: format!("unknown color {value:?}"),
            })
        }
    };
    Ok(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::attrs;

    #[test]
    fn builtin_styles_resolve() {
        let theme = Theme::from_config(&Config::default()).unwrap();
        assert_eq!(
            Some(Color::LightCyan),
            theme.style_for(&attrs([("style", "nick")])).fg
        );
        assert_eq!(Style::default(), theme.style_for(&Attrs::new()));
    }

    #[test]
    fn color_names_are_normalized() {
        assert_eq!(Color::LightCyan, parse_color("x", "Light Cyan").unwrap());
        assert_eq!(Color::DarkGray, parse_color("x", "dark-grey").unwrap());
        assert_eq!(
            Color::Rgb(0x12, 0x34, 0x56),
            parse_color("x", "#123456").unwrap()
        );
    }

    #[test]
    fn unknown_colors_are_config_errors() {
        let error = parse_color("room", "chartreuse-ish").unwrap_err();
        assert!(error.to_string().contains("styles.room"));
    }

    #[test]
    fn cursor_lines_are_bold() {
        let theme = Theme::from_config(&Config::default()).unwrap();
        let style = theme.style_for(&attrs([(crate::tree::ATTR_CURSOR, true)]));
        assert!(style.add_modifier.contains(Modifier::BOLD));
    }
}
