//! Configuration loading, validation and export.
//!
//! The config file is a TOML tree; option names used in error messages are
//! the flattened `section.key` form. Unknown keys are rejected, character
//! options must occupy exactly one terminal cell, and every `*_style`
//! option must name an entry of the `[styles]` table. Validation failures
//! abort startup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not export configuration: {0}")]
    Export(#[from] toml::ser::Error),
    #[error("{key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub room: RoomConfig,
    pub indent: IndentConfig,
    pub cursor_indent: CursorIndentConfig,
    pub surround: SurroundConfig,
    pub cursor_surround: CursorSurroundConfig,
    pub meta: MetaConfig,
    pub nick: NickConfig,
    pub scroll: ScrollConfig,
    pub rendering: RenderingConfig,
    pub log: LogConfig,
    pub styles: BTreeMap<String, StyleSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoomConfig {
    pub name: String,
    pub nick: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndentConfig {
    pub width: usize,
    pub r#char: String,
    pub fill: String,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CursorIndentConfig {
    pub r#char: String,
    pub corner: String,
    pub fill: String,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurroundConfig {
    pub left: String,
    pub right: String,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CursorSurroundConfig {
    pub left: String,
    pub right: String,
    pub style: String,
    pub fill: String,
    pub fill_style: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetaConfig {
    pub show_year: bool,
    pub show_seconds: bool,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NickConfig {
    pub style: String,
    pub own_nick_style: String,
    pub cursor_own_nick_style: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrollConfig {
    pub scrolloff: usize,
    pub vertical: usize,
    pub horizontal: usize,
    pub half_page: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderingConfig {
    pub filler_char: String,
    pub overflow_char: String,
    pub wide_unicode_placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// How many older messages one history request asks for.
    pub amount: usize,
}

/// A named style: a bundle of terminal attributes referenced by name from
/// the `*_style` options.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    pub bold: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: "lobby".to_string(),
            nick: String::new(),
        }
    }
}

impl Default for IndentConfig {
    fn default() -> Self {
        Self {
            width: 2,
            r#char: "│".to_string(),
            fill: " ".to_string(),
            style: "gray".to_string(),
        }
    }
}

impl Default for CursorIndentConfig {
    fn default() -> Self {
        Self {
            r#char: "┃".to_string(),
            corner: "┗".to_string(),
            fill: "━".to_string(),
            style: "own_nick".to_string(),
        }
    }
}

impl Default for SurroundConfig {
    fn default() -> Self {
        Self {
            left: "[".to_string(),
            right: "]".to_string(),
            style: "none".to_string(),
        }
    }
}

impl Default for CursorSurroundConfig {
    fn default() -> Self {
        Self {
            left: "<".to_string(),
            right: ">".to_string(),
            style: "none".to_string(),
            fill: " ".to_string(),
            fill_style: "none".to_string(),
        }
    }
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            show_year: false,
            show_seconds: false,
            style: "gray".to_string(),
        }
    }
}

impl Default for NickConfig {
    fn default() -> Self {
        Self {
            style: "nick".to_string(),
            own_nick_style: "own_nick".to_string(),
            cursor_own_nick_style: "own_nick".to_string(),
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            scrolloff: 2,
            vertical: 1,
            horizontal: 4,
            half_page: false,
        }
    }
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            filler_char: " ".to_string(),
            overflow_char: "…".to_string(),
            wide_unicode_placeholder: "�".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { amount: 200 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            room: RoomConfig::default(),
            indent: IndentConfig::default(),
            cursor_indent: CursorIndentConfig::default(),
            surround: SurroundConfig::default(),
            cursor_surround: CursorSurroundConfig::default(),
            meta: MetaConfig::default(),
            nick: NickConfig::default(),
            scroll: ScrollConfig::default(),
            rendering: RenderingConfig::default(),
            log: LogConfig::default(),
            styles: builtin_styles(),
        }
    }
}

/// Styles every installation starts from. User-defined `[styles]` entries
/// are merged over these; referencing a style that ends up undefined is a
/// validation error.
fn builtin_styles() -> BTreeMap<String, StyleSpec> {
    let mut styles = BTreeMap::new();
    let mut add = |name: &str, fg: Option<&str>, bold: bool| {
        styles.insert(
            name.to_string(),
            StyleSpec {
                fg: fg.map(str::to_string),
                bg: None,
                bold,
            },
        );
    };
    add("none", None, false);
    add("bold", None, true);
    add("gray", Some("darkgray"), false);
    add("room", Some("lightblue"), true);
    add("nick", Some("lightcyan"), false);
    add("own_nick", Some("yellow"), false);
    add("error", Some("lightred"), false);
    add("error_room", Some("yellow"), true);
    styles
}

impl Config {
    /// Load the configuration from `path`, or from the first default
    /// location that exists, or fall back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let text = match path {
            Some(path) => Some(fs::read_to_string(path)?),
            None => {
                let mut found = None;
                for candidate in Self::default_paths() {
                    if candidate.exists() {
                        found = Some(fs::read_to_string(candidate)?);
                        break;
                    }
                }
                found
            }
        };

        let mut config = match text {
            Some(text) => toml::from_str::<Config>(&text)?,
            None => Config::default(),
        };
        for (name, spec) in builtin_styles() {
            config.styles.entry(name).or_insert(spec);
        }
        config.validate()?;
        Ok(config)
    }

    /// Write the default configuration to `path` as a TOML document.
    pub fn export_defaults(path: &Path) -> Result<(), ConfigError> {
        let rendered = toml::to_string_pretty(&Config::default())?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(config) = dirs::config_dir() {
            paths.push(config.join("arbor").join("arbor.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".arbor.toml"));
        }
        paths
    }

    /// Check ranges, character widths and style references.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let single_cell = [
            ("indent.char", &self.indent.r#char),
            ("indent.fill", &self.indent.fill),
            ("cursor_indent.char", &self.cursor_indent.r#char),
            ("cursor_indent.corner", &self.cursor_indent.corner),
            ("cursor_indent.fill", &self.cursor_indent.fill),
            ("surround.left", &self.surround.left),
            ("surround.right", &self.surround.right),
            ("cursor_surround.left", &self.cursor_surround.left),
            ("cursor_surround.right", &self.cursor_surround.right),
            ("cursor_surround.fill", &self.cursor_surround.fill),
            ("rendering.filler_char", &self.rendering.filler_char),
            ("rendering.overflow_char", &self.rendering.overflow_char),
            (
                "rendering.wide_unicode_placeholder",
                &self.rendering.wide_unicode_placeholder,
            ),
        ];
        for (key, value) in single_cell {
            if value.chars().count() != 1 || value.width() != 1 {
                return Err(ConfigError::invalid(
                    key,
                    format!("{value:?} must be a single character one cell wide"),
                ));
            }
        }

        if self.indent.width < 1 {
            return Err(ConfigError::invalid("indent.width", "must be at least 1"));
        }
        if self.scroll.vertical < 1 {
            return Err(ConfigError::invalid("scroll.vertical", "must be at least 1"));
        }
        if self.scroll.horizontal < 1 {
            return Err(ConfigError::invalid(
                "scroll.horizontal",
                "must be at least 1",
            ));
        }
        if self.log.amount < 1 {
            return Err(ConfigError::invalid("log.amount", "must be at least 1"));
        }

        let style_refs = [
            ("indent.style", &self.indent.style),
            ("cursor_indent.style", &self.cursor_indent.style),
            ("surround.style", &self.surround.style),
            ("cursor_surround.style", &self.cursor_surround.style),
            ("cursor_surround.fill_style", &self.cursor_surround.fill_style),
            ("meta.style", &self.meta.style),
            ("nick.style", &self.nick.style),
            ("nick.own_nick_style", &self.nick.own_nick_style),
            (
                "nick.cursor_own_nick_style",
                &self.nick.cursor_own_nick_style,
            ),
        ];
        for (key, style) in style_refs {
            if !self.styles.contains_key(style) {
                return Err(ConfigError::invalid(
                    key,
                    format!("style {style:?} is not defined in [styles]"),
                ));
            }
        }

        Ok(())
    }

    /// Convenience accessors for the validated single-character options.
    pub fn indent_char(&self) -> char {
        first_char(&self.indent.r#char)
    }

    pub fn indent_fill(&self) -> char {
        first_char(&self.indent.fill)
    }

    pub fn cursor_indent_char(&self) -> char {
        first_char(&self.cursor_indent.r#char)
    }

    pub fn cursor_corner(&self) -> char {
        first_char(&self.cursor_indent.corner)
    }

    pub fn cursor_indent_fill(&self) -> char {
        first_char(&self.cursor_indent.fill)
    }

    pub fn filler_char(&self) -> char {
        first_char(&self.rendering.filler_char)
    }

    pub fn overflow_char(&self) -> char {
        first_char(&self.rendering.overflow_char)
    }

    pub fn wide_placeholder(&self) -> char {
        first_char(&self.rendering.wide_unicode_placeholder)
    }
}

/// First character of a validated single-character option. Falls back to a
/// space so a misconfigured value cannot panic the renderer.
fn first_char(value: &str) -> char {
    value.chars().next().unwrap_or(' ')
}
