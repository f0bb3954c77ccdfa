use crossterm::style::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{QuarkError, Result};

const START_TEMPLATE: &str = include_str!("../templates/start.html");
const END_TEMPLATE: &str = include_str!("../templates/end.html");
const STYLESHEET: &str = include_str!("../templates/stylesheet.css");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_notes_dir")]
    pub notes_dir: String,
    /// Autosave period in milliseconds.
    #[serde(default = "default_autosave_every")]
    pub autosave_every: u64,
    /// Preview debounce delay in milliseconds.
    #[serde(default = "default_update_delay")]
    pub update_delay: u64,
    #[serde(default = "default_start_template")]
    pub start_html_template_file: String,
    #[serde(default = "default_end_template")]
    pub end_html_template_file: String,
    #[serde(default = "default_stylesheet")]
    pub stylesheet_file: Option<String>,
    #[serde(default = "default_syntax_theme")]
    pub syntax_theme: String,
    /// Word list used by the spell-check pass, one word per line.
    #[serde(default)]
    pub dictionary_file: Option<String>,
    #[serde(default)]
    pub highlight: HighlightTheme,
}

fn default_notes_dir() -> String { "~/Documents/quark".to_string() }
fn default_autosave_every() -> u64 { 60_000 }
fn default_update_delay() -> u64 { 300 }
fn default_syntax_theme() -> String { "base16-ocean.dark".to_string() }

fn default_start_template() -> String {
    Config::templates_dir().join("start.html").to_string_lossy().into_owned()
}

fn default_end_template() -> String {
    Config::templates_dir().join("end.html").to_string_lossy().into_owned()
}

fn default_stylesheet() -> Option<String> {
    Some(Config::templates_dir().join("stylesheet.css").to_string_lossy().into_owned())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notes_dir: default_notes_dir(),
            autosave_every: default_autosave_every(),
            update_delay: default_update_delay(),
            start_html_template_file: default_start_template(),
            end_html_template_file: default_end_template(),
            stylesheet_file: default_stylesheet(),
            syntax_theme: default_syntax_theme(),
            dictionary_file: None,
            highlight: HighlightTheme::default(),
        }
    }
}

/// Resolved locations of the HTML templates wrapped around rendered notes.
#[derive(Debug, Clone)]
pub struct TemplatePaths {
    pub start: PathBuf,
    pub end: PathBuf,
    pub stylesheet: Option<PathBuf>,
}

impl Config {
    pub fn exists() -> bool { Self::config_path().exists() }

    /// Loads the user config, falling back to defaults when it is missing or broken.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| QuarkError::io(path, e))?;
        toml::from_str(&content).map_err(|source| QuarkError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the config, first writing the bundled templates and a default
    /// config file if they are not there yet.
    pub fn load_or_create() -> Self {
        let config_dir = Self::config_dir();
        let templates_dir = Self::templates_dir();

        if let Err(e) = fs::create_dir_all(&templates_dir) {
            log::warn!("Failed to create {}: {e}", templates_dir.display());
        }

        for (name, content) in [
            ("start.html", START_TEMPLATE),
            ("end.html", END_TEMPLATE),
            ("stylesheet.css", STYLESHEET),
        ] {
            let path = templates_dir.join(name);
            if !path.exists() {
                if let Err(e) = fs::write(&path, content) {
                    log::warn!("Failed to write {}: {e}", path.display());
                }
            }
        }

        let config_path = Self::config_path();
        if !config_path.exists() {
            if let Err(e) = Self::default().save_to(&config_path) {
                log::warn!("Failed to write default config to {}: {e}", config_dir.display());
            }
        }
        Self::load()
    }

    pub fn config_path() -> PathBuf { Self::config_dir().join("config.toml") }
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("quark")
    }
    pub fn templates_dir() -> PathBuf { Self::config_dir().join("html-template") }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| QuarkError::io(dir, e))?;
        }
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).map_err(|e| QuarkError::io(path, e))
    }

    pub fn notes_path(&self) -> PathBuf {
        expand_path(&self.notes_dir)
    }

    pub fn template_paths(&self) -> TemplatePaths {
        TemplatePaths {
            start: expand_path(&self.start_html_template_file),
            end: expand_path(&self.end_html_template_file),
            stylesheet: self.stylesheet_file.as_deref().map(expand_path),
        }
    }

    pub fn dictionary_path(&self) -> Option<PathBuf> {
        self.dictionary_file.as_deref().map(expand_path)
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

// ============================================================================
// Highlight colors (the `[highlight]` table)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightTheme {
    #[serde(default = "defaults::block")]
    pub quote: String,
    #[serde(default = "defaults::block")]
    pub fenced_code: String,
    #[serde(default = "defaults::block")]
    pub block_math: String,
    #[serde(default = "defaults::item")]
    pub list_item: String,
    #[serde(default = "defaults::item")]
    pub header: String,
    #[serde(default = "defaults::item")]
    pub horizontal_rule: String,
    #[serde(default = "defaults::item")]
    pub table_of_contents: String,
    #[serde(default = "defaults::span")]
    pub link: String,
    #[serde(default = "defaults::span")]
    pub link_reference: String,
    #[serde(default = "defaults::span")]
    pub emphasis: String,
    #[serde(default = "defaults::span")]
    pub inline_code: String,
    #[serde(default = "defaults::span")]
    pub inline_math: String,
    #[serde(default = "defaults::misspelled")]
    pub misspelled: String,
    /// Item rules (headers, list markers, rules) are drawn bold.
    #[serde(default = "defaults::bold_items")]
    pub bold_items: bool,
}

mod defaults {
    pub fn block() -> String { "#8b0000".to_string() }
    pub fn item() -> String { "#0000ff".to_string() }
    pub fn span() -> String { "#8b008b".to_string() }
    pub fn misspelled() -> String { "#ff0000".to_string() }
    pub fn bold_items() -> bool { true }
}

impl Default for HighlightTheme {
    fn default() -> Self {
        Self {
            quote: defaults::block(),
            fenced_code: defaults::block(),
            block_math: defaults::block(),
            list_item: defaults::item(),
            header: defaults::item(),
            horizontal_rule: defaults::item(),
            table_of_contents: defaults::item(),
            link: defaults::span(),
            link_reference: defaults::span(),
            emphasis: defaults::span(),
            inline_code: defaults::span(),
            inline_math: defaults::span(),
            misspelled: defaults::misspelled(),
            bold_items: defaults::bold_items(),
        }
    }
}

pub fn parse_hex_color(hex: &str) -> Color {
    let hex = hex.trim_start_matches('#').trim_start_matches('\'').trim_end_matches('\'');
    if hex.len() == 6 {
        if let (Ok(r), Ok(g), Ok(b)) = (
            u8::from_str_radix(&hex[0..2], 16),
            u8::from_str_radix(&hex[2..4], 16),
            u8::from_str_radix(&hex[4..6], 16),
        ) {
            return Color::Rgb { r, g, b };
        }
    }
    Color::Reset
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("notes_dir = \"/tmp/notes\"\nupdate_delay = 50\n").unwrap();
        assert_eq!(config.notes_dir, "/tmp/notes");
        assert_eq!(config.update_delay, 50);
        assert_eq!(config.autosave_every, 60_000);
        assert_eq!(config.syntax_theme, "base16-ocean.dark");
        assert!(config.dictionary_file.is_none());
        assert_eq!(config.highlight.header, "#0000ff");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.notes_dir = "~/elsewhere".to_string();
        config.dictionary_file = Some("/usr/share/dict/words".to_string());
        config.highlight.emphasis = "#123456".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.notes_dir, "~/elsewhere");
        assert_eq!(loaded.dictionary_file.as_deref(), Some("/usr/share/dict/words"));
        assert_eq!(loaded.highlight.emphasis, "#123456");
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "notes_dir = [not toml").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, QuarkError::ConfigParse { .. }));
    }

    #[test]
    fn test_notes_path_expands_tilde() {
        let config = Config { notes_dir: "~/notes".to_string(), ..Config::default() };
        let path = config.notes_path();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("notes"));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#8b0000"), Color::Rgb { r: 0x8b, g: 0, b: 0 });
        assert_eq!(parse_hex_color("'00ff00'"), Color::Rgb { r: 0, g: 0xff, b: 0 });
        assert_eq!(parse_hex_color("nope"), Color::Reset);
    }
}
