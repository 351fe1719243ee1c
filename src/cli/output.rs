//! Human and machine output helpers shared by the commands.

use colored::Colorize;
use console::style;
use serde::Serialize;

use crate::error::{CtlError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Styled text for terminals
    #[default]
    Human,
    /// Pretty JSON on stdout
    Json,
    /// Tab-separated values, no headers
    Plain,
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| CtlError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

/// JSON error document printed in robot mode.
#[must_use]
pub fn robot_error(err: &CtlError) -> serde_json::Value {
    serde_json::json!({
        "error": true,
        "code": err.code(),
        "package": err.package_id(),
        "message": err.to_string(),
    })
}

/// Colored status glyphs.
#[must_use]
pub fn ok_mark() -> String {
    "✓".green().bold().to_string()
}

#[must_use]
pub fn warn_mark() -> String {
    "!".yellow().bold().to_string()
}

#[must_use]
pub fn fail_mark() -> String {
    "✗".red().bold().to_string()
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 16,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push("-".repeat(text.len().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let key = format!("{key:width$}", width = self.key_width);
        self.lines.push(format!("{} {value}", style(key).dim()));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_pads_keys() {
        console::set_colors_enabled(false);
        let mut layout = HumanLayout::new();
        layout.section("Tokens").kv("manifest", "12").bullet("ok");
        let text = layout.build();
        assert!(text.contains("Tokens\n------"));
        assert!(text.contains("manifest         12"));
        assert!(text.ends_with("- ok"));
    }

    #[test]
    fn robot_error_carries_code_and_package() {
        let value = robot_error(&CtlError::package_not_found("x", "package x is not registered"));
        assert_eq!(value["code"], "not_found");
        assert_eq!(value["package"], "x");
        assert_eq!(value["error"], true);

        let value = robot_error(&CtlError::Config("bad toml".to_string()));
        assert!(value["package"].is_null());
    }
}
