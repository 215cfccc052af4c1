use colored::*;
use lazy_static::lazy_static;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bridge::protocol::{ResponseEnvelope, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy)]
pub enum Level {
    Info,
    Success,
    Warn,
    Error,
    Debug,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Success => "success",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

lazy_static! {
    static ref RENDERER: RwLock<Renderer> = RwLock::new(Renderer::default());
}

// Global debug state
static DEBUG_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_debug_mode(enabled: bool) {
    DEBUG_MODE.store(enabled, Ordering::Relaxed);
}

pub fn is_debug_enabled() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

pub fn init(format: OutputFormat, color: bool) {
    if let Ok(mut r) = RENDERER.write() {
        r.format = format;
        r.color = color;
    }
}

pub fn get_output_format() -> OutputFormat {
    RENDERER.read().expect("renderer poisoned").format
}

// Custom nerd font icons
pub mod nerd_font;
pub use nerd_font::NerdFont;

#[derive(Serialize)]
struct Event<'a> {
    level: &'a str,
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

fn colorize(level: Level, s: &str, enable: bool) -> String {
    if !enable {
        return s.to_string();
    }
    match level {
        Level::Info => s.normal().to_string(),
        Level::Success => s.green().bold().to_string(),
        Level::Warn => s.yellow().bold().to_string(),
        Level::Error => s.red().bold().to_string(),
        Level::Debug => s.cyan().to_string(),
    }
}

fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            // Skip the CSI sequence up to and including its final byte.
            chars.next();
            for b in chars.by_ref() {
                if ('@'..='~').contains(&b) {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Write one event to the terminal, as colored text or a JSON line depending
/// on the active renderer.
pub fn emit(level: Level, code: &str, message: &str, data: Option<serde_json::Value>) {
    if matches!(level, Level::Debug) && !is_debug_enabled() {
        return;
    }

    let r = RENDERER.read().expect("renderer poisoned").clone();
    let mut out: Box<dyn Write> = match level {
        Level::Error | Level::Warn => Box::new(io::stderr()),
        _ => Box::new(io::stdout()),
    };

    match r.format {
        OutputFormat::Text => {
            let line = colorize(level, message, r.color);
            let _ = writeln!(out, "{}", line);
        }
        OutputFormat::Json => {
            // JSON mode must never carry terminal control sequences.
            let clean_msg = strip_ansi(message);
            let ev = Event {
                level: level.as_str(),
                code,
                message: &clean_msg,
                data,
            };
            let s = serde_json::to_string(&ev).expect("serialize event");
            let _ = writeln!(out, "{}", s);
        }
    }
}

/// Render a response envelope for the user.
///
/// In JSON mode the envelope itself is the output, one line on stdout. In
/// text mode it is summarized with a status icon, plus per-item failure lines
/// for batch warnings.
pub fn render_envelope(envelope: &ResponseEnvelope) -> Result<(), crate::bridge::error::BridgeError> {
    if get_output_format() == OutputFormat::Json {
        println!("{}", envelope.to_json()?);
        return Ok(());
    }

    let (level, icon) = match envelope.status {
        Status::Success => (Level::Success, NerdFont::Check),
        Status::Warning => (Level::Warn, NerdFont::Warning),
        Status::Error => (Level::Error, NerdFont::Cross),
        Status::Info => (Level::Info, NerdFont::Info),
    };

    emit(
        level,
        "bridge.response",
        &format!("{} {}", char::from(icon), envelope.message),
        None,
    );

    if let Some(failed) = envelope.data.get("failed").and_then(|v| v.as_array()) {
        for item in failed {
            let name = item.get("item").and_then(|v| v.as_str()).unwrap_or("?");
            let reason = item.get("message").and_then(|v| v.as_str()).unwrap_or("");
            let code = item.get("code").and_then(|v| v.as_str()).unwrap_or("");
            emit(
                Level::Warn,
                "bridge.response.failed_item",
                &format!("  {} {name}: {reason} [{code}]", char::from(NerdFont::Cross)),
                None,
            );
        }
    }

    if let Some(detail) = &envelope.error {
        if let Some(remedy) = detail.details.get("remedy").and_then(|v| v.as_str()) {
            emit(
                Level::Info,
                "bridge.response.remedy",
                &format!("  {} {remedy}", char::from(NerdFont::Info)),
                None,
            );
        }
        emit(
            Level::Debug,
            "bridge.response.code",
            &format!("  error code: {}", detail.code),
            None,
        );
    }

    Ok(())
}

pub mod prelude {
    pub use super::{Level, NerdFont, OutputFormat, emit, get_output_format};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi("\u{1b}[1;32mgreen\u{1b}[0m"), "green");
        assert_eq!(strip_ansi("a\u{1b}[Kb"), "ab");
    }

    #[test]
    fn test_level_names() {
        assert_eq!(Level::Warn.as_str(), "warn");
        assert_eq!(Level::Success.as_str(), "success");
    }
}
