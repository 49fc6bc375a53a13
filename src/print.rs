//! Human-readable rendering of a normalized context.
//!
//! The top-level object prints one `name: value` line per binding; nested
//! containers are indented two spaces per level.

use colored::{ColoredString, Colorize};

use crate::normalize::Normalized;
use crate::snapshot::is_identifier;

const INDENT: &str = "  ";

pub fn render_context(context: &Normalized) -> String {
    Renderer { color: false }.context(context)
}

/// Writes the context to stdout, colored when the terminal allows it.
pub fn print_context(context: &Normalized) {
    println!("{}", Renderer { color: true }.context(context));
}

struct Renderer {
    color: bool,
}

impl Renderer {
    fn context(&self, context: &Normalized) -> String {
        match context {
            Normalized::Object(entries) => entries
                .iter()
                .map(|(key, value)| format!("{}: {}", self.key(key), self.value(value, 0)))
                .collect::<Vec<_>>()
                .join("\n"),
            other => self.value(other, 0),
        }
    }

    fn value(&self, value: &Normalized, depth: usize) -> String {
        match value {
            Normalized::Undefined => self.paint("undefined", |text| text.dimmed()),
            Normalized::Null => self.paint("null", |text| text.bold()),
            Normalized::Bool(flag) => self.paint(&flag.to_string(), |text| text.yellow()),
            Normalized::Number(number) => {
                self.paint(&format_number(*number), |text| text.yellow())
            }
            Normalized::String(text) => self.paint(&quote(text), |text| text.green()),
            Normalized::Function(name) if name.is_empty() => {
                self.paint("[Function (anonymous)]", |text| text.cyan())
            }
            Normalized::Function(name) => {
                self.paint(&format!("[Function: {name}]"), |text| text.cyan())
            }
            Normalized::Array(items) if items.is_empty() => "[]".to_string(),
            Normalized::Array(items) => {
                let inner = INDENT.repeat(depth + 1);
                let lines: Vec<String> = items
                    .iter()
                    .map(|item| format!("{inner}{}", self.value(item, depth + 1)))
                    .collect();
                format!("[\n{}\n{}]", lines.join(",\n"), INDENT.repeat(depth))
            }
            Normalized::Object(entries) if entries.is_empty() => "{}".to_string(),
            Normalized::Object(entries) => {
                let inner = INDENT.repeat(depth + 1);
                let lines: Vec<String> = entries
                    .iter()
                    .map(|(key, entry)| {
                        format!("{inner}{}: {}", self.key(key), self.value(entry, depth + 1))
                    })
                    .collect();
                format!("{{\n{}\n{}}}", lines.join(",\n"), INDENT.repeat(depth))
            }
        }
    }

    fn key(&self, key: &str) -> String {
        if is_identifier(key) {
            self.paint(key, |text| text.cyan())
        } else {
            self.paint(&quote(key), |text| text.cyan())
        }
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }
}

fn quote(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{escaped}'")
}

fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_string()
    } else if number.is_infinite() {
        if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}
