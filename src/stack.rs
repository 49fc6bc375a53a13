//! Stack-trace grammars.
//!
//! Each host prints frames differently, so parsing sits behind
//! [`TraceGrammar`]. A [`TraceParser`] picks the first of its grammars that
//! recognises a line of the trace and reads the whole trace with it; lines
//! that grammar does not recognise (the error message, blank lines) are
//! dropped.

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// `    at fn (file:line:column)` or `    at file:line:column`.
static V8_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*at (?:(.+?) \()?(.+?):(\d+)(?::(\d+))?\)?\s*$").unwrap()
});

/// `fn@file:line:column`, with an empty function name for anonymous frames.
static GECKO_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^@]*)@(.+?):(\d+)(?::(\d+))?\s*$").unwrap());

/// One entry of a stack trace. `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub function_name: Option<String>,
    pub file_reference: String,
    pub line: u32,
    pub column: Option<u32>,
}

pub trait TraceGrammar: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse_line(&self, line: &str) -> Option<StackFrame>;
}

/// Chrome, Node.js and Edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct V8Grammar;

impl TraceGrammar for V8Grammar {
    fn name(&self) -> &'static str {
        "v8"
    }

    fn parse_line(&self, line: &str) -> Option<StackFrame> {
        frame_from_captures(V8_FRAME.captures(line)?)
    }
}

/// Firefox and Safari.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeckoGrammar;

impl TraceGrammar for GeckoGrammar {
    fn name(&self) -> &'static str {
        "gecko"
    }

    fn parse_line(&self, line: &str) -> Option<StackFrame> {
        frame_from_captures(GECKO_FRAME.captures(line)?)
    }
}

fn frame_from_captures(caps: Captures<'_>) -> Option<StackFrame> {
    let function_name = caps
        .get(1)
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let file_reference = caps.get(2)?.as_str().trim().to_string();
    let line = caps.get(3)?.as_str().parse().ok()?;
    let column = caps.get(4).and_then(|m| m.as_str().parse().ok());

    Some(StackFrame {
        function_name,
        file_reference,
        line,
        column,
    })
}

pub struct TraceParser {
    grammars: Vec<Box<dyn TraceGrammar>>,
}

impl TraceParser {
    pub fn new(grammars: Vec<Box<dyn TraceGrammar>>) -> Self {
        Self { grammars }
    }

    pub fn with_grammar(mut self, grammar: impl TraceGrammar + 'static) -> Self {
        self.grammars.push(Box::new(grammar));
        self
    }

    pub fn grammar_names(&self) -> Vec<&'static str> {
        self.grammars.iter().map(|grammar| grammar.name()).collect()
    }

    /// The grammar the trace is written in: the first one, in order, that
    /// recognises any of its lines.
    pub fn detect(&self, raw_stack: &str) -> Option<&dyn TraceGrammar> {
        self.grammars
            .iter()
            .find(|grammar| raw_stack.lines().any(|line| grammar.parse_line(line).is_some()))
            .map(|grammar| grammar.as_ref())
    }

    /// Frames in trace order, innermost first. Every line is read with the
    /// detected grammar only, so message text that happens to look like
    /// another host's frame is never taken for one.
    pub fn parse(&self, raw_stack: &str) -> Vec<StackFrame> {
        let Some(grammar) = self.detect(raw_stack) else {
            return Vec::new();
        };
        debug!("reading stack trace as {}", grammar.name());
        raw_stack
            .lines()
            .filter_map(|line| grammar.parse_line(line))
            .collect()
    }
}

impl Default for TraceParser {
    fn default() -> Self {
        Self::new(vec![Box::new(V8Grammar), Box::new(GeckoGrammar)])
    }
}

pub fn parse_stack(raw_stack: &str) -> Vec<StackFrame> {
    TraceParser::default().parse(raw_stack)
}
