use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::TrapError;
use crate::loader::FileLoader;
use crate::source::Position;
use crate::stack::{StackFrame, TraceParser};

/// File or directory names of the trapper's own code. A frame is the
/// trapper's when one path segment, minus its extensions, is one of these.
pub const OWN_NAMES: &[&str] = &["error-trapper", "error_trapper"];

/// Frames whose file reference contains one of these never count as
/// application code: Node internals and installed packages.
pub const DEFAULT_INTERNAL_PATTERNS: &[&str] = &["node:internal", "node_modules"];

#[derive(Debug, Clone)]
pub struct FrameFilter {
    patterns: Vec<String>,
    own_names: Vec<String>,
}

impl FrameFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            own_names: OWN_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_application(&self, frame: &StackFrame) -> bool {
        let reference = frame.file_reference.as_str();
        !is_anonymous(reference)
            && !self.is_own(reference)
            && !self
                .patterns
                .iter()
                .any(|pattern| reference.contains(pattern.as_str()))
    }

    fn is_own(&self, reference: &str) -> bool {
        let path = reference
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or(reference);
        path.split(|c: char| c == '/' || c == '\\').any(|segment| {
            let stem = segment.split('.').next().unwrap_or(segment);
            self.own_names.iter().any(|name| name.as_str() == stem)
        })
    }
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERNAL_PATTERNS.iter().copied())
    }
}

fn is_anonymous(reference: &str) -> bool {
    let reference = reference.trim();
    reference.is_empty()
        || reference == "native"
        || reference.contains("<anonymous>")
        || reference.starts_with("eval at ")
}

/// Where the error originated in application code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file_reference: String,
    pub position: Position,
    pub function_name: Option<String>,
}

impl Location {
    fn from_frame(frame: &StackFrame) -> Self {
        Self {
            file_reference: frame.file_reference.clone(),
            position: Position::new(frame.line, frame.column.unwrap_or(1)),
            function_name: frame.function_name.clone(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_reference, self.position)
    }
}

/// A resolved frame together with the capability to fetch its file.
///
/// Loading consumes the location, so each one is fetched at most once.
pub struct ResolvedLocation {
    location: Location,
    loader: Arc<dyn FileLoader>,
}

#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub location: Location,
    pub text: String,
}

impl ResolvedLocation {
    pub fn new(location: Location, loader: Arc<dyn FileLoader>) -> Self {
        Self { location, loader }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn load_file_content(self) -> Result<LoadedSource, TrapError> {
        let text = self.loader.load(&self.location.file_reference)?;
        Ok(LoadedSource {
            location: self.location,
            text,
        })
    }

    pub fn load_file_content_with<S, F>(self, on_success: S, on_failure: F)
    where
        S: FnOnce(LoadedSource),
        F: FnOnce(TrapError),
    {
        match self.load_file_content() {
            Ok(source) => on_success(source),
            Err(err) => on_failure(err),
        }
    }
}

impl fmt::Debug for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedLocation")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

pub struct FrameResolver {
    parser: TraceParser,
    filter: FrameFilter,
    loader: Arc<dyn FileLoader>,
}

impl FrameResolver {
    pub fn new(loader: Arc<dyn FileLoader>) -> Self {
        Self {
            parser: TraceParser::default(),
            filter: FrameFilter::default(),
            loader,
        }
    }

    pub fn with_filter(mut self, filter: FrameFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_parser(mut self, parser: TraceParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn filter(&self) -> &FrameFilter {
        &self.filter
    }

    pub fn frames(&self, raw_stack: &str) -> Vec<StackFrame> {
        self.parser.parse(raw_stack)
    }

    /// First application frame of the trace, or `None` when every frame is
    /// internal, anonymous, or unparseable.
    pub fn resolve(&self, raw_stack: &str) -> Option<ResolvedLocation> {
        let frames = self.frames(raw_stack);
        let frame = select_frame(&frames, &self.filter)?;
        let location = Location::from_frame(frame);
        debug!(
            "resolved error origin to {} ({} frame(s) parsed)",
            location,
            frames.len()
        );
        Some(ResolvedLocation::new(location, Arc::clone(&self.loader)))
    }
}

pub fn select_frame<'a>(frames: &'a [StackFrame], filter: &FrameFilter) -> Option<&'a StackFrame> {
    frames.iter().find(|frame| filter.is_application(frame))
}
