use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod print;
pub mod provider;
pub mod resolver;
pub mod scope;
pub mod snapshot;
pub mod source;
pub mod stack;
pub mod syntax;
pub mod value;

pub use crate::config::TrapperConfig;
pub use crate::error::TrapError;
pub use crate::loader::{FileLoader, FsLoader};
pub use crate::normalize::{Normalized, CIRCULAR_MARKER};
pub use crate::provider::LazyProvider;
pub use crate::resolver::{FrameFilter, FrameResolver, Location};
pub use crate::scope::NameSet;
pub use crate::snapshot::{BindingReader, CapturedContext, Read, SnapshotCode};
pub use crate::source::Position;
pub use crate::stack::StackFrame;
pub use crate::value::Value;

use crate::provider::load_bundle;
use crate::scope::extract_names;

/// Everything learned about the origin of one error.
#[derive(Debug, Clone, Serialize)]
pub struct Capture {
    pub location: Location,
    pub names: NameSet,
    pub code: SnapshotCode,
}

/// What a capture callback receives: the snapshot code on success, nothing
/// on any failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResult {
    pub success: bool,
    pub code: Option<SnapshotCode>,
}

impl CaptureResult {
    pub fn success(code: SnapshotCode) -> Self {
        Self {
            success: true,
            code: Some(code),
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            code: None,
        }
    }
}

/// The capture pipeline: resolve the frame, fetch its file, build the scope
/// tree and emit the snapshot for the names visible at the error position.
pub struct Trapper {
    resolver: FrameResolver,
    provider: Arc<LazyProvider>,
}

impl Trapper {
    pub fn new(config: &TrapperConfig) -> Self {
        let loader = match &config.source_root {
            Some(root) => FsLoader::with_root(root),
            None => FsLoader::new(),
        };
        let filter = FrameFilter::default().with_patterns(config.internal_patterns.iter().cloned());
        let tolerate = config.tolerate_syntax_errors;
        let provider = LazyProvider::with_factory(config.grammar.clone(), move |bundle: &str| {
            load_bundle(bundle, tolerate)
        });

        Self::with_parts(
            FrameResolver::new(Arc::new(loader)).with_filter(filter),
            Arc::new(provider),
        )
    }

    pub fn with_parts(resolver: FrameResolver, provider: Arc<LazyProvider>) -> Self {
        Self { resolver, provider }
    }

    /// Default filter and provider, files served by `loader`.
    pub fn with_loader(loader: Arc<dyn FileLoader>) -> Self {
        Self::with_parts(FrameResolver::new(loader), Arc::new(LazyProvider::default()))
    }

    pub fn resolver(&self) -> &FrameResolver {
        &self.resolver
    }

    pub fn provider(&self) -> &LazyProvider {
        &self.provider
    }

    pub fn bundle(&self) -> &str {
        self.provider.bundle()
    }

    pub fn frames(&self, raw_stack: &str) -> Vec<StackFrame> {
        self.resolver.frames(raw_stack)
    }

    pub fn capture(&self, raw_stack: &str) -> Result<Capture, TrapError> {
        let resolved = self.resolver.resolve(raw_stack).ok_or(TrapError::Resolution)?;
        let source = resolved.load_file_content()?;
        let names = self.names_at(&source.text, source.location.position)?;
        debug!(
            "{} name(s) visible at {}",
            names.len(),
            source.location
        );
        let code = snapshot::generate(&names);
        Ok(Capture {
            location: source.location,
            names,
            code,
        })
    }

    /// Runs the pipeline and hands the outcome to `callback` exactly once.
    pub fn capture_context<F>(&self, raw_stack: &str, callback: F)
    where
        F: FnOnce(CaptureResult),
    {
        let result = match self.capture(raw_stack) {
            Ok(capture) => CaptureResult::success(capture.code),
            Err(err) => {
                warn!("context capture failed: {err}");
                CaptureResult::failure()
            }
        };
        callback(result);
    }

    /// Names visible at `position` in `source`.
    pub fn names_at(&self, source: &str, position: Position) -> Result<NameSet, TrapError> {
        let provider = self.provider.ensure_loaded()?;
        let tree = provider.analyze(source)?;
        Ok(extract_names(&tree, position))
    }

    pub fn normalize(&self, context: &Value) -> Normalized {
        normalize::normalize(context)
    }

    pub fn print_context(&self, context: &Value) {
        print::print_context(&normalize::normalize(context));
    }
}

static INSTALLED: OnceCell<Trapper> = OnceCell::new();

/// Installs the process-wide trapper. Later calls keep the first
/// configuration and only log a warning.
pub fn initialize(config: &TrapperConfig) -> &'static Trapper {
    let mut created = false;
    let trapper = INSTALLED.get_or_init(|| {
        created = true;
        Trapper::new(config)
    });
    if !created {
        warn!(
            "error-trapper already initialized with bundle '{}', ignoring new configuration",
            trapper.bundle()
        );
    }
    trapper
}

pub fn installed() -> Option<&'static Trapper> {
    INSTALLED.get()
}
