//! Process-wide syntax provider with a load-once lifecycle.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::error::TrapError;
use crate::syntax::{SyntaxProvider, TreeSitterProvider};

pub const DEFAULT_BUNDLE: &str = "javascript";

pub type ProviderFactory =
    dyn Fn(&str) -> Result<Arc<dyn SyntaxProvider>, TrapError> + Send + Sync;

/// Resolves a bundle location to a provider. Bundles name a grammar.
pub fn load_bundle(
    bundle: &str,
    tolerate_errors: bool,
) -> Result<Arc<dyn SyntaxProvider>, TrapError> {
    match bundle.trim().to_ascii_lowercase().as_str() {
        "javascript" | "js" | "jsx" => {
            let provider = TreeSitterProvider::javascript()?.tolerate_errors(tolerate_errors);
            Ok(Arc::new(provider))
        }
        other => Err(TrapError::parse(format!("unknown grammar bundle '{other}'"))),
    }
}

enum LoadState {
    Uninitialized,
    Loading,
    Ready(Arc<dyn SyntaxProvider>),
    Failed(TrapError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Loads its provider on first use and hands the same instance to every
/// later caller. Callers arriving while a load is in flight wait for it
/// instead of starting another one. A failed load stays failed.
pub struct LazyProvider {
    bundle: String,
    factory: Box<ProviderFactory>,
    state: Mutex<LoadState>,
    settled: Condvar,
}

impl LazyProvider {
    pub fn new(bundle: impl Into<String>) -> Self {
        Self::with_factory(bundle, |bundle: &str| load_bundle(bundle, false))
    }

    pub fn with_factory<F>(bundle: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn SyntaxProvider>, TrapError> + Send + Sync + 'static,
    {
        Self {
            bundle: bundle.into(),
            factory: Box::new(factory),
            state: Mutex::new(LoadState::Uninitialized),
            settled: Condvar::new(),
        }
    }

    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    pub fn status(&self) -> LoadStatus {
        match &*self.state.lock() {
            LoadState::Uninitialized => LoadStatus::Uninitialized,
            LoadState::Loading => LoadStatus::Loading,
            LoadState::Ready(_) => LoadStatus::Ready,
            LoadState::Failed(_) => LoadStatus::Failed,
        }
    }

    pub fn ensure_loaded(&self) -> Result<Arc<dyn SyntaxProvider>, TrapError> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                LoadState::Ready(provider) => return Ok(Arc::clone(provider)),
                LoadState::Failed(err) => return Err(err.clone()),
                LoadState::Uninitialized => break,
                LoadState::Loading => {}
            }
            self.settled.wait(&mut state);
        }
        *state = LoadState::Loading;
        drop(state);

        debug!("loading syntax provider bundle '{}'", self.bundle);
        let mut guard = LoadGuard {
            lazy: self,
            armed: true,
        };
        let outcome = (self.factory)(&self.bundle);
        guard.armed = false;

        let mut state = self.state.lock();
        *state = match &outcome {
            Ok(provider) => {
                debug!("syntax provider '{}' ready", provider.name());
                LoadState::Ready(Arc::clone(provider))
            }
            Err(err) => {
                warn!("syntax provider bundle '{}' failed to load: {err}", self.bundle);
                LoadState::Failed(err.clone())
            }
        };
        self.settled.notify_all();
        outcome
    }

    pub fn ensure_loaded_with<R, F>(&self, on_ready: R, on_failure: F)
    where
        R: FnOnce(Arc<dyn SyntaxProvider>),
        F: FnOnce(TrapError),
    {
        match self.ensure_loaded() {
            Ok(provider) => on_ready(provider),
            Err(err) => on_failure(err),
        }
    }
}

/// Settles a load that unwinds out of the factory, so waiters are released
/// and see a failure instead of blocking on `Loading` forever.
struct LoadGuard<'a> {
    lazy: &'a LazyProvider,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("syntax provider bundle '{}' panicked while loading", self.lazy.bundle);
        *self.lazy.state.lock() = LoadState::Failed(TrapError::parse(format!(
            "loading grammar bundle '{}' panicked",
            self.lazy.bundle
        )));
        self.lazy.settled.notify_all();
    }
}

impl Default for LazyProvider {
    fn default() -> Self {
        Self::new(DEFAULT_BUNDLE)
    }
}

impl fmt::Debug for LazyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyProvider")
            .field("bundle", &self.bundle)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use crate::syntax::{ScopeKind, ScopeNode, ScopeTree};
    use crate::source::{Position, SourceRange};

    struct EmptyProvider;

    impl SyntaxProvider for EmptyProvider {
        fn name(&self) -> &str {
            "empty"
        }

        fn analyze(&self, _source: &str) -> Result<ScopeTree, TrapError> {
            let range = SourceRange::new(Position::new(1, 1), Position::new(1, 1));
            Ok(ScopeTree {
                root: ScopeNode::new(ScopeKind::Program, range),
            })
        }
    }

    fn counting_provider(loads: Arc<AtomicUsize>, delay: Duration) -> LazyProvider {
        LazyProvider::with_factory(
            "test",
            move |_: &str| -> Result<Arc<dyn SyntaxProvider>, TrapError> {
                loads.fetch_add(1, Ordering::SeqCst);
                thread::sleep(delay);
                Ok(Arc::new(EmptyProvider))
            },
        )
    }

    #[test]
    fn loads_once_and_reuses_instance() {
        let loads = Arc::new(AtomicUsize::new(0));
        let lazy = counting_provider(Arc::clone(&loads), Duration::ZERO);
        assert_eq!(lazy.status(), LoadStatus::Uninitialized);

        let first = lazy.ensure_loaded().unwrap();
        let second = lazy.ensure_loaded().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.status(), LoadStatus::Ready);
    }

    #[test]
    fn concurrent_callers_share_one_load() {
        let loads = Arc::new(AtomicUsize::new(0));
        let lazy = Arc::new(counting_provider(
            Arc::clone(&loads),
            Duration::from_millis(50),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = Arc::clone(&lazy);
                thread::spawn(move || {
                    lazy.ensure_loaded()
                        .map(|provider| provider.name().to_string())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "empty");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_sticky() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let lazy = LazyProvider::with_factory(
            "broken",
            move |bundle: &str| -> Result<Arc<dyn SyntaxProvider>, TrapError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TrapError::parse(format!("cannot load {bundle}")))
            },
        );

        let mut failures = Vec::new();
        lazy.ensure_loaded_with(|_| panic!("unexpected success"), |err| failures.push(err));
        lazy.ensure_loaded_with(|_| panic!("unexpected success"), |err| failures.push(err));

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0], TrapError::parse("cannot load broken"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.status(), LoadStatus::Failed);
    }

    #[test]
    fn panicking_factory_releases_waiters() {
        let lazy = Arc::new(LazyProvider::with_factory(
            "exploding",
            |_: &str| -> Result<Arc<dyn SyntaxProvider>, TrapError> {
                thread::sleep(Duration::from_millis(50));
                panic!("grammar blew up")
            },
        ));

        let loader = {
            let lazy = Arc::clone(&lazy);
            thread::spawn(move || lazy.ensure_loaded().map(|_| ()))
        };
        while lazy.status() != LoadStatus::Loading {
            thread::yield_now();
        }
        let waiter = {
            let lazy = Arc::clone(&lazy);
            thread::spawn(move || lazy.ensure_loaded().map(|_| ()))
        };

        assert!(loader.join().is_err());
        let expected = TrapError::parse("loading grammar bundle 'exploding' panicked");
        assert_eq!(waiter.join().unwrap(), Err(expected.clone()));
        assert_eq!(lazy.status(), LoadStatus::Failed);
        assert_eq!(lazy.ensure_loaded().err(), Some(expected));
    }

    #[test]
    fn unknown_bundle_is_a_parse_failure() {
        let err = load_bundle("cobol", false).err().unwrap();
        assert_eq!(err, TrapError::parse("unknown grammar bundle 'cobol'"));
        assert!(load_bundle("JavaScript", false).is_ok());
    }
}
