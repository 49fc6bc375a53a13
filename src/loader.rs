//! File content retrieval for resolved frames.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::TrapError;

pub trait FileLoader: Send + Sync {
    fn load(&self, reference: &str) -> Result<String, TrapError>;
}

impl<F> FileLoader for F
where
    F: Fn(&str) -> Result<String, TrapError> + Send + Sync,
{
    fn load(&self, reference: &str) -> Result<String, TrapError> {
        self(reference)
    }
}

/// Reads frame files from disk.
///
/// `http(s)://host/path` references are served from `root/path`, which lets
/// a trace captured in a browser be replayed against a local checkout.
/// Relative paths are also joined onto `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    root: Option<PathBuf>,
}

impl FsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn local_path(&self, reference: &str) -> Result<PathBuf, TrapError> {
        if let Some(path) = reference.strip_prefix("file://") {
            return Ok(PathBuf::from(strip_query(path)));
        }

        let remote = reference
            .strip_prefix("http://")
            .or_else(|| reference.strip_prefix("https://"));
        if let Some(remote) = remote {
            let Some(root) = &self.root else {
                return Err(TrapError::retrieval(
                    reference,
                    "no source root configured for remote references",
                ));
            };
            let path = remote.split_once('/').map(|(_, path)| path).unwrap_or("");
            return Ok(root.join(strip_query(path)));
        }

        let path = Path::new(reference);
        match &self.root {
            Some(root) if path.is_relative() => Ok(root.join(path)),
            _ => Ok(path.to_path_buf()),
        }
    }
}

impl FileLoader for FsLoader {
    fn load(&self, reference: &str) -> Result<String, TrapError> {
        let path = self.local_path(reference)?;
        debug!("loading '{}' from '{}'", reference, path.display());
        fs::read_to_string(&path).map_err(|err| {
            TrapError::retrieval(reference, format!("{} ({})", err, path.display()))
        })
    }
}

fn strip_query(path: &str) -> &str {
    path.split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn maps_remote_references_onto_root() {
        let loader = FsLoader::with_root("/srv/site");
        let path = loader
            .local_path("http://localhost:8080/static/app.js?v=3")
            .unwrap();
        assert_eq!(path, PathBuf::from("/srv/site/static/app.js"));
    }

    #[test]
    fn remote_reference_without_root_fails() {
        let err = FsLoader::new()
            .local_path("https://example.com/app.js")
            .unwrap_err();
        assert!(matches!(err, TrapError::Retrieval { .. }));
    }

    #[test]
    fn file_urls_are_absolute() {
        let loader = FsLoader::with_root("/ignored");
        let path = loader.local_path("file:///home/me/app.js").unwrap();
        assert_eq!(path, PathBuf::from("/home/me/app.js"));
    }

    #[test]
    fn loads_relative_paths_from_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.js"), "let x = 1;\n").unwrap();

        let loader = FsLoader::with_root(dir.path());
        assert_eq!(loader.load("main.js").unwrap(), "let x = 1;\n");

        let err = loader.load("missing.js").unwrap_err();
        assert!(err.to_string().contains("missing.js"));
    }

    #[test]
    fn closures_are_loaders() {
        let loader = |reference: &str| -> Result<String, TrapError> {
            Ok(format!("// {reference}"))
        };
        assert_eq!(loader.load("a.js").unwrap(), "// a.js");
    }
}
