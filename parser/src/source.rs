//! Resolving `include file` references to source text.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Resolves an include reference to source text.
///
/// `load` returns the text together with a canonical identifier for the
/// resolved source. The identifier is used for cycle detection and appears
/// in error locations, so two references to the same document must map to
/// the same identifier.
pub trait SourceLoader {
    /// Loads `reference`, resolved relative to the including source when
    /// one is given.
    fn load(&self, reference: &str, relative_to: Option<&str>) -> io::Result<(String, String)>;
}

/// Loads includes from the filesystem.
///
/// Relative references resolve against the including file's directory;
/// the canonical identifier is the canonicalized path.
#[derive(Debug, Default)]
pub struct FileLoader;

impl SourceLoader for FileLoader {
    fn load(&self, reference: &str, relative_to: Option<&str>) -> io::Result<(String, String)> {
        let mut path = PathBuf::from(reference);
        if path.is_relative() {
            if let Some(parent) = relative_to.map(Path::new).and_then(Path::parent) {
                path = parent.join(path);
            }
        }
        let canonical = path.canonicalize()?;
        let text = std::fs::read_to_string(&canonical)?;
        Ok((text, canonical.to_string_lossy().into_owned()))
    }
}

/// Loads includes from an in-memory map, keyed by reference.
///
/// Mostly useful in tests and for embedding documents in a binary.
#[derive(Debug, Default)]
pub struct MapLoader {
    sources: HashMap<String, String>,
}

impl MapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named document (builder style).
    pub fn with_source(mut self, name: &str, text: &str) -> Self {
        self.sources.insert(name.to_string(), text.to_string());
        self
    }
}

impl SourceLoader for MapLoader {
    fn load(&self, reference: &str, _relative_to: Option<&str>) -> io::Result<(String, String)> {
        match self.sources.get(reference) {
            Some(text) => Ok((text.clone(), reference.to_string())),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such source: {reference}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_map_loader_returns_registered_text() {
        let loader = MapLoader::new().with_source("base.phil", "x = 1\n");
        let (text, id) = loader.load("base.phil", None).unwrap();
        assert_eq!(text, "x = 1\n");
        assert_eq!(id, "base.phil");
        assert!(loader.load("missing.phil", None).is_err());
    }

    #[test]
    fn test_file_loader_resolves_relative_to_includer() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.phil");
        let mut file = std::fs::File::create(&base).unwrap();
        writeln!(file, "x = 1").unwrap();

        let includer = dir.path().join("main.phil").to_string_lossy().into_owned();
        let (text, id) = FileLoader.load("base.phil", Some(&includer)).unwrap();
        assert_eq!(text, "x = 1\n");
        assert!(id.ends_with("base.phil"));
    }
}
