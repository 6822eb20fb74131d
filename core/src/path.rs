//! Dotted paths addressing scopes and definitions from a tree root.

use serde::{Deserialize, Serialize};

/// A dotted path uniquely addressing a scope or definition.
///
/// The path is the canonical identity used for diagnostics, diffing, and
/// command-line overrides: two definitions at different tree positions with
/// the same path are the same logical parameter. The root path is empty.
///
/// # Examples
///
/// ```
/// use phil_core::PhilPath;
///
/// let path = PhilPath::root().push("refinement").push("cycles");
/// assert_eq!(path.as_str(), "refinement.cycles");
/// assert!(path.matches_suffix("cycles"));
/// assert!(path.matches_suffix("refinement.cycles"));
/// assert!(!path.matches_suffix("ment.cycles"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhilPath(String);

impl PhilPath {
    /// The empty root path.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Creates a path from dotted text.
    pub fn new(path: &str) -> Self {
        Self(path.to_string())
    }

    /// Returns the dotted text form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path with `name` appended.
    pub fn push(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{name}", self.0))
        }
    }

    /// Iterates the path's name segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// The final segment, if any.
    pub fn leaf(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Returns `true` when the path equals `suffix` or ends with
    /// `.{suffix}` on a segment boundary.
    pub fn matches_suffix(&self, suffix: &str) -> bool {
        if self.0 == suffix {
            return true;
        }
        self.0
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('.'))
    }
}

impl std::fmt::Display for PhilPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PhilPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_from_root_has_no_leading_dot() {
        assert_eq!(PhilPath::root().push("a").as_str(), "a");
        assert_eq!(PhilPath::root().push("a").push("b").as_str(), "a.b");
    }

    #[test]
    fn test_suffix_matching_respects_segment_boundaries() {
        let path = PhilPath::new("x.foo.name");
        assert!(path.matches_suffix("name"));
        assert!(path.matches_suffix("foo.name"));
        assert!(path.matches_suffix("x.foo.name"));
        assert!(!path.matches_suffix("oo.name"));
        assert!(!path.matches_suffix("y.foo.name"));
    }

    #[test]
    fn test_segments_and_leaf() {
        let path = PhilPath::new("a.b.c");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(path.leaf(), Some("c"));
        assert_eq!(PhilPath::root().leaf(), None);
    }
}
