//! Scope-tree type definitions for phil configuration documents.
//!
//! This module defines the core data model used to represent parsed phil
//! text. The types are designed for serialization with [`serde`] and for
//! structural sharing: merge operations build new trees and never mutate an
//! existing one.

use serde::{Deserialize, Serialize};

use crate::PhilValue;
use crate::path::PhilPath;

/// Position of a token or node within its source text.
///
/// `source` is the identifier handed to the lexer (usually a file name);
/// `line` and `column` are 1-based. A location with line zero means
/// "unknown" and renders as an empty suffix in error messages.
///
/// # Examples
///
/// ```
/// use phil_core::SourceLocation;
///
/// let loc = SourceLocation::new("params.phil", 3, 7);
/// assert_eq!(loc.where_str(), " (params.phil, line 3)");
/// assert_eq!(SourceLocation::unknown().where_str(), "");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source identifier, typically a file name.
    pub source: String,
    /// 1-based line number (0 = unknown).
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

impl SourceLocation {
    /// Creates a location within a named source.
    pub fn new(source: &str, line: usize, column: usize) -> Self {
        Self {
            source: source.to_string(),
            line,
            column,
        }
    }

    /// Returns the "unknown" location.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Returns `true` if no position information is available.
    pub fn is_unknown(&self) -> bool {
        self.line == 0
    }

    /// Renders the location as an error-message suffix.
    ///
    /// Unknown locations render as an empty string so messages stay clean.
    pub fn where_str(&self) -> String {
        if self.is_unknown() {
            String::new()
        } else if self.source.is_empty() {
            format!(" (line {})", self.line)
        } else {
            format!(" ({}, line {})", self.source, self.line)
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}:{}", self.source, self.line, self.column)
        }
    }
}

/// A raw token of a definition value, as written in the source.
///
/// Words keep their quoting so round-trip formatting reproduces the input,
/// and carry their source location for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    /// Unquoted token text.
    pub value: String,
    /// Quote character (`'` or `"`) when the token was quoted.
    pub quote: Option<char>,
    /// Where the token appeared.
    pub location: SourceLocation,
}

impl Word {
    /// Creates an unquoted word with no location.
    pub fn unquoted(value: &str) -> Self {
        Self {
            value: value.to_string(),
            quote: None,
            location: SourceLocation::unknown(),
        }
    }

    /// Creates a quoted word with no location.
    pub fn quoted(value: &str, quote: char) -> Self {
        Self {
            value: value.to_string(),
            quote: Some(quote),
            location: SourceLocation::unknown(),
        }
    }

    /// Attaches a source location.
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        // Location is bookkeeping, not identity.
        self.value == other.value && self.quote == other.quote
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.quote {
            Some(q) => {
                write!(f, "{q}")?;
                for ch in self.value.chars() {
                    if ch == q || ch == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{ch}")?;
                }
                write!(f, "{q}")
            }
            None => write!(f, "{}", self.value),
        }
    }
}

/// Returns `true` when `words` is the single unquoted word `None`.
pub fn is_plain_none(words: &[Word]) -> bool {
    words.len() == 1 && words[0].quote.is_none() && words[0].value == "None"
}

/// A child of a [`Scope`]: either a nested scope or a leaf definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// A named container of further nodes.
    Scope(Scope),
    /// A named leaf parameter.
    Definition(Definition),
}

impl Node {
    /// The node's name.
    pub fn name(&self) -> &str {
        match self {
            Node::Scope(s) => &s.name,
            Node::Definition(d) => &d.name,
        }
    }

    /// Returns `true` for scope nodes.
    pub fn is_scope(&self) -> bool {
        matches!(self, Node::Scope(_))
    }

    /// Returns `true` for definition nodes.
    pub fn is_definition(&self) -> bool {
        matches!(self, Node::Definition(_))
    }

    /// Whether the node may repeat at its sibling level.
    pub fn multiple(&self) -> bool {
        match self {
            Node::Scope(s) => s.multiple,
            Node::Definition(d) => d.multiple,
        }
    }

    /// Whether the node is disabled (parsed but inert).
    pub fn disabled(&self) -> bool {
        match self {
            Node::Scope(s) => s.disabled,
            Node::Definition(d) => d.disabled,
        }
    }

    /// Where the node was declared.
    pub fn location(&self) -> &SourceLocation {
        match self {
            Node::Scope(s) => &s.location,
            Node::Definition(d) => &d.location,
        }
    }

    /// Borrows the scope payload, if any.
    pub fn as_scope(&self) -> Option<&Scope> {
        match self {
            Node::Scope(s) => Some(s),
            Node::Definition(_) => None,
        }
    }

    /// Borrows the definition payload, if any.
    pub fn as_definition(&self) -> Option<&Definition> {
        match self {
            Node::Scope(_) => None,
            Node::Definition(d) => Some(d),
        }
    }
}

/// A named container node of a scope tree.
///
/// The root of a document is a scope with an empty name. Sibling names are
/// unique unless the sibling is declared `multiple`, in which case repeated
/// blocks with the same name are appended rather than replaced during
/// merges.
///
/// # Examples
///
/// ```
/// use phil_core::{Definition, Node, Scope, Word};
///
/// let tree = Scope::root().with(Node::Scope(
///     Scope::new("refinement").with(Node::Definition(Definition::new(
///         "cycles",
///         "int",
///         vec![Word::unquoted("3")],
///     ))),
/// ));
/// assert_eq!(tree.objects.len(), 1);
/// assert!(tree.get("refinement.cycles").next().is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    /// Scope name; empty for the document root.
    pub name: String,
    /// Ordered children.
    pub objects: Vec<Node>,
    /// Whether working documents may append additional instances.
    pub multiple: bool,
    /// Whether a `multiple` scope may have zero instances.
    pub optional: bool,
    /// Help text shown to users.
    pub help: Option<String>,
    /// Display caption.
    pub caption: Option<String>,
    /// Rendering/style hint, uninterpreted by the engine.
    pub style: Option<String>,
    /// Minimum expert level at which the scope is shown.
    pub expert_level: Option<u32>,
    /// Disabled scopes are kept in the tree but ignored by merges.
    pub disabled: bool,
    /// Where the scope was declared.
    pub location: SourceLocation,
}

impl Scope {
    /// Creates an empty named scope.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            optional: true,
            ..Default::default()
        }
    }

    /// Creates the document root (empty name).
    pub fn root() -> Self {
        Self::new("")
    }

    /// Appends a child node (builder style).
    pub fn with(mut self, node: Node) -> Self {
        self.objects.push(node);
        self
    }

    /// Appends a child node in place.
    pub fn adopt(&mut self, node: Node) {
        self.objects.push(node);
    }

    /// Returns `true` when the scope has no enabled children.
    pub fn is_empty(&self) -> bool {
        self.active_objects().next().is_none()
    }

    /// Iterates enabled children in declaration order.
    pub fn active_objects(&self) -> impl Iterator<Item = &Node> {
        self.objects.iter().filter(|node| !node.disabled())
    }

    /// Iterates enabled children, keeping only the first occurrence of each
    /// `multiple` name.
    ///
    /// The first occurrence of a repeatable name acts as the template that
    /// later instances are validated against, so merge walks visit it once.
    pub fn template_objects(&self) -> impl Iterator<Item = &Node> {
        let mut seen: Vec<String> = Vec::new();
        self.active_objects().filter(move |node| {
            if node.multiple() {
                if seen.iter().any(|name| name == node.name()) {
                    return false;
                }
                seen.push(node.name().to_string());
            }
            true
        })
    }

    /// Iterates all enabled nodes reachable through a dotted path relative
    /// to this scope.
    pub fn get<'a>(&'a self, path: &'a str) -> Box<dyn Iterator<Item = &'a Node> + 'a> {
        match path.split_once('.') {
            None => Box::new(self.active_objects().filter(move |node| node.name() == path)),
            Some((head, rest)) => Box::new(
                self.active_objects()
                    .filter(move |node| node.name() == head)
                    .filter_map(|node| node.as_scope())
                    .flat_map(move |scope| scope.get(rest)),
            ),
        }
    }

    /// Collects the full path of every enabled definition below this scope.
    ///
    /// Paths are returned in declaration order; repeated `multiple` names
    /// appear once per instance.
    pub fn definition_paths(&self) -> Vec<PhilPath> {
        let mut out = Vec::new();
        self.collect_definition_paths(&PhilPath::root(), &mut out);
        out
    }

    fn collect_definition_paths(&self, prefix: &PhilPath, out: &mut Vec<PhilPath>) {
        for node in self.active_objects() {
            match node {
                Node::Definition(def) => out.push(prefix.push(&def.name)),
                Node::Scope(scope) => {
                    scope.collect_definition_paths(&prefix.push(&scope.name), out)
                }
            }
        }
    }
}

/// A named leaf parameter.
///
/// A definition carries both the raw [`Word`]s as written and the typed
/// values produced by its type handler. After a fetch, `defaults` holds the
/// master's typed values so callers can tell overridden parameters apart
/// from defaulted ones.
///
/// # Examples
///
/// ```
/// use phil_core::{Definition, PhilValue, Word};
///
/// let def = Definition::new("sigma", "float", vec![Word::unquoted("2.5")])
///     .with_values(vec![PhilValue::Float(2.5)]);
/// assert_eq!(def.type_name, "float");
/// assert_eq!(def.values.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Parameter name.
    pub name: String,
    /// Declared type, resolved through the type registry.
    pub type_name: String,
    /// Raw value tokens as written.
    pub words: Vec<Word>,
    /// Parsed, typed values. Empty for an unset optional parameter.
    pub values: Vec<PhilValue>,
    /// Master defaults captured by fetch; `None` on freshly parsed trees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Vec<PhilValue>>,
    /// Whether the definition may repeat at its sibling level.
    pub multiple: bool,
    /// Whether the value may be unset (`None`).
    pub optional: bool,
    /// Set on command-line `path+=value` overrides; fetch extends the
    /// current words instead of replacing them.
    #[serde(default)]
    pub append: bool,
    /// Help text shown to users.
    pub help: Option<String>,
    /// Display caption.
    pub caption: Option<String>,
    /// Rendering/style hint, uninterpreted by the engine.
    pub style: Option<String>,
    /// Minimum expert level at which the definition is shown.
    pub expert_level: Option<u32>,
    /// Deprecated parameters still merge but are reported as warnings.
    pub deprecated: bool,
    /// Disabled definitions are kept in the tree but ignored by merges.
    pub disabled: bool,
    /// Where the definition was declared.
    pub location: SourceLocation,
}

impl Definition {
    /// Creates a definition with raw words and no parsed values.
    pub fn new(name: &str, type_name: &str, words: Vec<Word>) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            words,
            values: Vec::new(),
            defaults: None,
            multiple: false,
            optional: true,
            append: false,
            help: None,
            caption: None,
            style: None,
            expert_level: None,
            deprecated: false,
            disabled: false,
            location: SourceLocation::unknown(),
        }
    }

    /// Sets the parsed values (builder style).
    pub fn with_values(mut self, values: Vec<PhilValue>) -> Self {
        self.values = values;
        self
    }

    /// Returns `true` when the fetched values differ from the captured
    /// master defaults (value-level comparison, so `1.0` equals `1`).
    pub fn is_overridden(&self) -> bool {
        match &self.defaults {
            None => false,
            Some(defaults) => !crate::value::values_eq(&self.values, defaults),
        }
    }
}
