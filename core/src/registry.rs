//! Pluggable type handlers and the registry that resolves them.
//!
//! Every definition names a type (`int`, `choice`, ...). A [`TypeHandler`]
//! owns the three conversions for that type: raw words to typed values,
//! master words merged with working words during fetch, and typed values
//! back to words for formatting. Embedders register their own handlers to
//! extend the built-in set.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{PhilError, Result};
use crate::types::{Word, is_plain_none};
use crate::value::PhilValue;

/// Whether a type yields one value or a list of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    List,
}

/// Conversion logic for one declared type.
///
/// Handlers are stateless and shared behind `Arc`, so they must be
/// `Send + Sync`.
pub trait TypeHandler: Send + Sync {
    /// The name definitions use to select this handler.
    fn type_name(&self) -> &str;

    /// Whether the type carries a single value or a list.
    fn cardinality(&self) -> Cardinality {
        Cardinality::Single
    }

    /// Converts raw words into typed values.
    ///
    /// A bare `None` means "unset" and parses to an empty value list.
    fn parse(&self, words: &[Word]) -> Result<Vec<PhilValue>>;

    /// Merges a working document's words over the master's during fetch.
    ///
    /// The default is "working wins": the working words replace the master
    /// words wholesale, validated by a parse. Types whose master words carry
    /// structure (such as `choice` option lists) override this.
    fn fetch(&self, _master_words: &[Word], source_words: &[Word]) -> Result<Vec<Word>> {
        self.parse(source_words)?;
        Ok(source_words.to_vec())
    }

    /// Renders typed values back into words, against the definition's
    /// declared words (used by `choice` to recover the option list).
    ///
    /// An empty value list renders as the single word `None`.
    fn format(&self, _def_words: &[Word], values: &[PhilValue]) -> Result<Vec<Word>> {
        if values.is_empty() {
            return Ok(vec![Word::unquoted("None")]);
        }
        Ok(values
            .iter()
            .map(|v| match v {
                PhilValue::String(s) if s.chars().any(char::is_whitespace) => {
                    Word::quoted(s, '"')
                }
                other => Word::unquoted(&other.as_word_text()),
            })
            .collect())
    }
}

fn first_location(words: &[Word]) -> crate::SourceLocation {
    words
        .first()
        .map(|w| w.location.clone())
        .unwrap_or_default()
}

fn words_text(words: &[Word]) -> String {
    words
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves type names to their handlers.
///
/// # Examples
///
/// ```
/// use phil_core::TypeRegistry;
///
/// let registry = TypeRegistry::with_builtins();
/// assert!(registry.resolve("int").is_some());
/// assert!(registry.resolve("quaternion").is_none());
/// ```
#[derive(Clone)]
pub struct TypeRegistry {
    handlers: HashMap<String, Arc<dyn TypeHandler>>,
}

impl TypeRegistry {
    /// Creates an empty registry with no handlers at all.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Creates a registry pre-loaded with the built-in phil types:
    /// `str`, `words`, `strings`, `path`, `key`, `bool`, `int`, `float`,
    /// `ints`, `floats`, and `choice`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StrType));
        registry.register(Arc::new(WordsType {
            name: "words",
            strip_quotes: false,
        }));
        registry.register(Arc::new(WordsType {
            name: "strings",
            strip_quotes: true,
        }));
        registry.register(Arc::new(PathType { name: "path" }));
        registry.register(Arc::new(PathType { name: "key" }));
        registry.register(Arc::new(BoolType));
        registry.register(Arc::new(NumberType {
            name: "int",
            list: false,
        }));
        registry.register(Arc::new(NumberType {
            name: "ints",
            list: true,
        }));
        registry.register(Arc::new(FloatType {
            name: "float",
            list: false,
        }));
        registry.register(Arc::new(FloatType {
            name: "floats",
            list: true,
        }));
        registry.register(Arc::new(ChoiceType));
        registry
    }

    /// Registers a handler, replacing any previous one with the same name.
    pub fn register(&mut self, handler: Arc<dyn TypeHandler>) {
        debug!(type_name = handler.type_name(), "registering type handler");
        self.handlers
            .insert(handler.type_name().to_string(), handler);
    }

    /// Looks up the handler for a type name.
    pub fn resolve(&self, type_name: &str) -> Option<Arc<dyn TypeHandler>> {
        self.handlers.get(type_name).cloned()
    }

    /// Iterates the registered type names (unordered).
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

/// `str`: all words joined into one string value.
struct StrType;

impl TypeHandler for StrType {
    fn type_name(&self) -> &str {
        "str"
    }

    fn parse(&self, words: &[Word]) -> Result<Vec<PhilValue>> {
        if words.is_empty() || is_plain_none(words) {
            return Ok(Vec::new());
        }
        let text = words
            .iter()
            .map(|w| w.value.clone())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(vec![PhilValue::String(text)])
    }
}

/// `words` and `strings`: one string value per word.
///
/// `words` keeps each token's quoting in the value; `strings` strips it.
struct WordsType {
    name: &'static str,
    strip_quotes: bool,
}

impl TypeHandler for WordsType {
    fn type_name(&self) -> &str {
        self.name
    }

    fn cardinality(&self) -> Cardinality {
        Cardinality::List
    }

    fn parse(&self, words: &[Word]) -> Result<Vec<PhilValue>> {
        if words.is_empty() || is_plain_none(words) {
            return Ok(Vec::new());
        }
        Ok(words
            .iter()
            .map(|w| {
                if self.strip_quotes {
                    PhilValue::String(w.value.clone())
                } else {
                    PhilValue::String(w.to_string())
                }
            })
            .collect())
    }
}

/// `path` and `key`: a single opaque string token.
struct PathType {
    name: &'static str,
}

impl TypeHandler for PathType {
    fn type_name(&self) -> &str {
        self.name
    }

    fn parse(&self, words: &[Word]) -> Result<Vec<PhilValue>> {
        if words.is_empty() || is_plain_none(words) {
            return Ok(Vec::new());
        }
        if words.len() != 1 {
            return Err(PhilError::type_error(
                self.name,
                words_text(words),
                first_location(words),
            ));
        }
        Ok(vec![PhilValue::String(words[0].value.clone())])
    }
}

/// `bool`: accepts `True`/`False`, `yes`/`no`, `on`/`off`, `1`/`0`
/// (case-insensitive).
struct BoolType;

impl TypeHandler for BoolType {
    fn type_name(&self) -> &str {
        "bool"
    }

    fn parse(&self, words: &[Word]) -> Result<Vec<PhilValue>> {
        if words.is_empty() || is_plain_none(words) {
            return Ok(Vec::new());
        }
        if words.len() == 1 {
            match words[0].value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => return Ok(vec![PhilValue::Bool(true)]),
                "false" | "no" | "off" | "0" => return Ok(vec![PhilValue::Bool(false)]),
                _ => {}
            }
        }
        Err(PhilError::type_error(
            "bool",
            words_text(words),
            first_location(words),
        ))
    }
}

/// `int` and `ints`.
struct NumberType {
    name: &'static str,
    list: bool,
}

impl TypeHandler for NumberType {
    fn type_name(&self) -> &str {
        self.name
    }

    fn cardinality(&self) -> Cardinality {
        if self.list {
            Cardinality::List
        } else {
            Cardinality::Single
        }
    }

    fn parse(&self, words: &[Word]) -> Result<Vec<PhilValue>> {
        if words.is_empty() || is_plain_none(words) {
            return Ok(Vec::new());
        }
        if !self.list && words.len() != 1 {
            return Err(PhilError::type_error(
                self.name,
                words_text(words),
                first_location(words),
            ));
        }
        words
            .iter()
            .map(|w| {
                w.value.parse::<i64>().map(PhilValue::Int).map_err(|_| {
                    PhilError::type_error(self.name, w.value.clone(), w.location.clone())
                })
            })
            .collect()
    }
}

/// `float` and `floats`.
struct FloatType {
    name: &'static str,
    list: bool,
}

impl TypeHandler for FloatType {
    fn type_name(&self) -> &str {
        self.name
    }

    fn cardinality(&self) -> Cardinality {
        if self.list {
            Cardinality::List
        } else {
            Cardinality::Single
        }
    }

    fn parse(&self, words: &[Word]) -> Result<Vec<PhilValue>> {
        if words.is_empty() || is_plain_none(words) {
            return Ok(Vec::new());
        }
        if !self.list && words.len() != 1 {
            return Err(PhilError::type_error(
                self.name,
                words_text(words),
                first_location(words),
            ));
        }
        words
            .iter()
            .map(|w| {
                w.value.parse::<f64>().map(PhilValue::Float).map_err(|_| {
                    PhilError::type_error(self.name, w.value.clone(), w.location.clone())
                })
            })
            .collect()
    }
}

/// `choice`: the words are the option list, with `*` marking selections.
///
/// `gain = *auto manual off` selects `auto`. A working document may write
/// either a starred option list or just the bare selection (`gain = manual`).
struct ChoiceType;

impl ChoiceType {
    fn options(words: &[Word]) -> Vec<String> {
        words
            .iter()
            .map(|w| w.value.trim_start_matches('*').to_string())
            .collect()
    }

    fn selections(words: &[Word]) -> Vec<String> {
        // A single unstarred word is shorthand for selecting that option.
        if words.len() == 1 && !words[0].value.starts_with('*') && words[0].value != "None" {
            return vec![words[0].value.clone()];
        }
        words
            .iter()
            .filter_map(|w| w.value.strip_prefix('*'))
            .map(str::to_string)
            .collect()
    }
}

impl TypeHandler for ChoiceType {
    fn type_name(&self) -> &str {
        "choice"
    }

    fn parse(&self, words: &[Word]) -> Result<Vec<PhilValue>> {
        if words.is_empty() || is_plain_none(words) {
            return Ok(Vec::new());
        }
        Ok(Self::selections(words)
            .into_iter()
            .map(PhilValue::String)
            .collect())
    }

    fn fetch(&self, master_words: &[Word], source_words: &[Word]) -> Result<Vec<Word>> {
        if source_words.is_empty() || is_plain_none(source_words) {
            return Ok(master_words
                .iter()
                .map(|w| Word::unquoted(w.value.trim_start_matches('*')))
                .collect());
        }
        let options = Self::options(master_words);
        let selections = Self::selections(source_words);
        for selection in &selections {
            if !options.iter().any(|o| o == selection) {
                return Err(PhilError::type_error(
                    format!("choice of {}", options.join("/")),
                    selection.clone(),
                    first_location(source_words),
                ));
            }
        }
        Ok(options
            .into_iter()
            .map(|option| {
                if selections.iter().any(|s| *s == option) {
                    Word::unquoted(&format!("*{option}"))
                } else {
                    Word::unquoted(&option)
                }
            })
            .collect())
    }

    fn format(&self, def_words: &[Word], values: &[PhilValue]) -> Result<Vec<Word>> {
        let options = Self::options(def_words);
        for value in values {
            let PhilValue::String(selection) = value else {
                return Err(PhilError::type_error(
                    "choice",
                    value.as_word_text(),
                    Default::default(),
                ));
            };
            if !options.iter().any(|o| o == selection) {
                return Err(PhilError::type_error(
                    format!("choice of {}", options.join("/")),
                    selection.clone(),
                    Default::default(),
                ));
            }
        }
        Ok(options
            .into_iter()
            .map(|option| {
                let selected = values
                    .iter()
                    .any(|v| matches!(v, PhilValue::String(s) if *s == option));
                if selected {
                    Word::unquoted(&format!("*{option}"))
                } else {
                    Word::unquoted(&option)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(texts: &[&str]) -> Vec<Word> {
        texts.iter().map(|t| Word::unquoted(t)).collect()
    }

    #[test]
    fn test_bool_accepts_common_spellings() {
        let handler = BoolType;
        for text in ["True", "true", "yes", "on", "1"] {
            assert_eq!(
                handler.parse(&words(&[text])).unwrap(),
                vec![PhilValue::Bool(true)],
                "{text}"
            );
        }
        for text in ["False", "no", "off", "0"] {
            assert_eq!(
                handler.parse(&words(&[text])).unwrap(),
                vec![PhilValue::Bool(false)],
                "{text}"
            );
        }
        assert!(handler.parse(&words(&["maybe"])).is_err());
    }

    #[test]
    fn test_none_parses_to_empty_values() {
        let registry = TypeRegistry::with_builtins();
        for name in ["str", "int", "float", "bool", "choice", "ints"] {
            let handler = registry.resolve(name).unwrap();
            assert!(handler.parse(&words(&["None"])).unwrap().is_empty(), "{name}");
        }
    }

    #[test]
    fn test_int_rejects_extra_words_but_ints_accepts_them() {
        let registry = TypeRegistry::with_builtins();
        let int = registry.resolve("int").unwrap();
        let ints = registry.resolve("ints").unwrap();
        assert!(int.parse(&words(&["1", "2"])).is_err());
        assert_eq!(
            ints.parse(&words(&["1", "2"])).unwrap(),
            vec![PhilValue::Int(1), PhilValue::Int(2)]
        );
    }

    #[test]
    fn test_str_joins_words() {
        let handler = StrType;
        assert_eq!(
            handler.parse(&words(&["a", "b"])).unwrap(),
            vec![PhilValue::String("a b".to_string())]
        );
    }

    #[test]
    fn test_choice_parse_reads_stars() {
        let handler = ChoiceType;
        assert_eq!(
            handler.parse(&words(&["*auto", "manual", "off"])).unwrap(),
            vec![PhilValue::String("auto".to_string())]
        );
        // Bare selection shorthand.
        assert_eq!(
            handler.parse(&words(&["manual"])).unwrap(),
            vec![PhilValue::String("manual".to_string())]
        );
    }

    #[test]
    fn test_choice_fetch_restars_master_options() {
        let handler = ChoiceType;
        let master = words(&["*auto", "manual", "off"]);
        let merged = handler.fetch(&master, &words(&["manual"])).unwrap();
        let texts: Vec<_> = merged.iter().map(|w| w.value.as_str()).collect();
        assert_eq!(texts, vec!["auto", "*manual", "off"]);

        assert!(handler.fetch(&master, &words(&["bogus"])).is_err());
    }

    #[test]
    fn test_choice_format_validates_selection() {
        let handler = ChoiceType;
        let def = words(&["*auto", "manual"]);
        let out = handler
            .format(&def, &[PhilValue::String("manual".to_string())])
            .unwrap();
        let texts: Vec<_> = out.iter().map(|w| w.value.as_str()).collect();
        assert_eq!(texts, vec!["auto", "*manual"]);
        assert!(
            handler
                .format(&def, &[PhilValue::String("bogus".to_string())])
                .is_err()
        );
    }

    #[test]
    fn test_default_format_renders_none_for_empty() {
        let handler = StrType;
        let out = handler.format(&[], &[]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "None");
    }
}
