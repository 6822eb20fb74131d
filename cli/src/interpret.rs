//! Turning command-line arguments into working documents.
//!
//! Every positional argument is interpreted against the master tree:
//!
//! - `path=value` and `path+=value` become one-parameter working
//!   documents. The path may be any unambiguous suffix of a full
//!   parameter path (`cycles=8` for `refinement.cycles`).
//! - An argument naming an existing file is parsed as a working phil
//!   document.
//! - An argument containing `{` is parsed as an inline phil snippet.
//! - `--flags` and anything else are left unconsumed for the caller.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use phil_core::{
    Definition, Diagnostic, Node, PhilError, PhilPath, Scope, SourceLocation, TypeRegistry, Word,
};
use phil_parser::{PhilParser, TokenKind, tokenize};
use regex::Regex;
use tracing::debug;

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][\w.]*)\s*(\+?=)(.*)$").expect("assignment pattern compiles")
});

/// What the interpreter made of a list of arguments.
#[derive(Debug)]
pub struct InterpretOutcome {
    /// One working document per consumed argument, in argument order.
    pub working: Vec<Scope>,
    /// Arguments left for the caller, in their original order.
    pub unconsumed: Vec<String>,
    /// Hard problems: ambiguous or unknown paths, bad values, unreadable
    /// files.
    pub errors: Vec<PhilError>,
    /// Soft problems from parsing working files.
    pub warnings: Vec<Diagnostic>,
}

impl InterpretOutcome {
    /// Returns `true` when every consumed argument was valid.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interprets command-line arguments against a master tree.
///
/// # Examples
///
/// ```
/// use phil_core::{Definition, Node, Scope, TypeRegistry, Word};
/// use phil_cli::ArgumentInterpreter;
///
/// let master = Scope::root().with(Node::Scope(Scope::new("run").with(Node::Definition(
///     Definition::new("cycles", "int", vec![Word::unquoted("3")]),
/// ))));
/// let registry = TypeRegistry::with_builtins();
///
/// let outcome = ArgumentInterpreter::new(&master, &registry)
///     .interpret(&["cycles=8".to_string(), "--verbose".to_string()]);
/// assert!(outcome.is_clean());
/// assert_eq!(outcome.working.len(), 1);
/// assert_eq!(outcome.unconsumed, vec!["--verbose"]);
/// ```
pub struct ArgumentInterpreter<'a> {
    master: &'a Scope,
    registry: &'a TypeRegistry,
    known_paths: Vec<PhilPath>,
}

impl<'a> ArgumentInterpreter<'a> {
    pub fn new(master: &'a Scope, registry: &'a TypeRegistry) -> Self {
        let mut known_paths = Vec::new();
        let mut seen = HashSet::new();
        for path in master.definition_paths() {
            if seen.insert(path.clone()) {
                known_paths.push(path);
            }
        }
        Self {
            master,
            registry,
            known_paths,
        }
    }

    /// Interprets `args` in order, collecting problems instead of
    /// stopping.
    pub fn interpret(&self, args: &[String]) -> InterpretOutcome {
        let mut outcome = InterpretOutcome {
            working: Vec::new(),
            unconsumed: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        for arg in args {
            self.interpret_arg(arg, &mut outcome);
        }
        outcome
    }

    fn interpret_arg(&self, arg: &str, outcome: &mut InterpretOutcome) {
        if arg.starts_with("--") {
            outcome.unconsumed.push(arg.to_string());
            return;
        }
        if let Some(captures) = ASSIGNMENT.captures(arg) {
            let given = &captures[1];
            let append = &captures[2] == "+=";
            let value = &captures[3];
            match self.resolve_assignment(given, append, value) {
                Ok(tree) => outcome.working.push(tree),
                Err(error) => outcome.errors.push(error),
            }
            return;
        }
        if Path::new(arg).is_file() {
            debug!(file = arg, "reading working document");
            let parsed = PhilParser::new(self.registry).parse_file(arg);
            outcome.warnings.extend(parsed.warnings);
            if parsed.errors.is_empty() {
                outcome.working.push(parsed.tree);
            } else {
                outcome.errors.extend(parsed.errors);
            }
            return;
        }
        if arg.contains('{') {
            let parsed = PhilParser::new(self.registry).parse_str(arg, "command line");
            outcome.warnings.extend(parsed.warnings);
            if parsed.errors.is_empty() {
                outcome.working.push(parsed.tree);
            } else {
                outcome.errors.extend(parsed.errors);
            }
            return;
        }
        outcome.unconsumed.push(arg.to_string());
    }

    /// Resolves a `path=value` argument to a one-parameter working tree.
    ///
    /// An exact full-path match always wins; otherwise the path must be
    /// the suffix of exactly one parameter.
    fn resolve_assignment(&self, given: &str, append: bool, value: &str) -> Result<Scope, PhilError> {
        let full_path = self.resolve_path(given)?;
        let words = self.lex_value(value)?;

        // No declared type; the master's type applies at fetch time.
        let mut def = Definition::new(full_path.leaf().unwrap_or(given), "", words);
        def.append = append;
        def.location = SourceLocation::new("command line", 1, 1);

        let mut node = Node::Definition(def);
        let segments: Vec<&str> = full_path.segments().collect();
        for segment in segments[..segments.len().saturating_sub(1)].iter().rev() {
            let mut wrapper = Scope::new(segment);
            wrapper.adopt(node);
            node = Node::Scope(wrapper);
        }
        Ok(Scope::root().with(node))
    }

    fn resolve_path(&self, given: &str) -> Result<PhilPath, PhilError> {
        if self.known_paths.iter().any(|p| p.as_str() == given) {
            return Ok(PhilPath::new(given));
        }
        let candidates: Vec<PhilPath> = self
            .known_paths
            .iter()
            .filter(|p| p.matches_suffix(given))
            .cloned()
            .collect();
        match candidates.as_slice() {
            [] => Err(PhilError::Path {
                path: PhilPath::new(given),
            }),
            [only] => Ok(only.clone()),
            _ => Err(PhilError::AmbiguousPath {
                given: given.to_string(),
                candidates,
            }),
        }
    }

    fn lex_value(&self, value: &str) -> Result<Vec<Word>, PhilError> {
        let (tokens, errors) = tokenize(value, "command line");
        if let Some(error) = errors.into_iter().next() {
            return Err(error);
        }
        let mut words = Vec::new();
        for token in tokens {
            match token.kind {
                TokenKind::Word(text) => words.push(Word::unquoted(&text).at(token.location)),
                TokenKind::Quoted(text, quote) => {
                    words.push(Word::quoted(&text, quote).at(token.location));
                }
                TokenKind::Newline => {}
                TokenKind::LBrace | TokenKind::RBrace | TokenKind::Equals => {
                    return Err(PhilError::syntax(
                        "braces and '=' are not allowed in a command-line value",
                        token.location,
                    ));
                }
            }
        }
        Ok(words)
    }

    /// The master this interpreter resolves against.
    pub fn master(&self) -> &Scope {
        self.master
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phil_core::PhilValue;

    fn master() -> Scope {
        let def = |name: &str, type_name: &str, value: &str| {
            Node::Definition(Definition::new(
                name,
                type_name,
                vec![Word::unquoted(value)],
            ))
        };
        Scope::root()
            .with(Node::Scope(
                Scope::new("x").with(Node::Scope(
                    Scope::new("foo").with(def("name", "str", "a")),
                )),
            ))
            .with(Node::Scope(
                Scope::new("y").with(Node::Scope(
                    Scope::new("foo").with(def("name", "str", "b")),
                )),
            ))
            .with(Node::Scope(
                Scope::new("run").with(def("cycles", "int", "3")),
            ))
    }

    fn interpret(args: &[&str]) -> InterpretOutcome {
        let master = master();
        let registry = TypeRegistry::with_builtins();
        ArgumentInterpreter::new(&master, &registry)
            .interpret(&args.iter().map(|a| a.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_suffix_resolves_to_full_path() {
        let outcome = interpret(&["cycles=8"]);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let def = outcome.working[0]
            .get("run.cycles")
            .next()
            .unwrap()
            .as_definition()
            .unwrap()
            .clone();
        assert_eq!(def.words[0].value, "8");
    }

    #[test]
    fn test_ambiguous_suffix_lists_candidates() {
        let outcome = interpret(&["foo.name=z"]);
        assert_eq!(outcome.errors.len(), 1);
        let PhilError::AmbiguousPath { candidates, .. } = &outcome.errors[0] else {
            panic!("expected ambiguity, got {:?}", outcome.errors[0]);
        };
        let paths: Vec<_> = candidates.iter().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["x.foo.name", "y.foo.name"]);
    }

    #[test]
    fn test_exact_full_path_beats_suffix_ambiguity() {
        let outcome = interpret(&["x.foo.name=z"]);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        assert!(outcome.working[0].get("x.foo.name").next().is_some());
    }

    #[test]
    fn test_unknown_path_is_an_error() {
        let outcome = interpret(&["bogus=1"]);
        assert!(matches!(outcome.errors[0], PhilError::Path { .. }));
    }

    #[test]
    fn test_flags_and_free_words_are_unconsumed() {
        let outcome = interpret(&["--verbose", "input.dat"]);
        assert!(outcome.is_clean());
        assert!(outcome.working.is_empty());
        assert_eq!(outcome.unconsumed, vec!["--verbose", "input.dat"]);
    }

    #[test]
    fn test_append_assignment_sets_append_flag() {
        let outcome = interpret(&["cycles+=9"]);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let def = outcome.working[0]
            .get("run.cycles")
            .next()
            .unwrap()
            .as_definition()
            .unwrap();
        assert!(def.append);
    }

    #[test]
    fn test_quoted_values_lex_as_single_word() {
        let master = Scope::root().with(Node::Definition(Definition::new(
            "title",
            "str",
            vec![Word::unquoted("t")],
        )));
        let registry = TypeRegistry::with_builtins();
        let outcome = ArgumentInterpreter::new(&master, &registry)
            .interpret(&["title=\"two words\"".to_string()]);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let def = outcome.working[0]
            .get("title")
            .next()
            .unwrap()
            .as_definition()
            .unwrap()
            .clone();
        assert_eq!(def.words.len(), 1);
        assert_eq!(def.words[0].value, "two words");
    }

    #[test]
    fn test_inline_snippet_parses_as_working_tree() {
        let outcome = interpret(&["run { cycles = 5 }"]);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        assert!(outcome.working[0].get("run.cycles").next().is_some());
    }

    #[test]
    fn test_values_parse_after_fetch() {
        let master = master();
        let registry = TypeRegistry::with_builtins();
        let outcome = ArgumentInterpreter::new(&master, &registry)
            .interpret(&["cycles=8".to_string()]);
        let sources: Vec<&Scope> = outcome.working.iter().collect();
        let result = phil_core::fetch(
            &master,
            &sources,
            &registry,
            &phil_core::FetchOptions::default(),
        )
        .unwrap();
        let def = result
            .merged
            .get("run.cycles")
            .next()
            .unwrap()
            .as_definition()
            .unwrap()
            .clone();
        assert_eq!(def.values, vec![PhilValue::Int(8)]);
    }
}
