//! `$variable` references in definition values.
//!
//! A word may reference another parameter (`$name`, or `$(run.cycles)` for
//! dotted paths) or an environment variable. References are resolved after
//! a merge, so a working document can point at values the master or another
//! working document supplies. `\$` produces a literal dollar sign, and
//! words in single quotes are never substituted.

use std::collections::HashMap;

use crate::error::{PhilError, Result};
use crate::path::PhilPath;
use crate::types::{Node, Scope, Word};

enum Piece {
    Text(String),
    Variable(String),
}

/// Splits a word's text into literal and variable pieces.
///
/// Returns `None` when the text contains neither a reference nor an
/// escape, so untouched words can be kept as-is.
fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn split(value: &str) -> std::result::Result<Option<Vec<Piece>>, String> {
    let mut pieces: Vec<Piece> = Vec::new();
    let mut text = String::new();
    let mut touched = false;
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek() == Some(&'$') {
            chars.next();
            text.push('$');
            touched = true;
        } else if ch == '$' {
            let mut name = String::new();
            if chars.peek() == Some(&'(') {
                chars.next();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(c) => name.push(c),
                        None => return Err("missing ')' after \"$(\"".to_string()),
                    }
                }
                let valid = !name.is_empty()
                    && name.split('.').all(|segment| {
                        segment.starts_with(is_name_start)
                            && segment.chars().all(is_name_char)
                    });
                if !valid {
                    return Err(format!("improper variable name \"$({name})\""));
                }
            } else {
                // Bare references stop at the first dot; dotted paths need
                // the parenthesized form.
                match chars.peek() {
                    Some(&c) if is_name_start(c) => {}
                    _ => return Err("\"$\" must be followed by an identifier".to_string()),
                }
                while let Some(&c) = chars.peek() {
                    if is_name_char(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            touched = true;
            if !text.is_empty() {
                pieces.push(Piece::Text(std::mem::take(&mut text)));
            }
            pieces.push(Piece::Variable(name));
        } else {
            text.push(ch);
        }
    }
    if !touched {
        return Ok(None);
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    Ok(Some(pieces))
}

/// Lookup table for resolving `$` references against a merged tree.
///
/// References name a definition by its full dotted path; paths absent from
/// the tree fall back to the process environment. Resolution recurses
/// through chained references and reports cycles.
pub(crate) struct Substitutions {
    raw: HashMap<PhilPath, Vec<Word>>,
    resolved: HashMap<PhilPath, Vec<Word>>,
    in_progress: Vec<PhilPath>,
}

impl Substitutions {
    pub(crate) fn build(tree: &Scope) -> Self {
        let mut raw = HashMap::new();
        collect(tree, &PhilPath::root(), &mut raw);
        Self {
            raw,
            resolved: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Substitutes every reference in `words`.
    ///
    /// Returns `None` when nothing needed substitution. An unquoted word
    /// that is exactly one reference splices the referenced words in; a
    /// reference inside a quoted word or embedded in longer text is joined
    /// into a single quoted word.
    pub(crate) fn substitute_words(&mut self, words: &[Word]) -> Result<Option<Vec<Word>>> {
        let mut out = Vec::new();
        let mut changed = false;
        for word in words {
            if word.quote == Some('\'') {
                out.push(word.clone());
                continue;
            }
            let pieces = split(&word.value)
                .map_err(|message| PhilError::syntax(message, word.location.clone()))?;
            let Some(pieces) = pieces else {
                out.push(word.clone());
                continue;
            };
            changed = true;
            match pieces.as_slice() {
                [Piece::Variable(name)] if word.quote.is_none() => {
                    out.extend(self.resolve(name, word)?)
                }
                _ => {
                    let mut text = String::new();
                    for piece in &pieces {
                        match piece {
                            Piece::Text(t) => text.push_str(t),
                            Piece::Variable(name) => {
                                let resolved = self.resolve(name, word)?;
                                let joined = resolved
                                    .iter()
                                    .map(|w| w.value.clone())
                                    .collect::<Vec<_>>()
                                    .join(" ");
                                text.push_str(&joined);
                            }
                        }
                    }
                    out.push(Word::quoted(&text, '"').at(word.location.clone()));
                }
            }
        }
        Ok(if changed { Some(out) } else { None })
    }

    fn resolve(&mut self, name: &str, at: &Word) -> Result<Vec<Word>> {
        let path = PhilPath::new(name);
        if let Some(words) = self.resolved.get(&path) {
            return Ok(words.clone());
        }
        if self.in_progress.contains(&path) {
            return Err(PhilError::syntax(
                format!("circular reference to ${name}"),
                at.location.clone(),
            ));
        }
        if let Some(raw) = self.raw.get(&path).cloned() {
            self.in_progress.push(path.clone());
            let outcome = self.substitute_words(&raw);
            self.in_progress.pop();
            let words = match outcome? {
                Some(words) => words,
                None => raw,
            };
            self.resolved.insert(path, words.clone());
            return Ok(words);
        }
        if let Ok(value) = std::env::var(name) {
            return Ok(vec![Word::quoted(&value, '"').at(at.location.clone())]);
        }
        Err(PhilError::syntax(
            format!("undefined variable ${name}"),
            at.location.clone(),
        ))
    }
}

fn collect(scope: &Scope, path: &PhilPath, out: &mut HashMap<PhilPath, Vec<Word>>) {
    for node in scope.active_objects() {
        match node {
            Node::Definition(def) => {
                out.entry(path.push(&def.name))
                    .or_insert_with(|| def.words.clone());
            }
            Node::Scope(sub) => collect(sub, &path.push(&sub.name), out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Definition, Scope};

    fn tree_with(name: &str, words: &[&str]) -> Scope {
        Scope::root().with(Node::Definition(Definition::new(
            name,
            "str",
            words.iter().map(|w| Word::unquoted(w)).collect(),
        )))
    }

    #[test]
    fn test_untouched_words_report_no_change() {
        let mut table = Substitutions::build(&Scope::root());
        let out = table
            .substitute_words(&[Word::unquoted("plain")])
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_pure_reference_splices_words() {
        let tree = tree_with("base", &["a", "b"]);
        let mut table = Substitutions::build(&tree);
        let out = table
            .substitute_words(&[Word::unquoted("$base")])
            .unwrap()
            .unwrap();
        let texts: Vec<_> = out.iter().map(|w| w.value.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_embedded_reference_joins_into_one_word() {
        let tree = tree_with("tag", &["v1"]);
        let mut table = Substitutions::build(&tree);
        let out = table
            .substitute_words(&[Word::unquoted("run_$(tag).log")])
            .unwrap()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "run_v1.log");
        assert_eq!(out[0].quote, Some('"'));
    }

    #[test]
    fn test_quoted_reference_joins_words() {
        let tree = tree_with("base", &["a", "b"]);
        let mut table = Substitutions::build(&tree);
        let out = table
            .substitute_words(&[Word::quoted("$base", '"')])
            .unwrap()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "a b");
    }

    #[test]
    fn test_bare_reference_stops_at_dot() {
        let tree = tree_with("stem", &["model"]);
        let mut table = Substitutions::build(&tree);
        let out = table
            .substitute_words(&[Word::unquoted("$stem.log")])
            .unwrap()
            .unwrap();
        assert_eq!(out[0].value, "model.log");
    }

    #[test]
    fn test_improper_variable_name_is_an_error() {
        let mut table = Substitutions::build(&Scope::root());
        let err = table.substitute_words(&[Word::unquoted("$(run..x)")]).unwrap_err();
        assert!(err.to_string().contains("improper variable name"));
        let err = table.substitute_words(&[Word::unquoted("a$%")]).unwrap_err();
        assert!(err.to_string().contains("identifier"));
    }

    #[test]
    fn test_escaped_dollar_is_literal() {
        let mut table = Substitutions::build(&Scope::root());
        let out = table
            .substitute_words(&[Word::quoted("\\$base", '"')])
            .unwrap()
            .unwrap();
        assert_eq!(out[0].value, "$base");
    }

    #[test]
    fn test_single_quotes_suppress_substitution() {
        let mut table = Substitutions::build(&Scope::root());
        let out = table
            .substitute_words(&[Word::quoted("$base", '\'')])
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_environment_fallback() {
        let mut table = Substitutions::build(&Scope::root());
        let out = table
            .substitute_words(&[Word::unquoted("$PATH")])
            .unwrap()
            .unwrap();
        assert_eq!(out[0].value, std::env::var("PATH").unwrap());
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let mut table = Substitutions::build(&Scope::root());
        let err = table
            .substitute_words(&[Word::unquoted("$no_such_phil_variable")])
            .unwrap_err();
        assert!(err.to_string().contains("undefined variable"));
    }

    #[test]
    fn test_circular_reference_is_an_error() {
        let tree = Scope::root()
            .with(Node::Definition(Definition::new(
                "a",
                "str",
                vec![Word::unquoted("$b")],
            )))
            .with(Node::Definition(Definition::new(
                "b",
                "str",
                vec![Word::unquoted("$a")],
            )));
        let mut table = Substitutions::build(&tree);
        let err = table
            .substitute_words(&[Word::unquoted("$a")])
            .unwrap_err();
        assert!(err.to_string().contains("circular reference"));
    }
}
