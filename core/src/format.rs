//! Rendering scope trees back to phil source text.
//!
//! The printer emits text the parser accepts, so format and re-parse is a
//! lossless round trip for values. Attribute lines (`.help`, `.type`, ...)
//! are emitted according to [`FormatOptions::attributes_level`], and nodes
//! above [`FormatOptions::expert_level`] are suppressed.

use std::fmt::Write as _;

use crate::types::{Definition, Node, Scope, Word};

/// Controls for [`as_str`].
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// 0 = values only, 1 = add `.help`, 2 = add non-default attributes,
    /// 3 = add every attribute.
    pub attributes_level: u32,
    /// Hide nodes whose declared expert level exceeds this; `None` shows
    /// everything.
    pub expert_level: Option<u32>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            attributes_level: 0,
            expert_level: None,
        }
    }
}

impl FormatOptions {
    fn shows(&self, declared: Option<u32>) -> bool {
        match (self.expert_level, declared) {
            (Some(limit), Some(level)) => level <= limit,
            _ => true,
        }
    }
}

/// Renders a tree as phil source text.
///
/// The root scope's own name is not printed; its children appear at column
/// zero and nesting indents by two spaces.
///
/// # Examples
///
/// ```
/// use phil_core::{as_str, Definition, FormatOptions, Node, Scope, Word};
///
/// let tree = Scope::root().with(Node::Scope(Scope::new("run").with(Node::Definition(
///     Definition::new("cycles", "int", vec![Word::unquoted("3")]),
/// ))));
/// assert_eq!(as_str(&tree, &FormatOptions::default()), "run {\n  cycles = 3\n}\n");
/// ```
pub fn as_str(tree: &Scope, options: &FormatOptions) -> String {
    let mut out = String::new();
    for node in tree.active_objects() {
        write_node(&mut out, node, 0, options);
    }
    out
}

fn write_node(out: &mut String, node: &Node, depth: usize, options: &FormatOptions) {
    match node {
        Node::Definition(def) => write_definition(out, def, depth, options),
        Node::Scope(scope) => write_scope(out, scope, depth, options),
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_scope(out: &mut String, scope: &Scope, depth: usize, options: &FormatOptions) {
    if !options.shows(scope.expert_level) {
        return;
    }
    indent(out, depth);
    let _ = writeln!(out, "{} {{", scope.name);
    write_scope_attributes(out, scope, depth + 1, options);
    for node in scope.active_objects() {
        write_node(out, node, depth + 1, options);
    }
    indent(out, depth);
    out.push_str("}\n");
}

fn write_definition(out: &mut String, def: &Definition, depth: usize, options: &FormatOptions) {
    if !options.shows(def.expert_level) {
        return;
    }
    indent(out, depth);
    let _ = writeln!(out, "{} = {}", def.name, words_text(&def.words));
    write_definition_attributes(out, def, depth + 1, options);
}

fn words_text(words: &[Word]) -> String {
    if words.is_empty() {
        return "None".to_string();
    }
    words
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_attribute(out: &mut String, depth: usize, name: &str, value: &str) {
    indent(out, depth);
    let _ = writeln!(out, ".{name} = {value}");
}

fn quote_help(text: &str) -> String {
    Word::quoted(text, '"').to_string()
}

fn write_scope_attributes(out: &mut String, scope: &Scope, depth: usize, options: &FormatOptions) {
    let level = options.attributes_level;
    if level >= 1 {
        if let Some(help) = &scope.help {
            write_attribute(out, depth, "help", &quote_help(help));
        }
    }
    if level >= 2 {
        if let Some(caption) = &scope.caption {
            write_attribute(out, depth, "caption", &quote_help(caption));
        }
        if let Some(style) = &scope.style {
            write_attribute(out, depth, "style", style);
        }
        if let Some(expert) = scope.expert_level {
            write_attribute(out, depth, "expert_level", &expert.to_string());
        }
        if scope.multiple {
            write_attribute(out, depth, "multiple", "True");
        }
    }
    if level >= 3 {
        if !scope.multiple {
            write_attribute(out, depth, "multiple", "False");
        }
        write_attribute(out, depth, "optional", if scope.optional { "True" } else { "False" });
    }
}

fn write_definition_attributes(
    out: &mut String,
    def: &Definition,
    depth: usize,
    options: &FormatOptions,
) {
    let level = options.attributes_level;
    if level >= 1 {
        if let Some(help) = &def.help {
            write_attribute(out, depth, "help", &quote_help(help));
        }
    }
    if level >= 2 {
        if !def.type_name.is_empty() {
            write_attribute(out, depth, "type", &def.type_name);
        }
        if let Some(caption) = &def.caption {
            write_attribute(out, depth, "caption", &quote_help(caption));
        }
        if let Some(style) = &def.style {
            write_attribute(out, depth, "style", style);
        }
        if let Some(expert) = def.expert_level {
            write_attribute(out, depth, "expert_level", &expert.to_string());
        }
        if def.multiple {
            write_attribute(out, depth, "multiple", "True");
        }
        if def.deprecated {
            write_attribute(out, depth, "deprecated", "True");
        }
    }
    if level >= 3 {
        if !def.multiple {
            write_attribute(out, depth, "multiple", "False");
        }
        write_attribute(out, depth, "optional", if def.optional { "True" } else { "False" });
    }
}

/// Finds any node, scope or definition, by full dotted path.
///
/// Returns the first enabled match in declaration order, or `None` when the
/// path names nothing. [`find_scope`] is the scope-only variant; use
/// [`Scope::get`] to iterate every match of a repeated name.
///
/// # Examples
///
/// ```
/// use phil_core::{find_object, Definition, Node, Scope, Word};
///
/// let tree = Scope::root().with(Node::Scope(Scope::new("run").with(Node::Definition(
///     Definition::new("cycles", "int", vec![Word::unquoted("3")]),
/// ))));
/// assert!(find_object(&tree, "run.cycles").unwrap().is_definition());
/// assert!(find_object(&tree, "run").unwrap().is_scope());
/// assert!(find_object(&tree, "run.missing").is_none());
/// ```
pub fn find_object<'a>(tree: &'a Scope, path: &str) -> Option<&'a Node> {
    match path.split_once('.') {
        None => tree.active_objects().find(|n| n.name() == path),
        Some((head, rest)) => tree
            .active_objects()
            .filter_map(|n| n.as_scope())
            .filter(|s| s.name == head)
            .find_map(|s| find_object(s, rest)),
    }
}

/// Finds a scope by full dotted path, depth first.
///
/// Only scope nodes match; the root matches the empty path.
pub fn find_scope<'a>(tree: &'a Scope, path: &str) -> Option<&'a Scope> {
    if path.is_empty() {
        return Some(tree);
    }
    match path.split_once('.') {
        None => tree
            .active_objects()
            .filter_map(|n| n.as_scope())
            .find(|s| s.name == path),
        Some((head, rest)) => tree
            .active_objects()
            .filter_map(|n| n.as_scope())
            .filter(|s| s.name == head)
            .find_map(|s| find_scope(s, rest)),
    }
}
