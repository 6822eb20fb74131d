//! Diff extraction: the minimal tree of non-default values.
//!
//! A diff walks a merged tree against its master and keeps only the
//! parameters whose values differ from the master defaults, preserving the
//! enclosing scope structure and master declaration order. Formatting the
//! diff and fetching it back over the same master reproduces the merged
//! tree.

use crate::registry::TypeRegistry;
use crate::types::{Definition, Node, Scope};
use crate::value::{PhilValue, values_eq};

/// Extracts the minimal non-default tree from `merged`, relative to
/// `master`.
///
/// Comparison is value-level, so `1.0` against a default of `1` does not
/// show up in the diff. Scopes with no differing descendants are pruned.
///
/// # Examples
///
/// ```
/// use phil_core::{diff, fetch, Definition, FetchOptions, Node, Scope, TypeRegistry, Word};
///
/// let master = Scope::root()
///     .with(Node::Definition(Definition::new("a", "int", vec![Word::unquoted("1")])))
///     .with(Node::Definition(Definition::new("b", "int", vec![Word::unquoted("2")])));
/// let working = Scope::root()
///     .with(Node::Definition(Definition::new("b", "int", vec![Word::unquoted("5")])));
///
/// let registry = TypeRegistry::with_builtins();
/// let merged = fetch(&master, &[&working], &registry, &FetchOptions::default())
///     .unwrap()
///     .merged;
/// let changes = diff(&master, &merged, &registry);
/// assert!(changes.get("a").next().is_none());
/// assert!(changes.get("b").next().is_some());
/// ```
pub fn diff(master: &Scope, merged: &Scope, registry: &TypeRegistry) -> Scope {
    let mut out = master.clone();
    out.objects.clear();

    for node in master.template_objects() {
        match node {
            Node::Definition(def) if !def.multiple => {
                if let Some(current) = merged
                    .active_objects()
                    .filter_map(|n| n.as_definition())
                    .find(|d| d.name == def.name)
                {
                    if differs(current, def, registry) {
                        out.adopt(Node::Definition(current.clone()));
                    }
                }
            }
            Node::Definition(template) => {
                for current in merged
                    .active_objects()
                    .filter_map(|n| n.as_definition())
                    .filter(|d| d.name == template.name)
                {
                    if differs(current, template, registry) {
                        out.adopt(Node::Definition(current.clone()));
                    }
                }
            }
            Node::Scope(sub) if !sub.multiple => {
                if let Some(current) = merged
                    .active_objects()
                    .filter_map(|n| n.as_scope())
                    .find(|s| s.name == sub.name)
                {
                    let changes = diff(sub, current, registry);
                    if !changes.is_empty() {
                        out.adopt(Node::Scope(changes));
                    }
                }
            }
            Node::Scope(template) => {
                for current in merged
                    .active_objects()
                    .filter_map(|n| n.as_scope())
                    .filter(|s| s.name == template.name)
                {
                    let changes = diff(template, current, registry);
                    if !changes.is_empty() {
                        out.adopt(Node::Scope(changes));
                    }
                }
            }
        }
    }
    out
}

/// A fetched definition carries its defaults, already variable-resolved, so
/// they beat re-parsing the master's raw words. Plain parsed trees fall
/// back to the raw comparison.
fn differs(current: &Definition, master: &Definition, registry: &TypeRegistry) -> bool {
    match &current.defaults {
        Some(_) => current.is_overridden(),
        None => !values_eq(&values_of(current, registry), &values_of(master, registry)),
    }
}

/// The definition's typed values, parsing the raw words when fetch has not
/// filled them in yet.
fn values_of(def: &Definition, registry: &TypeRegistry) -> Vec<PhilValue> {
    if !def.values.is_empty() {
        return def.values.clone();
    }
    registry
        .resolve(&def.type_name)
        .and_then(|handler| handler.parse(&def.words).ok())
        .unwrap_or_else(|| {
            def.words
                .iter()
                .map(|w| PhilValue::String(w.value.clone()))
                .collect()
        })
}
