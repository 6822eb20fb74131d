//! The extract/inject bridge between scope trees and plain typed data.
//!
//! [`extract`] lowers a merged tree into a nested structure of typed values
//! that application code can read without touching words or scopes. Every
//! leaf carries the full path it came from, so values passed around a
//! program can always be traced back to their parameter. [`inject`] is the
//! reverse: it writes a (possibly modified) extract back over a tree,
//! re-validating every value against the target's declared types.

use serde::{Deserialize, Serialize};

use crate::error::{PhilError, Result};
use crate::path::PhilPath;
use crate::registry::TypeRegistry;
use crate::types::{Definition, Node, Scope};
use crate::value::PhilValue;

/// A leaf parameter lifted out of a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractLeaf {
    /// Full path of the originating definition.
    pub path: PhilPath,
    /// Typed values; empty means the parameter is unset.
    pub values: Vec<PhilValue>,
}

impl ExtractLeaf {
    /// Returns `true` when the parameter has a value.
    pub fn is_set(&self) -> bool {
        !self.values.is_empty()
    }

    /// The single value, when there is exactly one.
    pub fn single(&self) -> Option<&PhilValue> {
        match self.values.as_slice() {
            [value] => Some(value),
            _ => None,
        }
    }
}

/// One entry of an [`ExtractScope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractValue {
    /// A nested single scope.
    Scope(ExtractScope),
    /// All instances of a repeatable scope, in tree order.
    Scopes(Vec<ExtractScope>),
    /// A single definition.
    Leaf(ExtractLeaf),
    /// All instances of a repeatable definition, in tree order.
    Leaves(Vec<ExtractLeaf>),
}

/// A scope lifted out of a tree: named entries in declaration order.
///
/// # Examples
///
/// ```
/// use phil_core::{extract, Definition, ExtractValue, Node, PhilValue, Scope, Word};
///
/// let tree = Scope::root().with(Node::Scope(Scope::new("run").with(Node::Definition(
///     Definition::new("cycles", "int", vec![Word::unquoted("3")])
///         .with_values(vec![PhilValue::Int(3)]),
/// ))));
///
/// let data = extract(&tree);
/// let Some(ExtractValue::Leaf(leaf)) = data.lookup("run.cycles") else {
///     panic!("missing leaf");
/// };
/// assert_eq!(leaf.path.as_str(), "run.cycles");
/// assert_eq!(leaf.values, vec![PhilValue::Int(3)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractScope {
    /// Full path of the originating scope; empty at the root.
    pub path: PhilPath,
    /// Named children, tree order, one entry per distinct name.
    pub entries: Vec<(String, ExtractValue)>,
}

impl ExtractScope {
    /// Looks up a direct child by name.
    pub fn get(&self, name: &str) -> Option<&ExtractValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Looks up a descendant by dotted path, following single scopes.
    pub fn lookup(&self, path: &str) -> Option<&ExtractValue> {
        match path.split_once('.') {
            None => self.get(path),
            Some((head, rest)) => match self.get(head)? {
                ExtractValue::Scope(scope) => scope.lookup(rest),
                _ => None,
            },
        }
    }

    /// Replaces the entry named `name`, or appends a new one.
    pub fn set(&mut self, name: &str, value: ExtractValue) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Shorthand for overwriting a single leaf's values.
    pub fn set_values(&mut self, name: &str, values: Vec<PhilValue>) {
        let path = self.path.push(name);
        self.set(name, ExtractValue::Leaf(ExtractLeaf { path, values }));
    }
}

/// Lowers a tree into typed data with per-leaf path provenance.
///
/// Repeatable names collapse into one `Scopes`/`Leaves` entry holding every
/// instance.
pub fn extract(tree: &Scope) -> ExtractScope {
    extract_at(tree, &PhilPath::root())
}

fn extract_at(tree: &Scope, path: &PhilPath) -> ExtractScope {
    let mut out = ExtractScope {
        path: path.clone(),
        entries: Vec::new(),
    };
    for node in tree.active_objects() {
        let child_path = path.push(node.name());
        match node {
            Node::Definition(def) => {
                let leaf = ExtractLeaf {
                    path: child_path,
                    values: def.values.clone(),
                };
                if def.multiple {
                    match out.entries.iter_mut().find(|(n, _)| n == &def.name) {
                        Some((_, ExtractValue::Leaves(list))) => list.push(leaf),
                        Some(_) => {}
                        None => out
                            .entries
                            .push((def.name.clone(), ExtractValue::Leaves(vec![leaf]))),
                    }
                } else {
                    out.entries
                        .push((def.name.clone(), ExtractValue::Leaf(leaf)));
                }
            }
            Node::Scope(sub) => {
                let scope = extract_at(sub, &child_path);
                if sub.multiple {
                    match out.entries.iter_mut().find(|(n, _)| n == &sub.name) {
                        Some((_, ExtractValue::Scopes(list))) => list.push(scope),
                        Some(_) => {}
                        None => out
                            .entries
                            .push((sub.name.clone(), ExtractValue::Scopes(vec![scope]))),
                    }
                } else {
                    out.entries
                        .push((sub.name.clone(), ExtractValue::Scope(scope)));
                }
            }
        }
    }
    out
}

/// Writes an extract back over `target`, re-validating every value.
///
/// Each leaf's values are rendered through the target definition's type
/// handler and parsed back, so a value that no longer satisfies the
/// declared type is rejected with a type error at the leaf's path. Entries
/// naming paths the target no longer has fail with a path error. Target
/// parameters the extract does not mention keep their current values.
pub fn inject(data: &ExtractScope, target: &Scope, registry: &TypeRegistry) -> Result<Scope> {
    let mut out = target.clone();
    out.objects.clear();

    for node in target.template_objects() {
        match node {
            Node::Definition(def) => match data.get(&def.name) {
                None => {
                    for instance in target
                        .active_objects()
                        .filter_map(|n| n.as_definition())
                        .filter(|d| d.name == def.name)
                    {
                        out.adopt(Node::Definition(instance.clone()));
                    }
                }
                Some(ExtractValue::Leaf(leaf)) => {
                    out.adopt(Node::Definition(inject_leaf(def, leaf, registry)?));
                }
                Some(ExtractValue::Leaves(leaves)) => {
                    for leaf in leaves {
                        out.adopt(Node::Definition(inject_leaf(def, leaf, registry)?));
                    }
                }
                Some(_) => {
                    return Err(PhilError::Path {
                        path: data.path.push(&def.name),
                    });
                }
            },
            Node::Scope(sub) => match data.get(&sub.name) {
                None => {
                    for instance in target
                        .active_objects()
                        .filter_map(|n| n.as_scope())
                        .filter(|s| s.name == sub.name)
                    {
                        out.adopt(Node::Scope(instance.clone()));
                    }
                }
                Some(ExtractValue::Scope(scope)) => {
                    out.adopt(Node::Scope(inject(scope, sub, registry)?));
                }
                Some(ExtractValue::Scopes(scopes)) => {
                    for scope in scopes {
                        out.adopt(Node::Scope(inject(scope, sub, registry)?));
                    }
                }
                Some(_) => {
                    return Err(PhilError::Path {
                        path: data.path.push(&sub.name),
                    });
                }
            },
        }
    }

    for (name, _) in &data.entries {
        if !target.template_objects().any(|node| node.name() == name) {
            return Err(PhilError::Path {
                path: data.path.push(name),
            });
        }
    }
    Ok(out)
}

fn inject_leaf(
    target: &Definition,
    leaf: &ExtractLeaf,
    registry: &TypeRegistry,
) -> Result<Definition> {
    let mut def = target.clone();
    match registry.resolve(&target.type_name) {
        Some(handler) => {
            let words = handler
                .format(&target.words, &leaf.values)
                .map_err(|e| e.with_path(leaf.path.clone()))?;
            def.values = handler
                .parse(&words)
                .map_err(|e| e.with_path(leaf.path.clone()))?;
            def.words = words;
        }
        None => {
            def.words = leaf
                .values
                .iter()
                .map(|v| crate::Word::unquoted(&v.as_word_text()))
                .collect();
            def.values = leaf.values.clone();
        }
    }
    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Word;

    fn def(name: &str, type_name: &str, words: &[&str]) -> Definition {
        let d = Definition::new(
            name,
            type_name,
            words.iter().map(|w| Word::unquoted(w)).collect(),
        );
        let registry = TypeRegistry::with_builtins();
        let values = registry
            .resolve(type_name)
            .unwrap()
            .parse(&d.words)
            .unwrap();
        d.with_values(values)
    }

    fn sample() -> Scope {
        Scope::root().with(Node::Scope(
            Scope::new("run")
                .with(Node::Definition(def("cycles", "int", &["3"])))
                .with(Node::Definition(def("label", "str", &["base"]))),
        ))
    }

    #[test]
    fn test_extract_carries_path_provenance() {
        let data = extract(&sample());
        let Some(ExtractValue::Leaf(leaf)) = data.lookup("run.label") else {
            panic!("missing run.label");
        };
        assert_eq!(leaf.path, PhilPath::new("run.label"));
        assert_eq!(leaf.values, vec![PhilValue::String("base".to_string())]);
    }

    #[test]
    fn test_inject_roundtrip_preserves_values() {
        let registry = TypeRegistry::with_builtins();
        let tree = sample();
        let data = extract(&tree);
        let back = inject(&data, &tree, &registry).unwrap();
        assert_eq!(extract(&back), data);
    }

    #[test]
    fn test_inject_applies_modified_values() {
        let registry = TypeRegistry::with_builtins();
        let tree = sample();
        let mut data = extract(&tree);
        let Some((_, ExtractValue::Scope(run))) =
            data.entries.iter_mut().find(|(n, _)| n == "run")
        else {
            panic!("missing run scope");
        };
        run.set_values("cycles", vec![PhilValue::Int(10)]);

        let back = inject(&data, &tree, &registry).unwrap();
        let cycles = back
            .get("run.cycles")
            .next()
            .unwrap()
            .as_definition()
            .unwrap()
            .clone();
        assert_eq!(cycles.values, vec![PhilValue::Int(10)]);
        assert_eq!(cycles.words[0].value, "10");
    }

    #[test]
    fn test_inject_rejects_vanished_paths() {
        let registry = TypeRegistry::with_builtins();
        let tree = sample();
        let mut data = extract(&tree);
        data.set_values("ghost", vec![PhilValue::Int(1)]);
        let err = inject(&data, &tree, &registry).unwrap_err();
        assert!(matches!(err, PhilError::Path { path } if path.as_str() == "ghost"));
    }

    #[test]
    fn test_inject_revalidates_against_declared_type() {
        let registry = TypeRegistry::with_builtins();
        let tree = Scope::root().with(Node::Definition(def(
            "gain",
            "choice",
            &["*auto", "manual"],
        )));
        let mut data = extract(&tree);
        data.set_values("gain", vec![PhilValue::String("bogus".to_string())]);
        let err = inject(&data, &tree, &registry).unwrap_err();
        assert!(matches!(err, PhilError::Type { path, .. } if path.as_str() == "gain"));
    }

    #[test]
    fn test_extract_groups_multiple_instances() {
        let mut a = Scope::new("block");
        a.multiple = true;
        a.adopt(Node::Definition(def("id", "int", &["1"])));
        let mut b = Scope::new("block");
        b.multiple = true;
        b.adopt(Node::Definition(def("id", "int", &["2"])));
        let tree = Scope::root().with(Node::Scope(a)).with(Node::Scope(b));

        let data = extract(&tree);
        let Some(ExtractValue::Scopes(blocks)) = data.get("block") else {
            panic!("missing block instances");
        };
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].path, PhilPath::new("block"));
    }
}
