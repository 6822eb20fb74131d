//! The fetch engine: merging working documents over a master tree.
//!
//! A fetch walks the master in declaration order and, for every scope and
//! definition, looks up matching objects in the working documents. Working
//! values replace master defaults; later working documents take precedence
//! over earlier ones. The master is the single source of structure: working
//! objects with no master counterpart are reported as unrecognized, never
//! merged. After the merge, `$variable` references in the merged values are
//! resolved against the tree and the process environment.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{Diagnostic, PhilError, Result};
use crate::path::PhilPath;
use crate::registry::TypeRegistry;
use crate::substitute::Substitutions;
use crate::types::{Definition, Node, Scope};
use crate::value::PhilValue;

/// Knobs for a fetch pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Fail fast on the first problem instead of collecting diagnostics.
    pub strict: bool,
    /// Report unrecognized working paths as warnings instead of errors.
    pub tolerate_unrecognized: bool,
}

/// The outcome of a fetch pass.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The merged tree, structured exactly like the master.
    pub merged: Scope,
    /// Working-document paths with no master counterpart, in encounter
    /// order.
    pub unrecognized: Vec<PhilPath>,
    /// Collected problems, including one error per unrecognized path.
    pub diagnostics: Vec<Diagnostic>,
}

impl FetchResult {
    /// Returns `true` when no error-severity diagnostics were collected.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.iter().all(|d| !d.is_error())
    }
}

/// Merges `sources` over `master`.
///
/// In strict mode the first problem is returned as an error; otherwise all
/// problems are collected into [`FetchResult::diagnostics`] and the
/// offending parameters keep their master defaults.
///
/// # Examples
///
/// ```
/// use phil_core::{fetch, Definition, FetchOptions, Node, PhilValue, Scope, TypeRegistry, Word};
///
/// let master = Scope::root().with(Node::Definition(Definition::new(
///     "cycles",
///     "int",
///     vec![Word::unquoted("3")],
/// )));
/// let working = Scope::root().with(Node::Definition(Definition::new(
///     "cycles",
///     "int",
///     vec![Word::unquoted("8")],
/// )));
///
/// let registry = TypeRegistry::with_builtins();
/// let result = fetch(&master, &[&working], &registry, &FetchOptions::default()).unwrap();
/// let def = result.merged.get("cycles").next().unwrap().as_definition().unwrap().clone();
/// assert_eq!(def.values, vec![PhilValue::Int(8)]);
/// assert!(def.is_overridden());
/// ```
pub fn fetch(
    master: &Scope,
    sources: &[&Scope],
    registry: &TypeRegistry,
    options: &FetchOptions,
) -> Result<FetchResult> {
    let mut pass = FetchPass {
        registry,
        strict: options.strict,
        tolerate_unrecognized: options.tolerate_unrecognized,
        diagnostics: Vec::new(),
    };
    let mut merged = pass.fetch_scope(master, sources, &PhilPath::root())?;
    pass.resolve_variables(&mut merged)?;
    let unrecognized = pass.report_unrecognized(master, sources)?;
    debug!(
        diagnostics = pass.diagnostics.len(),
        unrecognized = unrecognized.len(),
        "fetch complete"
    );
    Ok(FetchResult {
        merged,
        unrecognized,
        diagnostics: pass.diagnostics,
    })
}

struct FetchPass<'a> {
    registry: &'a TypeRegistry,
    strict: bool,
    tolerate_unrecognized: bool,
    diagnostics: Vec<Diagnostic>,
}

impl FetchPass<'_> {
    /// Records a problem, or raises it immediately in strict mode.
    fn problem(&mut self, error: PhilError) -> Result<()> {
        if self.strict {
            return Err(error);
        }
        warn!(%error, "fetch problem collected");
        self.diagnostics.push(Diagnostic::from_error(&error));
        Ok(())
    }

    fn fetch_scope(
        &mut self,
        master: &Scope,
        sources: &[&Scope],
        path: &PhilPath,
    ) -> Result<Scope> {
        let mut merged = master.clone();
        merged.objects.clear();

        let mut seen_single: HashSet<&str> = HashSet::new();
        for node in master.template_objects() {
            let child_path = path.push(node.name());
            if !node.multiple() && !seen_single.insert(node.name()) {
                self.problem(PhilError::Multiplicity {
                    path: child_path,
                    message: "master repeats this name without declaring .multiple".to_string(),
                    location: node.location().clone(),
                })?;
                continue;
            }
            match node {
                Node::Definition(def) if !def.multiple => {
                    let matches = definition_matches(sources, &def.name);
                    let fetched = self.fetch_definition(def, &matches, &child_path)?;
                    merged.adopt(Node::Definition(fetched));
                }
                Node::Definition(def) => {
                    for instance in
                        self.fetch_multiple_definitions(master, def, sources, &child_path)?
                    {
                        merged.adopt(Node::Definition(instance));
                    }
                }
                Node::Scope(sub) if !sub.multiple => {
                    let child_sources = scope_matches(sources, &sub.name);
                    let fetched = self.fetch_scope(sub, &child_sources, &child_path)?;
                    merged.adopt(Node::Scope(fetched));
                }
                Node::Scope(sub) => {
                    for instance in self.fetch_multiple_scopes(master, sub, sources, &child_path)? {
                        merged.adopt(Node::Scope(instance));
                    }
                }
            }
        }
        Ok(merged)
    }

    /// Merges all working matches for a single-cardinality definition, in
    /// order, so the last working document wins.
    fn fetch_definition(
        &mut self,
        master: &Definition,
        matches: &[&Definition],
        path: &PhilPath,
    ) -> Result<Definition> {
        let mut merged = master.clone();
        merged.defaults = None;

        if master.deprecated && !matches.is_empty() {
            self.diagnostics.push(Diagnostic::deprecated(path.clone()));
        }

        let defaults = match self.parse_words(&master.type_name, &master.words) {
            Ok(values) => values,
            Err(error) => {
                self.problem(error.with_path(path.clone()))?;
                Vec::new()
            }
        };

        for source in matches {
            let outcome = if source.append {
                let mut extended = merged.words.clone();
                extended.extend(source.words.iter().cloned());
                self.parse_words(&master.type_name, &extended)
                    .map(|_| extended)
            } else {
                self.fetch_words(&master.type_name, &merged.words, &source.words)
            };
            match outcome {
                Ok(words) => merged.words = words,
                Err(error) => {
                    self.problem(error.with_path(path.clone()))?;
                }
            }
        }

        match self.parse_words(&master.type_name, &merged.words) {
            Ok(values) => merged.values = values,
            Err(error) => {
                self.problem(error.with_path(path.clone()))?;
                merged.words = master.words.clone();
                merged.values = defaults.clone();
            }
        }
        if !merged.optional && merged.values.is_empty() {
            self.problem(PhilError::Multiplicity {
                path: path.clone(),
                message: "required parameter is unset".to_string(),
                location: merged.location.clone(),
            })?;
        }
        merged.defaults = Some(defaults);
        Ok(merged)
    }

    /// Gathers instances of a repeatable definition from the working
    /// documents, validating each against the master template. Identical
    /// instances are collapsed; with no working instances the master's own
    /// are kept.
    fn fetch_multiple_definitions(
        &mut self,
        master_parent: &Scope,
        template: &Definition,
        sources: &[&Scope],
        path: &PhilPath,
    ) -> Result<Vec<Definition>> {
        let working = definition_matches(sources, &template.name);
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        if working.is_empty() {
            for node in master_parent.active_objects() {
                if let Node::Definition(def) = node {
                    if def.name != template.name {
                        continue;
                    }
                    let fetched = self.fetch_definition(template, &[def], path)?;
                    if seen.insert(definition_signature(&fetched)) {
                        out.push(fetched);
                    }
                }
            }
        } else {
            for source in working {
                let fetched = self.fetch_definition(template, &[source], path)?;
                if seen.insert(definition_signature(&fetched)) {
                    out.push(fetched);
                }
            }
        }

        if out.is_empty() && !template.optional {
            self.problem(PhilError::Multiplicity {
                path: path.clone(),
                message: "at least one value is required".to_string(),
                location: template.location.clone(),
            })?;
        }
        Ok(out)
    }

    /// Same as [`Self::fetch_multiple_definitions`], for repeatable scopes.
    fn fetch_multiple_scopes(
        &mut self,
        master_parent: &Scope,
        template: &Scope,
        sources: &[&Scope],
        path: &PhilPath,
    ) -> Result<Vec<Scope>> {
        let working = scope_matches(sources, &template.name);
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        if working.is_empty() {
            for node in master_parent.active_objects() {
                if let Node::Scope(instance) = node {
                    if instance.name != template.name {
                        continue;
                    }
                    let fetched = self.fetch_scope(template, &[instance], path)?;
                    if seen.insert(scope_signature(&fetched)) {
                        out.push(fetched);
                    }
                }
            }
        } else {
            for instance in working {
                let fetched = self.fetch_scope(template, &[instance], path)?;
                if seen.insert(scope_signature(&fetched)) {
                    out.push(fetched);
                }
            }
        }

        if out.is_empty() && !template.optional {
            self.problem(PhilError::Multiplicity {
                path: path.clone(),
                message: "at least one block is required".to_string(),
                location: template.location.clone(),
            })?;
        }
        Ok(out)
    }

    fn parse_words(
        &self,
        type_name: &str,
        words: &[crate::Word],
    ) -> Result<Vec<PhilValue>> {
        match self.registry.resolve(type_name) {
            Some(handler) => handler.parse(words),
            // Unknown types pass words through as opaque strings; the
            // parser already warned about the name.
            None => Ok(words
                .iter()
                .map(|w| PhilValue::String(w.value.clone()))
                .collect()),
        }
    }

    fn fetch_words(
        &self,
        type_name: &str,
        master_words: &[crate::Word],
        source_words: &[crate::Word],
    ) -> Result<Vec<crate::Word>> {
        match self.registry.resolve(type_name) {
            Some(handler) => handler.fetch(master_words, source_words),
            None => Ok(source_words.to_vec()),
        }
    }

    /// Resolves `$variable` references throughout the merged tree.
    ///
    /// Substituted words are re-parsed with the definition's type; when a
    /// parameter was untouched by the merge its captured defaults follow
    /// the substitution so it still reads as non-overridden.
    fn resolve_variables(&mut self, root: &mut Scope) -> Result<()> {
        let mut table = Substitutions::build(root);
        self.apply_substitutions(root, &PhilPath::root(), &mut table)
    }

    fn apply_substitutions(
        &mut self,
        scope: &mut Scope,
        path: &PhilPath,
        table: &mut Substitutions,
    ) -> Result<()> {
        for node in scope.objects.iter_mut() {
            match node {
                Node::Definition(def) if !def.disabled => {
                    let child_path = path.push(&def.name);
                    match table.substitute_words(&def.words) {
                        Ok(Some(words)) => {
                            let untouched = !def.is_overridden();
                            def.words = words;
                            match self.parse_words(&def.type_name, &def.words) {
                                Ok(values) => {
                                    def.values = values;
                                    if untouched {
                                        def.defaults = Some(def.values.clone());
                                    }
                                }
                                Err(error) => self.problem(error.with_path(child_path))?,
                            }
                        }
                        Ok(None) => {}
                        Err(error) => self.problem(error)?,
                    }
                }
                Node::Scope(sub) if !sub.disabled => {
                    let child_path = path.push(&sub.name);
                    self.apply_substitutions(sub, &child_path, table)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Reports every working-document definition path absent from the
    /// master.
    fn report_unrecognized(
        &mut self,
        master: &Scope,
        sources: &[&Scope],
    ) -> Result<Vec<PhilPath>> {
        let known: HashSet<PhilPath> = master.definition_paths().into_iter().collect();
        let mut unrecognized = Vec::new();
        let mut seen = HashSet::new();
        for source in sources {
            for path in source.definition_paths() {
                if !known.contains(&path) && seen.insert(path.clone()) {
                    let error = PhilError::Path { path: path.clone() };
                    if self.tolerate_unrecognized {
                        warn!(%error, "fetch problem tolerated");
                        self.diagnostics
                            .push(Diagnostic::warning(error.to_string()).at_path(path.clone()));
                    } else {
                        self.problem(error)?;
                    }
                    unrecognized.push(path);
                }
            }
        }
        Ok(unrecognized)
    }
}

fn definition_matches<'a>(sources: &[&'a Scope], name: &str) -> Vec<&'a Definition> {
    sources
        .iter()
        .flat_map(|scope| scope.active_objects())
        .filter_map(|node| node.as_definition())
        .filter(|def| def.name == name)
        .collect()
}

fn scope_matches<'a>(sources: &[&'a Scope], name: &str) -> Vec<&'a Scope> {
    sources
        .iter()
        .flat_map(|scope| scope.active_objects())
        .filter_map(|node| node.as_scope())
        .filter(|scope| scope.name == name)
        .collect()
}

fn definition_signature(def: &Definition) -> String {
    def.words
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn scope_signature(scope: &Scope) -> String {
    let mut out = String::new();
    for node in scope.active_objects() {
        match node {
            Node::Definition(def) => {
                out.push_str(&def.name);
                out.push('=');
                out.push_str(&definition_signature(def));
                out.push('\n');
            }
            Node::Scope(sub) => {
                out.push_str(&sub.name);
                out.push('{');
                out.push_str(&scope_signature(sub));
                out.push('}');
            }
        }
    }
    out
}
