//! One-call command-line processing: flags, overrides, files, merge.
//!
//! [`process_command_line`] is the front door applications use: hand it
//! the master tree and `std::env::args`, get back the merged tree, the
//! typed extract, and everything that could not be consumed.

use phil_core::{
    Diagnostic, ExtractScope, FetchOptions, PhilError, Scope, SourceLocation, TypeRegistry,
    extract, fetch,
};
use tracing::debug;

use crate::interpret::ArgumentInterpreter;

/// Presentation flags the processor consumes from the argument list.
///
/// `--show-defaults`, `--attributes-level=N`, and `--expert-level=N` are
/// recognized anywhere among the arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayFlags {
    /// Show all parameters instead of only the non-default ones.
    pub show_defaults: bool,
    /// Attribute verbosity for rendered output.
    pub attributes_level: u32,
    /// Expert-level cutoff for rendered output; `None` shows everything.
    pub expert_level: Option<u32>,
}

/// Everything a processed command line produced.
#[derive(Debug)]
pub struct ProcessResult {
    /// The fully merged tree.
    pub merged: Scope,
    /// Typed values with path provenance, lowered from `merged`.
    pub extracted: ExtractScope,
    /// Collected soft problems and merge-level errors.
    pub diagnostics: Vec<Diagnostic>,
    /// Arguments neither the processor nor the interpreter recognized.
    pub unconsumed: Vec<String>,
    /// Presentation flags consumed from the arguments.
    pub display: DisplayFlags,
}

impl ProcessResult {
    /// Returns `true` when no error-severity diagnostics were collected.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.iter().all(|d| !d.is_error())
    }
}

/// Knobs for [`process_command_line_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Fail fast on the first merge problem instead of collecting
    /// diagnostics.
    pub strict: bool,
}

/// Interprets `args` against `master` and merges everything it consumes.
///
/// Arguments are applied in order, later ones taking precedence, after
/// any working documents in files. Hard problems with the arguments
/// themselves (ambiguous or unknown override paths, unparsable files or
/// values, malformed flags) fail with the full list of errors; problems
/// found during the merge land in [`ProcessResult::diagnostics`]. Use
/// [`process_command_line_with`] to make merge problems fail too.
///
/// # Examples
///
/// ```
/// use phil_core::{Definition, Node, PhilValue, Scope, TypeRegistry, Word};
/// use phil_cli::process_command_line;
///
/// let master = Scope::root().with(Node::Scope(Scope::new("run").with(Node::Definition(
///     Definition::new("cycles", "int", vec![Word::unquoted("3")]),
/// ))));
/// let registry = TypeRegistry::with_builtins();
///
/// let args = vec!["cycles=8".to_string(), "--show-defaults".to_string()];
/// let result = process_command_line(&master, &args, &registry).unwrap();
/// assert!(result.display.show_defaults);
/// let Some(phil_core::ExtractValue::Leaf(leaf)) = result.extracted.lookup("run.cycles") else {
///     panic!("missing leaf");
/// };
/// assert_eq!(leaf.values, vec![PhilValue::Int(8)]);
/// ```
pub fn process_command_line(
    master: &Scope,
    args: &[String],
    registry: &TypeRegistry,
) -> Result<ProcessResult, Vec<PhilError>> {
    process_command_line_with(master, args, registry, &ProcessOptions::default())
}

/// Same as [`process_command_line`], with explicit [`ProcessOptions`].
pub fn process_command_line_with(
    master: &Scope,
    args: &[String],
    registry: &TypeRegistry,
    options: &ProcessOptions,
) -> Result<ProcessResult, Vec<PhilError>> {
    let mut display = DisplayFlags::default();
    let mut rest = Vec::new();
    let mut errors = Vec::new();

    for arg in args {
        if arg == "--show-defaults" {
            display.show_defaults = true;
        } else if let Some(value) = arg.strip_prefix("--attributes-level=") {
            match value.parse::<u32>() {
                Ok(level) => display.attributes_level = level,
                Err(_) => errors.push(flag_error(arg)),
            }
        } else if let Some(value) = arg.strip_prefix("--expert-level=") {
            match value.parse::<u32>() {
                Ok(level) => display.expert_level = Some(level),
                Err(_) => errors.push(flag_error(arg)),
            }
        } else {
            rest.push(arg.clone());
        }
    }

    let interpreter = ArgumentInterpreter::new(master, registry);
    let outcome = interpreter.interpret(&rest);
    errors.extend(outcome.errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    let sources: Vec<&Scope> = outcome.working.iter().collect();
    let fetch_options = FetchOptions {
        strict: options.strict,
        ..FetchOptions::default()
    };
    let fetched =
        fetch(master, &sources, registry, &fetch_options).map_err(|e| vec![e])?;
    debug!(
        sources = sources.len(),
        unconsumed = outcome.unconsumed.len(),
        "command line processed"
    );

    let mut diagnostics = outcome.warnings;
    diagnostics.extend(fetched.diagnostics);

    Ok(ProcessResult {
        extracted: extract(&fetched.merged),
        merged: fetched.merged,
        diagnostics,
        unconsumed: outcome.unconsumed,
        display,
    })
}

fn flag_error(arg: &str) -> PhilError {
    PhilError::syntax(
        format!("{arg}: expected a non-negative integer"),
        SourceLocation::new("command line", 1, 1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use phil_core::{Definition, Node, PhilValue, Word};

    fn master() -> Scope {
        Scope::root().with(Node::Scope(
            Scope::new("run")
                .with(Node::Definition(Definition::new(
                    "cycles",
                    "int",
                    vec![Word::unquoted("3")],
                )))
                .with(Node::Definition(Definition::new(
                    "label",
                    "str",
                    vec![Word::unquoted("base")],
                ))),
        ))
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_flags_are_consumed_before_interpretation() {
        let registry = TypeRegistry::with_builtins();
        let result = process_command_line(
            &master(),
            &args(&["--expert-level=2", "cycles=5", "--attributes-level=1"]),
            &registry,
        )
        .unwrap();
        assert_eq!(result.display.expert_level, Some(2));
        assert_eq!(result.display.attributes_level, 1);
        assert!(result.unconsumed.is_empty());
    }

    #[test]
    fn test_overrides_apply_in_argument_order() {
        let registry = TypeRegistry::with_builtins();
        let result =
            process_command_line(&master(), &args(&["cycles=5", "cycles=7"]), &registry).unwrap();
        let def = result
            .merged
            .get("run.cycles")
            .next()
            .unwrap()
            .as_definition()
            .unwrap()
            .clone();
        assert_eq!(def.values, vec![PhilValue::Int(7)]);
    }

    #[test]
    fn test_argument_problems_fail_with_every_error() {
        let registry = TypeRegistry::with_builtins();
        let errors = process_command_line(
            &master(),
            &args(&["ghost=1", "--expert-level=high"]),
            &registry,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_unconsumed_arguments_are_returned_in_order() {
        let registry = TypeRegistry::with_builtins();
        let result = process_command_line(
            &master(),
            &args(&["--verbose", "cycles=5", "data.mtz"]),
            &registry,
        )
        .unwrap();
        assert_eq!(result.unconsumed, vec!["--verbose", "data.mtz"]);
    }

    #[test]
    fn test_bad_value_surfaces_as_merge_diagnostic() {
        let registry = TypeRegistry::with_builtins();
        let result =
            process_command_line(&master(), &args(&["cycles=abc"]), &registry).unwrap();
        assert!(!result.is_clean());
    }

    #[test]
    fn test_strict_processing_fails_on_merge_problems() {
        let registry = TypeRegistry::with_builtins();
        let strict = ProcessOptions { strict: true };
        let errors = process_command_line_with(
            &master(),
            &args(&["cycles=abc"]),
            &registry,
            &strict,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], PhilError::Type { .. }));

        // Clean arguments still process under strict mode.
        let result =
            process_command_line_with(&master(), &args(&["cycles=5"]), &registry, &strict)
                .unwrap();
        assert!(result.is_clean());
    }
}
