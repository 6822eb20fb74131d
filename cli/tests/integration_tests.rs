//! End-to-end command-line processing tests: files, overrides, and
//! precedence.

use std::fs;

use phil_cli::process_command_line;
use phil_core::{ExtractValue, PhilError, PhilValue, Scope, TypeRegistry};
use phil_parser::parse;

const MASTER: &str = r#"run {
  cycles = 3
    .type = int
  tags = base
    .type = strings
  mode = *fast careful
    .type = choice
}
output {
  prefix = out
    .type = str
}
restraint
  .multiple = True
{
  selection = None
    .type = str
}
"#;

fn master() -> Scope {
    let registry = TypeRegistry::with_builtins();
    parse(MASTER, "master.phil", &registry).expect("master parses")
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|a| a.to_string()).collect()
}

fn int_at(result: &phil_cli::ProcessResult, path: &str) -> i64 {
    let Some(ExtractValue::Leaf(leaf)) = result.extracted.lookup(path) else {
        panic!("no leaf at {path}");
    };
    match leaf.single() {
        Some(PhilValue::Int(v)) => *v,
        other => panic!("unexpected value at {path}: {other:?}"),
    }
}

#[test]
fn cli_overrides_beat_working_files() {
    let dir = tempfile::tempdir().unwrap();
    let working = dir.path().join("work.phil");
    fs::write(&working, "run.cycles = 5\noutput.prefix = fromfile\n").unwrap();

    let registry = TypeRegistry::with_builtins();
    let result = process_command_line(
        &master(),
        &args(&[&working.to_string_lossy(), "cycles=9"]),
        &registry,
    )
    .unwrap();
    assert!(result.is_clean(), "{:?}", result.diagnostics);

    // The file overrode the master, the explicit argument overrode the
    // file.
    assert_eq!(int_at(&result, "run.cycles"), 9);
    let Some(ExtractValue::Leaf(prefix)) = result.extracted.lookup("output.prefix") else {
        panic!("no prefix");
    };
    assert_eq!(
        prefix.values,
        vec![PhilValue::String("fromfile".to_string())]
    );
}

#[test]
fn later_files_beat_earlier_files() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.phil");
    let second = dir.path().join("second.phil");
    fs::write(&first, "run.cycles = 5\n").unwrap();
    fs::write(&second, "run.cycles = 7\n").unwrap();

    let registry = TypeRegistry::with_builtins();
    let result = process_command_line(
        &master(),
        &args(&[&first.to_string_lossy(), &second.to_string_lossy()]),
        &registry,
    )
    .unwrap();
    assert_eq!(int_at(&result, "run.cycles"), 7);
}

#[test]
fn ambiguity_requires_a_longer_path() {
    let ambiguous = r#"a {
  limit = 1
    .type = int
}
b {
  limit = 2
    .type = int
}
"#;
    let registry = TypeRegistry::with_builtins();
    let master = parse(ambiguous, "master.phil", &registry).unwrap();

    let errors = process_command_line(&master, &args(&["limit=3"]), &registry).unwrap_err();
    let PhilError::AmbiguousPath { candidates, .. } = &errors[0] else {
        panic!("expected ambiguity: {:?}", errors[0]);
    };
    assert_eq!(candidates.len(), 2);

    let result = process_command_line(&master, &args(&["a.limit=3"]), &registry).unwrap();
    assert_eq!(int_at(&result, "a.limit"), 3);
}

#[test]
fn unknown_override_fails_with_path_error() {
    let registry = TypeRegistry::with_builtins();
    let errors = process_command_line(&master(), &args(&["ghost=1"]), &registry).unwrap_err();
    assert!(matches!(&errors[0], PhilError::Path { path } if path.as_str() == "ghost"));
}

#[test]
fn unrecognized_file_parameters_are_diagnosed_not_merged() {
    let dir = tempfile::tempdir().unwrap();
    let working = dir.path().join("work.phil");
    fs::write(&working, "run.cycles = 5\nrun.ghost = 1\n").unwrap();

    let registry = TypeRegistry::with_builtins();
    let result = process_command_line(
        &master(),
        &args(&[&working.to_string_lossy()]),
        &registry,
    )
    .unwrap();
    assert!(!result.is_clean());
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.to_string().contains("run.ghost"))
    );
    // The valid part of the file still merged.
    assert_eq!(int_at(&result, "run.cycles"), 5);
}

#[test]
fn append_override_extends_list_values() {
    let registry = TypeRegistry::with_builtins();
    let result =
        process_command_line(&master(), &args(&["tags+=extra"]), &registry).unwrap();
    assert!(result.is_clean(), "{:?}", result.diagnostics);
    let Some(ExtractValue::Leaf(tags)) = result.extracted.lookup("run.tags") else {
        panic!("no tags");
    };
    assert_eq!(
        tags.values,
        vec![
            PhilValue::String("base".to_string()),
            PhilValue::String("extra".to_string()),
        ]
    );
}

#[test]
fn choice_override_validates_against_options() {
    let registry = TypeRegistry::with_builtins();
    let result =
        process_command_line(&master(), &args(&["mode=careful"]), &registry).unwrap();
    assert!(result.is_clean());
    let Some(ExtractValue::Leaf(mode)) = result.extracted.lookup("run.mode") else {
        panic!("no mode");
    };
    assert_eq!(mode.values, vec![PhilValue::String("careful".to_string())]);

    let bad = process_command_line(&master(), &args(&["mode=reckless"]), &registry).unwrap();
    assert!(!bad.is_clean());
}

#[test]
fn repeated_blocks_accumulate_from_all_sources() {
    let dir = tempfile::tempdir().unwrap();
    let working = dir.path().join("work.phil");
    fs::write(
        &working,
        "restraint {\n  selection = first\n}\nrestraint {\n  selection = second\n}\n",
    )
    .unwrap();

    let registry = TypeRegistry::with_builtins();
    let result = process_command_line(
        &master(),
        &args(&[&working.to_string_lossy()]),
        &registry,
    )
    .unwrap();
    assert!(result.is_clean(), "{:?}", result.diagnostics);

    let Some(ExtractValue::Scopes(blocks)) = result.extracted.get("restraint") else {
        panic!("no restraint instances");
    };
    assert_eq!(blocks.len(), 2);
}
