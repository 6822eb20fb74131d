//! Core data model and merge engine for phil configuration trees.
//!
//! Phil is a hierarchical configuration language built around a single
//! idea: an application declares a *master* tree of typed, documented
//! parameters, and every other input (files, command-line overrides,
//! embedded snippets) is a *working* document merged over that master. The
//! master defines structure, types, and defaults; working documents only
//! supply values.
//!
//! This crate provides:
//!
//! - the scope tree model ([`Scope`], [`Definition`], [`Word`]),
//! - the type system ([`TypeRegistry`], [`TypeHandler`], [`PhilValue`]),
//! - the merge engine ([`fetch`]) and minimal-difference extraction
//!   ([`diff`]),
//! - the typed extract/inject bridge ([`extract`], [`inject`]) with
//!   per-leaf path provenance,
//! - phil text rendering ([`as_str`]) and path lookup ([`find_object`],
//!   [`find_scope`]).
//!
//! Parsing lives in the companion `phil-parser` crate; command-line
//! interpretation in `phil-cli`.
//!
//! # Examples
//!
//! ```
//! use phil_core::{
//!     as_str, diff, fetch, Definition, FetchOptions, FormatOptions, Node, PhilValue, Scope,
//!     TypeRegistry, Word,
//! };
//!
//! let master = Scope::root().with(Node::Scope(
//!     Scope::new("run")
//!         .with(Node::Definition(Definition::new(
//!             "cycles",
//!             "int",
//!             vec![Word::unquoted("3")],
//!         )))
//!         .with(Node::Definition(Definition::new(
//!             "verbose",
//!             "bool",
//!             vec![Word::unquoted("False")],
//!         ))),
//! ));
//! let working = Scope::root().with(Node::Scope(Scope::new("run").with(Node::Definition(
//!     Definition::new("cycles", "int", vec![Word::unquoted("8")]),
//! ))));
//!
//! let registry = TypeRegistry::with_builtins();
//! let result = fetch(&master, &[&working], &registry, &FetchOptions::default())?;
//! assert!(result.is_clean());
//!
//! let changes = diff(&master, &result.merged, &registry);
//! assert_eq!(as_str(&changes, &FormatOptions::default()), "run {\n  cycles = 8\n}\n");
//! # Ok::<(), phil_core::PhilError>(())
//! ```

mod diff;
mod error;
mod extract;
mod fetch;
mod format;
mod path;
mod registry;
mod substitute;
mod types;
mod value;

pub use diff::diff;
pub use error::{Diagnostic, PhilError, Result, Severity};
pub use extract::{ExtractLeaf, ExtractScope, ExtractValue, extract, inject};
pub use fetch::{FetchOptions, FetchResult, fetch};
pub use format::{FormatOptions, as_str, find_object, find_scope};
pub use path::PhilPath;
pub use registry::{Cardinality, TypeHandler, TypeRegistry};
pub use types::{Definition, Node, Scope, SourceLocation, Word, is_plain_none};
pub use value::{PhilValue, values_eq};
