//! Lexer and parser for phil configuration documents.
//!
//! This crate turns phil source text into the `phil-core` scope tree.
//! Documents are line-oriented: definitions (`name = value`), nested
//! scopes (`name { ... }`), dotted attribute lines (`.type = int`),
//! comments (`# ...`), and `include file other.phil` references resolved
//! through a pluggable [`SourceLoader`].
//!
//! # Examples
//!
//! ```
//! use phil_core::{PhilValue, TypeRegistry};
//! use phil_parser::parse;
//!
//! let registry = TypeRegistry::with_builtins();
//! let tree = parse(
//!     "refinement {\n  cycles = 3\n    .type = int\n    .help = \"Number of passes\"\n}\n",
//!     "master.phil",
//!     &registry,
//! )
//! .expect("valid document");
//!
//! let cycles = tree
//!     .get("refinement.cycles")
//!     .next()
//!     .and_then(|n| n.as_definition())
//!     .expect("definition exists");
//! assert_eq!(cycles.values, vec![PhilValue::Int(3)]);
//! ```

mod lexer;
mod parser;
mod source;

pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{ParseOutcome, PhilParser, change_default_phil_values, parse, parse_with_loader};
pub use source::{FileLoader, MapLoader, SourceLoader};
