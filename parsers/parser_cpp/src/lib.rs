//! Parser for the class-definition dialect used by game config files
//! (`config.cpp` / `*.hpp`).
//!
//! The pipeline runs in three stages. [`Preprocessor`] expands `#define`
//! macros and `#include` files into a token stream, [`Parser`] builds a
//! [`ConfigTree`] from it, and [`Resolver`] flattens inheritance on demand.
//!
//! ```
//! use parser_cpp::{parse, QueryEngine, Value};
//!
//! let tree = parse(r#"
//!     class CfgWeapons {
//!         class Rifle_Base { scope = 1; };
//!         class my_rifle: Rifle_Base { displayName = "My Rifle"; };
//!     };
//! "#).unwrap();
//!
//! let query = QueryEngine::new(&tree);
//! let scope = query
//!     .resolved_property(&["CfgWeapons", "my_rifle"], "scope")
//!     .unwrap()
//!     .unwrap();
//! assert!(matches!(scope.value, Value::Number(_)));
//! ```

mod ast;
mod error;
mod lexer;
mod merge;
mod parser;
mod preprocessor;
mod printer;
mod query;
mod resolver;

pub use ast::{
    ClassNode, ClassState, ConfigTree, EnumConstant, MergeMode, Number, Property, Value,
};
pub use error::{ConfigError, Position, ResolutionErrorKind, SyntaxErrorKind};
pub use lexer::{Lexer, Token, TokenKind};
pub use merge::merge_arrays;
pub use parser::Parser;
pub use preprocessor::{IncludeLoader, LocalIncludes, Macro, MacroTable, NoIncludes, Preprocessor};
pub use printer::render;
pub use query::QueryEngine;
pub use resolver::{ResolutionOutcome, ResolvedClass, Resolver};

/// Parse a source string into a [`ConfigTree`], ignoring `#include`
/// directives that cannot be satisfied from the source itself.
pub fn parse(source: &str) -> Result<ConfigTree, ConfigError> {
    parse_with_loader(source, &NoIncludes)
}

/// Parse a source string, resolving `#include` directives through `loader`.
pub fn parse_with_loader(
    source: &str,
    loader: &dyn IncludeLoader,
) -> Result<ConfigTree, ConfigError> {
    let mut preprocessor = Preprocessor::new(loader);
    let tokens = preprocessor.process(source)?;
    Parser::new(tokens).parse()
}
