//! Applet-Schema: Input Schemas for Applet Handlers
//!
//! Reads a script's TypeScript source and describes the input shape of its
//! exported `handler` and `actions` as a serializable [`ParsedNode`] tree.
//! The dashboard renders forms from it and the runtime validates calls
//! against it.
//!
//! ## Layer 1 - Static Analysis
//!
//! Focus: enough structural type analysis to describe a handler's input.
//! This is not a TypeScript compiler: only top-level declarations and type
//! syntax are parsed; function bodies are skipped.

pub mod ast;
pub mod classify;
pub mod error;
pub mod extract;
pub mod imports;
pub mod lexer;
pub mod locator;
pub mod node;
pub mod parser;

pub use classify::TypeClassifier;
pub use error::{ExtractError, ParseError, Result};
pub use extract::{
    analyze_module, analyze_script, extract_actions, extract_actions_from, extract_inputs,
    extract_inputs_from, ACTIONS_EXPORT, HANDLER_EXPORT,
};
pub use imports::{replace_specifiers, scan_imports, ImportKind, ImportSpecifier};
pub use locator::Locator;
pub use node::{
    ActionDescriptor, ArrayElements, EnumValue, InputParam, ObjectProperty, ParsedNode,
    PrimitiveKind, ScriptSchema,
};
pub use parser::parse_module;
