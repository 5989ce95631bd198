// jqlite - opcode evaluator for a jq-style JSON filter language
// Copyright (c) 2025 jqlite contributors
// Licensed under the MIT License

//! # jqlite
//!
//! Evaluates pre-parsed jq-style filter programs against JSON-like values.
//!
//! A filter may turn one input into zero, one or many outputs (`.[]`), and
//! the interesting part of evaluation is carrying that multiplicity through
//! array construction, object construction and pipes. Parsing filter text is
//! left to an external parser; this crate starts from its opcode output.
//!
//! ## Architecture
//!
//! - `value` - the JSON value type shared by inputs and outputs
//! - `context` - the ordered values in flight between opcodes
//! - `opcode` - opcode programs, and decoding of the parser's JSON form
//! - `evaluator` - opcode semantics and arity propagation
//!
//! ## Example
//!
//! ```
//! use jqlite::{execute, Opcode, Program, Value};
//!
//! // .items[] | .name
//! let program = Program::new(vec![Opcode::pipe(
//!     Program::new(vec![Opcode::pick("items"), Opcode::explode()]),
//!     Opcode::pick("name"),
//! )]);
//! let input = Value::from_json_str(r#"{"items":[{"name":"a"},{"name":"b"}]}"#).unwrap();
//!
//! let results = execute(&input, &program).unwrap();
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[1], Value::from("b"));
//! ```

use thiserror::Error;

pub mod context;
pub mod evaluator;
pub mod opcode;
pub mod value;

pub use context::Context;
pub use evaluator::{
    Evaluation, Evaluator, EvaluatorError, EvaluatorOptions, ExplosionSignal,
};
pub use opcode::{ObjectEntry, Opcode, Program, ProgramError};
pub use value::Value;

/// Errors from the JSON-in, JSON-out entry point
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Evaluation(#[from] EvaluatorError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run `program` against one input document with default options.
pub fn execute(input: &Value, program: &Program) -> Result<Context, EvaluatorError> {
    Evaluator::new().run(program, input.clone())
}

/// Decode a parser-form program and a JSON document, evaluate, and render
/// every result as compact JSON, in output order.
///
/// # Errors
///
/// Fails if either document is not valid JSON, if the program contains an
/// unknown opcode, or if evaluation fails.
pub fn execute_json(input_json: &str, program_json: &str) -> Result<Vec<String>, Error> {
    let program = Program::from_json_str(program_json)?;
    let input = Value::from_json_str(input_json)?;
    let results = execute(&input, &program)?;
    results
        .iter()
        .map(|value| value.to_json_string().map_err(Error::from))
        .collect()
}
