// Opcode evaluator
//
// Runs a program over a context and keeps track of how many values every
// sub-program produced, which is what array/object construction and piping
// need to decide between collapsing, dropping and fanning out.

use std::fmt;
use std::iter;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::context::Context;
use crate::opcode::{ObjectEntry, Opcode, Program, ProgramError};
use crate::value::{Map, Value};

/// Depth limit used by [`EvaluatorOptions::default`].
pub const DEFAULT_MAX_DEPTH: usize = 302;

/// The operation a strict opcode attempted on an unsuitable operand
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Pick(String),
    Index,
    Slice,
    Iterate,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Pick(_) | Access::Index => write!(f, "index"),
            Access::Slice => write!(f, "slice"),
            Access::Iterate => write!(f, "iterate over"),
        }
    }
}

fn mismatch_message(access: &Access, type_name: &str) -> String {
    match access {
        Access::Pick(key) => format!("Cannot index {} with \"{}\"", type_name, key),
        Access::Index => format!("Cannot index {} with number", type_name),
        other => format!("Cannot {} {}", other, type_name),
    }
}

/// Evaluator errors
///
/// Any of these aborts the whole evaluation; nothing is returned for the
/// values processed before the failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    #[error("{}", mismatch_message(.access, .type_name))]
    TypeMismatch {
        access: Access,
        type_name: &'static str,
    },

    #[error("Cannot slice with no offsets")]
    MissingSliceBounds,

    #[error("Unknown op code: {0}")]
    UnknownOpcode(String),

    #[error("Invalid program: {0}")]
    InvalidProgram(String),

    #[error("Maximum evaluation depth ({0}) exceeded")]
    DepthExceeded(usize),
}

impl From<ProgramError> for EvaluatorError {
    fn from(err: ProgramError) -> Self {
        match err {
            ProgramError::UnknownOpcode(op) => EvaluatorError::UnknownOpcode(op),
            other => EvaluatorError::InvalidProgram(other.to_string()),
        }
    }
}

/// Evaluator configuration
///
/// Deserializable so hosts can keep it next to the rest of their settings;
/// missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EvaluatorOptions {
    /// How deeply composite opcodes may nest before evaluation is refused.
    pub max_depth: usize,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        EvaluatorOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Reported by an evaluation whose program exploded a value somewhere.
///
/// `len` is the number of values the evaluation finally produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplosionSignal {
    pub len: usize,
}

/// The outcome of running a program: its output context, and whether any
/// opcode in it (or in a nested sub-program) fanned values out.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub context: Context,
    exploded: bool,
}

impl Evaluation {
    /// `Some` once the program has exploded, carrying the output length.
    pub fn explosion(&self) -> Option<ExplosionSignal> {
        self.exploded.then(|| ExplosionSignal {
            len: self.context.len(),
        })
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    /// The values a composite opcode receives from this sub-evaluation.
    ///
    /// An exploded result contributes all of its values (possibly none). A
    /// result that never exploded is one value: its collapsed context, or
    /// nothing at all when the context is empty.
    fn into_outputs(self) -> Vec<Value> {
        if self.exploded {
            self.context.into_vec()
        } else {
            self.context.collapse().into_iter().collect()
        }
    }
}

/// Evaluator for opcode programs
///
/// Holds only its options; every call starts from scratch, so one evaluator
/// can be reused for any number of programs and inputs.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    options: EvaluatorOptions,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::default()
    }

    pub fn with_options(options: EvaluatorOptions) -> Self {
        Evaluator { options }
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Evaluate `program` against `context`.
    pub fn evaluate(&self, program: &Program, context: Context) -> Result<Evaluation, EvaluatorError> {
        let evaluation = self.evaluate_at(program, context, 0)?;
        debug!(
            outputs = evaluation.context.len(),
            exploded = evaluation.exploded,
            "evaluation complete"
        );
        Ok(evaluation)
    }

    /// Evaluate `program` against a single input document, as a host does.
    pub fn run(&self, program: &Program, input: Value) -> Result<Context, EvaluatorError> {
        self.evaluate(program, Context::single(input))
            .map(Evaluation::into_context)
    }

    /// Decode a parser-form program and run it against `input`.
    ///
    /// Decoding failures surface as evaluation errors, so an unknown opcode
    /// aborts the run before any value is looked at.
    pub fn run_json(&self, program_json: &str, input: Value) -> Result<Context, EvaluatorError> {
        let program = Program::from_json_str(program_json)?;
        self.run(&program, input)
    }

    fn evaluate_at(
        &self,
        program: &Program,
        mut context: Context,
        depth: usize,
    ) -> Result<Evaluation, EvaluatorError> {
        if depth > self.options.max_depth {
            return Err(EvaluatorError::DepthExceeded(self.options.max_depth));
        }

        let mut exploded = false;
        for op in program {
            trace!(op = op.name(), depth, inputs = context.len(), "dispatch");

            context = match op {
                Opcode::CurrentContext => context,

                Opcode::Literal(value) => Context::single(value.clone()),

                Opcode::Pick { key, strict } => each_operand(
                    context,
                    *strict,
                    || Access::Pick(key.clone()),
                    |value| value.field(key).map(iter::once),
                )?,

                Opcode::Index { index, strict } => each_operand(
                    context,
                    *strict,
                    || Access::Index,
                    |value| value.element(*index).map(iter::once),
                )?,

                Opcode::Slice { start, end, strict } => {
                    if start.is_none() && end.is_none() {
                        return Err(EvaluatorError::MissingSliceBounds);
                    }
                    each_operand(
                        context,
                        *strict,
                        || Access::Slice,
                        |value| value.slice(*start, *end).map(iter::once),
                    )?
                }

                Opcode::Explode { strict } => {
                    exploded = true;
                    each_operand(context, *strict, || Access::Iterate, Value::members)?
                }

                Opcode::CreateArray(programs) => {
                    let built = self.create_array(&context, programs, depth)?;
                    exploded |= built.exploded;
                    built.context
                }

                Opcode::CreateObject(entries) => {
                    let built = self.create_object(&context, entries, depth)?;
                    exploded |= built.exploded;
                    built.context
                }

                Opcode::Pipe { input, output } => {
                    let piped = self.pipe(context, input, output, depth)?;
                    exploded |= piped.exploded;
                    piped.context
                }
            };
        }

        Ok(Evaluation { context, exploded })
    }

    /// Build exactly one array from the outputs of every sub-program, each
    /// run against the same incoming context.
    fn create_array(
        &self,
        context: &Context,
        programs: &[Program],
        depth: usize,
    ) -> Result<Evaluation, EvaluatorError> {
        let mut items = Vec::with_capacity(programs.len());
        let mut exploded = false;

        for program in programs {
            let element = self.evaluate_at(program, context.clone(), depth + 1)?;
            exploded |= element.exploded;
            items.extend(element.into_outputs());
        }

        Ok(Evaluation {
            context: Context::single(Value::array(items)),
            exploded,
        })
    }

    /// Build one object per combination of the entries' candidate values.
    fn create_object(
        &self,
        context: &Context,
        entries: &[ObjectEntry],
        depth: usize,
    ) -> Result<Evaluation, EvaluatorError> {
        // A repeated key keeps its first position but takes the later candidates.
        let mut candidates: IndexMap<&str, Vec<Value>> = IndexMap::with_capacity(entries.len());
        let mut exploded = false;

        for entry in entries {
            let field = self.evaluate_at(&entry.value, context.clone(), depth + 1)?;
            exploded |= field.exploded;
            candidates.insert(entry.key.as_str(), field.into_outputs());
        }

        let objects = cartesian_objects(&candidates);
        trace!(keys = candidates.len(), objects = objects.len(), "objects built");

        Ok(Evaluation {
            context: objects,
            exploded,
        })
    }

    /// Run `input`, then `output` once for each value `input` yields.
    fn pipe(
        &self,
        context: Context,
        input: &Program,
        output: &Program,
        depth: usize,
    ) -> Result<Evaluation, EvaluatorError> {
        let upstream = self.evaluate_at(input, context, depth + 1)?;
        let mut exploded = upstream.exploded;
        let mut results = Context::empty();

        for value in upstream.into_outputs() {
            let downstream = self.evaluate_at(output, Context::single(value), depth + 1)?;
            exploded |= downstream.exploded;
            results.extend(downstream.context);
        }

        Ok(Evaluation {
            context: results,
            exploded,
        })
    }
}

/// Apply a per-value accessor across a context.
///
/// `apply` returns `None` when a value has the wrong shape for the access:
/// strict opcodes then fail, non-strict ones leave that value out.
fn each_operand<I, F>(
    context: Context,
    strict: bool,
    access: impl Fn() -> Access,
    mut apply: F,
) -> Result<Context, EvaluatorError>
where
    I: IntoIterator<Item = Value>,
    F: FnMut(&Value) -> Option<I>,
{
    let mut results = Context::empty();
    for operand in context.iter() {
        match apply(operand) {
            Some(values) => results.extend(values),
            None if strict => {
                return Err(EvaluatorError::TypeMismatch {
                    access: access(),
                    type_name: operand.type_name(),
                })
            }
            None => debug!(
                access = %access(),
                type_name = operand.type_name(),
                "operand dropped"
            ),
        }
    }
    Ok(results)
}

/// Every combination of candidates, one object each, in key-major order.
///
/// An empty candidate list anywhere leaves no combinations at all.
fn cartesian_objects(candidates: &IndexMap<&str, Vec<Value>>) -> Context {
    let mut partials = vec![Map::with_capacity(candidates.len())];

    for (key, values) in candidates {
        partials = partials
            .iter()
            .flat_map(|partial| {
                values.iter().map(move |value| {
                    let mut object = partial.clone();
                    object.insert(key.to_string(), value.clone());
                    object
                })
            })
            .collect();
    }

    partials.into_iter().map(Value::object).collect()
}
