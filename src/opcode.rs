// Opcode programs: the immutable instruction trees the evaluator walks
//
// Programs normally arrive from the external parser in its JSON form, e.g.
// `[{"op":"pick","key":"foo","strict":true,"explode":false,"index":null}]`,
// and are decoded here once before any evaluation happens.

use std::rc::Rc;
use std::slice;

use serde::Deserialize;
use thiserror::Error;

use crate::value::Value;

/// Errors raised while turning the parser's output into a [`Program`]
#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("Unknown op code: {0}")]
    UnknownOpcode(String),

    #[error("Op code '{op}' is missing field '{field}'")]
    MissingField {
        op: &'static str,
        field: &'static str,
    },

    #[error("Malformed program: {0}")]
    Malformed(String),

    #[error("Invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single evaluator instruction.
///
/// The `strict` flag on the scalar accessors decides what happens to an
/// operand of the wrong shape: strict fails the evaluation, non-strict (jq's
/// `?` suffix) silently drops that operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    /// `.`
    CurrentContext,

    /// A constant. Replaces the whole context with the one value.
    Literal(Value),

    /// `.key` / `.key?`
    Pick { key: String, strict: bool },

    /// `.[n]`
    Index { index: i64, strict: bool },

    /// `.[start:end]`, either bound optional
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        strict: bool,
    },

    /// `.[]` / `.[]?`
    Explode { strict: bool },

    /// `[a, b, ...]`: one array built from every sub-program's outputs
    CreateArray(Vec<Program>),

    /// `{k: a, ...}`: one object per combination of the entries' outputs
    CreateObject(Vec<ObjectEntry>),

    /// `a | b`: run `output` once per result of `input`
    Pipe { input: Program, output: Program },
}

/// One `key: program` pair of an object constructor
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: String,
    pub value: Program,
}

impl Opcode {
    /// The parser's tag for this opcode.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::CurrentContext => "current_context",
            Opcode::Literal(_) => "literal",
            Opcode::Pick { .. } => "pick",
            Opcode::Index { .. } => "index",
            Opcode::Slice { .. } => "slice",
            Opcode::Explode { .. } => "explode",
            Opcode::CreateArray(_) => "create_array",
            Opcode::CreateObject(_) => "create_object",
            Opcode::Pipe { .. } => "pipe",
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Opcode::Literal(value.into())
    }

    pub fn pick(key: impl Into<String>) -> Self {
        Opcode::Pick {
            key: key.into(),
            strict: true,
        }
    }

    pub fn try_pick(key: impl Into<String>) -> Self {
        Opcode::Pick {
            key: key.into(),
            strict: false,
        }
    }

    pub fn index(index: i64) -> Self {
        Opcode::Index {
            index,
            strict: true,
        }
    }

    pub fn try_index(index: i64) -> Self {
        Opcode::Index {
            index,
            strict: false,
        }
    }

    pub fn slice(start: Option<i64>, end: Option<i64>) -> Self {
        Opcode::Slice {
            start,
            end,
            strict: true,
        }
    }

    pub fn try_slice(start: Option<i64>, end: Option<i64>) -> Self {
        Opcode::Slice {
            start,
            end,
            strict: false,
        }
    }

    pub fn explode() -> Self {
        Opcode::Explode { strict: true }
    }

    pub fn try_explode() -> Self {
        Opcode::Explode { strict: false }
    }

    pub fn create_array(values: Vec<Program>) -> Self {
        Opcode::CreateArray(values)
    }

    pub fn create_object<K: Into<String>>(entries: Vec<(K, Program)>) -> Self {
        Opcode::CreateObject(
            entries
                .into_iter()
                .map(|(key, value)| ObjectEntry {
                    key: key.into(),
                    value,
                })
                .collect(),
        )
    }

    pub fn pipe(input: impl Into<Program>, output: impl Into<Program>) -> Self {
        Opcode::Pipe {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// An ordered, immutable opcode sequence.
///
/// Clones share the underlying opcodes, so a sub-program held by a composite
/// opcode can be evaluated any number of times without being copied or
/// consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    ops: Rc<[Opcode]>,
}

impl Program {
    pub fn new(ops: Vec<Opcode>) -> Self {
        Program { ops: ops.into() }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Opcode> {
        self.ops.iter()
    }

    pub fn as_slice(&self) -> &[Opcode] {
        &self.ops
    }

    /// Decode the parser's JSON output.
    pub fn from_json_str(json: &str) -> Result<Program, ProgramError> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        Program::from_json_value(raw)
    }

    /// Decode an already-parsed JSON opcode tree.
    ///
    /// Accepts either a list of opcode records or a single bare record.
    pub fn from_json_value(json: serde_json::Value) -> Result<Program, ProgramError> {
        let mut ops = Vec::new();
        match json {
            serde_json::Value::Array(records) => {
                for record in records {
                    decode_opcode(record, &mut ops)?;
                }
            }
            record @ serde_json::Value::Object(_) => decode_opcode(record, &mut ops)?,
            other => {
                return Err(ProgramError::Malformed(format!(
                    "expected an opcode or a list of opcodes, found {}",
                    Value::from(other).type_name()
                )))
            }
        }
        Ok(Program::new(ops))
    }
}

impl From<Vec<Opcode>> for Program {
    fn from(ops: Vec<Opcode>) -> Self {
        Program::new(ops)
    }
}

impl From<Opcode> for Program {
    fn from(op: Opcode) -> Self {
        Program::new(vec![op])
    }
}

impl FromIterator<Opcode> for Program {
    fn from_iter<I: IntoIterator<Item = Opcode>>(iter: I) -> Self {
        Program {
            ops: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Opcode;
    type IntoIter = slice::Iter<'a, Opcode>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

// ── Parser form ──────────────────────────────────────────────────────────────

/// One opcode record as the parser writes it. Fields irrelevant to `op` are
/// simply absent (or null) in the JSON.
#[derive(Debug, Deserialize)]
struct RawOpcode {
    op: String,
    key: Option<String>,
    strict: Option<bool>,
    index: Option<i64>,
    #[serde(default)]
    explode: bool,
    start: Option<i64>,
    end: Option<i64>,
    value: Option<serde_json::Value>,
    #[serde(default)]
    values: Vec<serde_json::Value>,
    #[serde(default)]
    entries: Vec<RawEntry>,
    #[serde(rename = "in")]
    input: Option<serde_json::Value>,
    out: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    key: String,
    value: serde_json::Value,
}

fn decode_opcode(json: serde_json::Value, ops: &mut Vec<Opcode>) -> Result<(), ProgramError> {
    let raw: RawOpcode = serde_json::from_value(json)?;
    let strict = raw.strict.unwrap_or(true);

    match raw.op.as_str() {
        "current_context" => ops.push(Opcode::CurrentContext),

        "literal" => ops.push(Opcode::Literal(raw.value.map(Value::from).unwrap_or(Value::Null))),

        // The parser folds `.foo[1]` and `.foo[]` into the pick record itself.
        "pick" => {
            let key = raw.key.ok_or(ProgramError::MissingField {
                op: "pick",
                field: "key",
            })?;
            ops.push(Opcode::Pick { key, strict });
            if let Some(index) = raw.index {
                ops.push(Opcode::Index { index, strict });
            }
            if raw.explode {
                ops.push(Opcode::Explode { strict });
            }
        }

        "index" => {
            let index = raw.index.ok_or(ProgramError::MissingField {
                op: "index",
                field: "index",
            })?;
            ops.push(Opcode::Index { index, strict });
        }

        "slice" => ops.push(Opcode::Slice {
            start: raw.start,
            end: raw.end,
            strict,
        }),

        "explode" => ops.push(Opcode::Explode { strict }),

        "create_array" => {
            let values = raw
                .values
                .into_iter()
                .map(Program::from_json_value)
                .collect::<Result<Vec<_>, _>>()?;
            ops.push(Opcode::CreateArray(values));
        }

        "create_object" => {
            let entries = raw
                .entries
                .into_iter()
                .map(|entry| {
                    Ok(ObjectEntry {
                        key: entry.key,
                        value: Program::from_json_value(entry.value)?,
                    })
                })
                .collect::<Result<Vec<_>, ProgramError>>()?;
            ops.push(Opcode::CreateObject(entries));
        }

        "pipe" => {
            let input = raw.input.ok_or(ProgramError::MissingField {
                op: "pipe",
                field: "in",
            })?;
            let output = raw.out.ok_or(ProgramError::MissingField {
                op: "pipe",
                field: "out",
            })?;
            ops.push(Opcode::Pipe {
                input: Program::from_json_value(input)?,
                output: Program::from_json_value(output)?,
            });
        }

        other => return Err(ProgramError::UnknownOpcode(other.to_string())),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_current_context() {
        let program = Program::from_json_str(r#"[{"op":"current_context"}]"#).unwrap();
        assert_eq!(program.as_slice(), &[Opcode::CurrentContext]);
    }

    #[test]
    fn test_decode_bare_record() {
        let program = Program::from_json_value(json!({"op": "explode", "strict": false})).unwrap();
        assert_eq!(program.as_slice(), &[Opcode::try_explode()]);
    }

    #[test]
    fn test_decode_optional_pick() {
        let program = Program::from_json_value(json!([
            {"explode": false, "index": null, "key": "foo", "op": "pick", "strict": false}
        ]))
        .unwrap();
        assert_eq!(program.as_slice(), &[Opcode::try_pick("foo")]);
    }

    #[test]
    fn test_decode_pick_with_index_and_explode() {
        let program = Program::from_json_value(json!([
            {"explode": false, "index": 1, "key": "foo", "op": "pick", "strict": true},
            {"explode": true, "index": null, "key": "bar", "op": "pick", "strict": true}
        ]))
        .unwrap();
        assert_eq!(
            program.as_slice(),
            &[
                Opcode::pick("foo"),
                Opcode::index(1),
                Opcode::pick("bar"),
                Opcode::explode(),
            ]
        );
    }

    #[test]
    fn test_decode_index_defaults_to_strict() {
        let program = Program::from_json_value(json!([{"index": -2, "op": "index"}])).unwrap();
        assert_eq!(program.as_slice(), &[Opcode::index(-2)]);
    }

    #[test]
    fn test_decode_slice_bounds() {
        let program = Program::from_json_value(json!([
            {"op": "slice", "start": 1, "end": null, "strict": true},
            {"op": "slice"}
        ]))
        .unwrap();
        assert_eq!(
            program.as_slice(),
            &[Opcode::slice(Some(1), None), Opcode::slice(None, None)]
        );
    }

    #[test]
    fn test_decode_literals() {
        let program = Program::from_json_value(json!([
            {"op": "literal", "value": {"b": 1, "a": [true]}},
            {"op": "literal", "value": null}
        ]))
        .unwrap();
        assert_eq!(
            program.as_slice(),
            &[
                Opcode::Literal(Value::from(json!({"b": 1, "a": [true]}))),
                Opcode::Literal(Value::Null),
            ]
        );
    }

    #[test]
    fn test_decode_composites() {
        let program = Program::from_json_value(json!([{
            "op": "pipe",
            "in": [{"op": "create_array", "values": [
                [{"op": "literal", "value": 1}],
                [{"op": "explode", "strict": true}]
            ]}],
            "out": [{"op": "create_object", "entries": [
                {"key": "foo", "value": [{"op": "current_context"}]}
            ]}]
        }]))
        .unwrap();

        let expected = Opcode::pipe(
            Opcode::create_array(vec![
                Opcode::literal(1).into(),
                Opcode::explode().into(),
            ]),
            Opcode::create_object(vec![("foo", Program::from(Opcode::CurrentContext))]),
        );
        assert_eq!(program.as_slice(), &[expected]);
    }

    #[test]
    fn test_unknown_opcode() {
        let err = Program::from_json_value(json!([{"op": "reduce"}])).unwrap_err();
        assert!(matches!(err, ProgramError::UnknownOpcode(ref op) if op == "reduce"));
        assert_eq!(err.to_string(), "Unknown op code: reduce");
    }

    #[test]
    fn test_missing_fields() {
        let err = Program::from_json_value(json!([{"op": "pick"}])).unwrap_err();
        assert!(matches!(
            err,
            ProgramError::MissingField { op: "pick", field: "key" }
        ));

        let err = Program::from_json_value(json!({"op": "pipe", "in": []})).unwrap_err();
        assert!(matches!(
            err,
            ProgramError::MissingField { op: "pipe", field: "out" }
        ));
    }

    #[test]
    fn test_malformed_programs() {
        assert!(matches!(
            Program::from_json_value(json!("pick")),
            Err(ProgramError::Malformed(_))
        ));
        assert!(matches!(
            Program::from_json_str("[{\"op\":"),
            Err(ProgramError::Json(_))
        ));
        assert!(matches!(
            Program::from_json_value(json!([{"op": "index", "index": 1.5}])),
            Err(ProgramError::Json(_))
        ));
    }

    #[test]
    fn test_clone_shares_opcodes() {
        let program = Program::new(vec![Opcode::pick("a"), Opcode::explode()]);
        let copy = program.clone();
        assert!(Rc::ptr_eq(&program.ops, &copy.ops));
    }
}
