// Evaluation context: the ordered values in flight at one point of a filter

use std::ops::Index;
use std::slice;
use std::vec;

use crate::value::Value;

/// The ordered sequence of values flowing through a filter.
///
/// Its length is the multiplicity of the current branch: empty means the
/// branch produced nothing, one element is a single result, more than one is a
/// stream of results. A one-element context holding an array is a single
/// array result, never "many".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Vec<Value>,
}

impl Context {
    pub fn new(values: Vec<Value>) -> Self {
        Context { values }
    }

    pub fn empty() -> Self {
        Context { values: Vec::new() }
    }

    /// The context a host starts from: exactly its input document.
    pub fn single(value: Value) -> Self {
        Context {
            values: vec![value],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Value> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.values
    }

    /// Fold the context into at most one value.
    ///
    /// One element is returned as is, several are gathered into an array, and
    /// an empty context has nothing to give.
    pub fn collapse(self) -> Option<Value> {
        match self.values.len() {
            0 => None,
            1 => self.values.into_iter().next(),
            _ => Some(Value::array(self.values)),
        }
    }
}

impl From<Vec<Value>> for Context {
    fn from(values: Vec<Value>) -> Self {
        Context::new(values)
    }
}

impl FromIterator<Value> for Context {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Context {
            values: iter.into_iter().collect(),
        }
    }
}

impl Extend<Value> for Context {
    fn extend<I: IntoIterator<Item = Value>>(&mut self, iter: I) {
        self.values.extend(iter);
    }
}

impl IntoIterator for Context {
    type Item = Value;
    type IntoIter = vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = &'a Value;
    type IntoIter = slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl Index<usize> for Context {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}
