use crate::error::Fault;
use crate::value::{ObjectId, Value};

/// The operand (data) stack of one VM instance.
///
/// Grows and shrinks only at the tail. The depth limit is a guard against
/// runaway scripts, not a semantic bound; hitting it is a fatal fault for the
/// current call, like popping an empty stack.
#[derive(Debug)]
pub struct ValueStack {
    values: Vec<Value>,
    limit: usize,
}

impl ValueStack {
    pub fn new(limit: usize) -> Self {
        Self {
            values: Vec::with_capacity(limit.min(256)),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, v: Value) -> Result<(), Fault> {
        if self.values.len() >= self.limit {
            return Err(Fault::StackOverflow { limit: self.limit });
        }
        self.values.push(v);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, Fault> {
        self.values.pop().ok_or(Fault::StackUnderflow)
    }

    /// Pop an integer. No demotion: a float is not silently truncated.
    pub fn pop_int(&mut self) -> Result<i64, Fault> {
        match self.pop()? {
            Value::Int(v) => Ok(v),
            other => Err(Fault::type_mismatch("int", other.tag_name())),
        }
    }

    /// Pop a float; integers promote.
    pub fn pop_float(&mut self) -> Result<f64, Fault> {
        match self.pop()? {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            other => Err(Fault::type_mismatch("float", other.tag_name())),
        }
    }

    /// Pop an object handle. `None` is a legal (null) handle.
    pub fn pop_object(&mut self) -> Result<Option<ObjectId>, Fault> {
        match self.pop()? {
            Value::Object(h) => Ok(h),
            other => Err(Fault::type_mismatch("object", other.tag_name())),
        }
    }

    /// Pop a string-table reference.
    pub fn pop_str(&mut self) -> Result<u32, Fault> {
        match self.pop()? {
            Value::Str(id) => Ok(id),
            other => Err(Fault::type_mismatch("string", other.tag_name())),
        }
    }

    pub fn top(&self) -> Option<&Value> {
        self.values.last()
    }

    /// Read `n` slots below the top without consuming; `peek(0)` is the top.
    pub fn peek(&self, n: usize) -> Option<&Value> {
        let len = self.values.len();
        if n >= len {
            return None;
        }
        self.values.get(len - 1 - n)
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
