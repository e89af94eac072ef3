use std::fmt;

use serde::{Deserialize, Serialize};

/// Non-owning handle to an engine-owned object.
///
/// The VM never controls the lifetime of the object behind a handle; validity
/// is checked through the host when an opcode actually touches the object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// A VM value: one slot of the data stack or of any variable store.
///
/// - `Str` is an index into the owning program's string table; the bytes live
///   in the program, not in the value.
/// - `Object` is nullable: scripts routinely pass "no object" to engine calls.
///
/// Numeric promotion is int+int -> int, any float operand -> float.
/// `Str` and `Object` never coerce to numbers; asking for that is a
/// [`Fault::TypeMismatch`](crate::error::Fault).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Unset,
    Int(i64),
    Float(f64),
    Str(u32),
    Object(Option<ObjectId>),
}

impl Value {
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Option<ObjectId>> {
        match self {
            Value::Object(h) => Some(*h),
            _ => None,
        }
    }

    /// Truthiness used by conditional jumps and the logical opcodes.
    /// `Unset`, zero and a null object handle are false; everything else is true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Unset => false,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(_) => true,
            Value::Object(h) => h.is_some(),
        }
    }

    /// Tag name for diagnostics (`TypeMismatch` messages, fault reports).
    pub fn tag_name(&self) -> &'static str {
        match self {
            Value::Unset => "unset",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => write!(f, "unset"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(id) => write!(f, "str#{}", id),
            Value::Object(Some(h)) => write!(f, "{}", h),
            Value::Object(None) => write!(f, "obj#null"),
        }
    }
}
