//! Handlers for the machine's own instructions: control flow, constants,
//! variables, arithmetic, comparisons.
//!
//! Arithmetic follows the fixed promotion rule: int op int stays int (with
//! wrapping), any float operand makes the result float. Strings and object
//! handles never coerce to numbers. Integer division and modulo by zero
//! produce 0 rather than faulting; scripts are data and a bad divisor in a
//! dialogue formula should not kill the call chain.

use std::cmp::Ordering;

use crate::error::Fault;
use crate::value::Value;
use crate::vm::Machine;

// -------------------------
// control
// -------------------------

pub(super) fn nop(_m: &mut Machine<'_>) -> Result<(), Fault> {
    Ok(())
}

/// `JMP target:u32`
pub(super) fn jmp(m: &mut Machine<'_>) -> Result<(), Fault> {
    let target = m.read_u32()?;
    m.jump(target);
    Ok(())
}

/// `JZ target:u32`: pops the condition, jumps when it is falsy.
pub(super) fn jz(m: &mut Machine<'_>) -> Result<(), Fault> {
    let target = m.read_u32()?;
    let cond = m.pop()?;
    if !cond.truthy() {
        m.jump(target);
    }
    Ok(())
}

/// `CALL proc:u16`: pops the callee's declared arguments, pushes a frame.
pub(super) fn call(m: &mut Machine<'_>) -> Result<(), Fault> {
    let index = m.read_u16()?;
    m.call_procedure(index)
}

pub(super) fn ret(m: &mut Machine<'_>) -> Result<(), Fault> {
    m.ret(None)
}

/// `RETV`: pops the return value, then returns it to the caller.
pub(super) fn retv(m: &mut Machine<'_>) -> Result<(), Fault> {
    let value = m.pop()?;
    m.ret(Some(value))
}

pub(super) fn pop(m: &mut Machine<'_>) -> Result<(), Fault> {
    m.pop()?;
    Ok(())
}

pub(super) fn dup(m: &mut Machine<'_>) -> Result<(), Fault> {
    let top = *m.top().ok_or(Fault::StackUnderflow)?;
    m.push(top)
}

pub(super) fn swap(m: &mut Machine<'_>) -> Result<(), Fault> {
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(b)?;
    m.push(a)
}

// -------------------------
// constants
// -------------------------

/// `PUSH_INT v:i32` (sign-extended to i64)
pub(super) fn push_int(m: &mut Machine<'_>) -> Result<(), Fault> {
    let v = m.read_i32()? as i64;
    m.push(Value::Int(v))
}

/// `PUSH_FLOAT bits:f64`
pub(super) fn push_float(m: &mut Machine<'_>) -> Result<(), Fault> {
    let v = m.read_f64()?;
    m.push(Value::Float(v))
}

/// `PUSH_STR id:u32`: the id is validated here so a bad reference faults
/// at the push, not wherever the value ends up.
pub(super) fn push_str(m: &mut Machine<'_>) -> Result<(), Fault> {
    let id = m.read_u32()?;
    m.string(id)?;
    m.push(Value::Str(id))
}

pub(super) fn push_unset(m: &mut Machine<'_>) -> Result<(), Fault> {
    m.push(Value::Unset)
}

/// Pushes the handle of the object this script is attached to.
pub(super) fn push_self(m: &mut Machine<'_>) -> Result<(), Fault> {
    let owner = m.owner();
    m.push(Value::Object(Some(owner)))
}

// -------------------------
// variables
// -------------------------

/// `GET_GLOBAL slot:u16`
pub(super) fn get_global(m: &mut Machine<'_>) -> Result<(), Fault> {
    let index = m.read_u16()?;
    let v = m.global(index)?;
    m.push(v)
}

/// `SET_GLOBAL slot:u16`: pops the value.
pub(super) fn set_global(m: &mut Machine<'_>) -> Result<(), Fault> {
    let index = m.read_u16()?;
    let v = m.pop()?;
    m.set_global(index, v)
}

/// `GET_LOCAL slot:u16`
pub(super) fn get_local(m: &mut Machine<'_>) -> Result<(), Fault> {
    let index = m.read_u16()?;
    let v = m.local(index)?;
    m.push(v)
}

/// `SET_LOCAL slot:u16`: pops the value.
pub(super) fn set_local(m: &mut Machine<'_>) -> Result<(), Fault> {
    let index = m.read_u16()?;
    let v = m.pop()?;
    m.set_local(index, v)
}

/// `EXPORT_VAR name:u32`: pops the initial value, declares the binding.
pub(super) fn export_var(m: &mut Machine<'_>) -> Result<(), Fault> {
    let id = m.read_u32()?;
    let name = m.string(id)?;
    let initial = m.pop()?;
    m.exports().declare(name, initial);
    Ok(())
}

/// `GET_EXPORT name:u32`
pub(super) fn get_export(m: &mut Machine<'_>) -> Result<(), Fault> {
    let id = m.read_u32()?;
    let name = m.string(id)?;
    let v = m.exports().get(name)?;
    m.push(v)
}

/// `SET_EXPORT name:u32`: pops the value.
pub(super) fn set_export(m: &mut Machine<'_>) -> Result<(), Fault> {
    let id = m.read_u32()?;
    let name = m.string(id)?;
    let v = m.pop()?;
    m.exports().set(name, v)
}

// -------------------------
// arithmetic / logic
// -------------------------

fn operands(m: &mut Machine<'_>) -> Result<(Value, Value), Fault> {
    let b = m.pop()?;
    let a = m.pop()?;
    Ok((a, b))
}

fn numeric_mismatch(a: Value, b: Value) -> Fault {
    let found = if matches!(a, Value::Int(_) | Value::Float(_)) {
        b.tag_name()
    } else {
        a.tag_name()
    };
    Fault::type_mismatch("number", found)
}

pub(super) fn add(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let out = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_add(y)),
        (Value::Int(x), Value::Float(y)) => Value::Float(x as f64 + y),
        (Value::Float(x), Value::Int(y)) => Value::Float(x + y as f64),
        (Value::Float(x), Value::Float(y)) => Value::Float(x + y),
        (a, b) => return Err(numeric_mismatch(a, b)),
    };
    m.push(out)
}

pub(super) fn sub(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let out = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_sub(y)),
        (Value::Int(x), Value::Float(y)) => Value::Float(x as f64 - y),
        (Value::Float(x), Value::Int(y)) => Value::Float(x - y as f64),
        (Value::Float(x), Value::Float(y)) => Value::Float(x - y),
        (a, b) => return Err(numeric_mismatch(a, b)),
    };
    m.push(out)
}

pub(super) fn mul(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let out = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_mul(y)),
        (Value::Int(x), Value::Float(y)) => Value::Float(x as f64 * y),
        (Value::Float(x), Value::Int(y)) => Value::Float(x * y as f64),
        (Value::Float(x), Value::Float(y)) => Value::Float(x * y),
        (a, b) => return Err(numeric_mismatch(a, b)),
    };
    m.push(out)
}

pub(super) fn div(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let out = match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            Value::Int(if y == 0 { 0 } else { x.wrapping_div(y) })
        }
        (Value::Int(x), Value::Float(y)) => {
            Value::Float(if y == 0.0 { 0.0 } else { x as f64 / y })
        }
        (Value::Float(x), Value::Int(y)) => {
            Value::Float(if y == 0 { 0.0 } else { x / y as f64 })
        }
        (Value::Float(x), Value::Float(y)) => {
            Value::Float(if y == 0.0 { 0.0 } else { x / y })
        }
        (a, b) => return Err(numeric_mismatch(a, b)),
    };
    m.push(out)
}

pub(super) fn modulo(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let out = match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            Value::Int(if y == 0 { 0 } else { x.wrapping_rem(y) })
        }
        (Value::Int(x), Value::Float(y)) => {
            Value::Float(if y == 0.0 { 0.0 } else { x as f64 % y })
        }
        (Value::Float(x), Value::Int(y)) => {
            Value::Float(if y == 0 { 0.0 } else { x % y as f64 })
        }
        (Value::Float(x), Value::Float(y)) => {
            Value::Float(if y == 0.0 { 0.0 } else { x % y })
        }
        (a, b) => return Err(numeric_mismatch(a, b)),
    };
    m.push(out)
}

pub(super) fn neg(m: &mut Machine<'_>) -> Result<(), Fault> {
    let out = match m.pop()? {
        Value::Int(v) => Value::Int(v.wrapping_neg()),
        Value::Float(v) => Value::Float(-v),
        other => return Err(Fault::type_mismatch("number", other.tag_name())),
    };
    m.push(out)
}

pub(super) fn not(m: &mut Machine<'_>) -> Result<(), Fault> {
    let v = m.pop()?;
    m.push(Value::Int(!v.truthy() as i64))
}

pub(super) fn and(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    m.push(Value::Int((a.truthy() && b.truthy()) as i64))
}

pub(super) fn or(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    m.push(Value::Int((a.truthy() || b.truthy()) as i64))
}

pub(super) fn band(m: &mut Machine<'_>) -> Result<(), Fault> {
    let b = m.pop_int()?;
    let a = m.pop_int()?;
    m.push(Value::Int(a & b))
}

pub(super) fn bor(m: &mut Machine<'_>) -> Result<(), Fault> {
    let b = m.pop_int()?;
    let a = m.pop_int()?;
    m.push(Value::Int(a | b))
}

// -------------------------
// comparisons
// -------------------------

/// Equality across tags that share no promotion rule is simply false; no
/// coercion is attempted, so it is not a type error. Strings compare by
/// their resolved table contents, objects by handle.
fn values_equal(m: &Machine<'_>, a: Value, b: Value) -> Result<bool, Fault> {
    Ok(match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(x), Value::Float(y)) => (x as f64) == y,
        (Value::Float(x), Value::Int(y)) => x == (y as f64),
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => m.string(x)? == m.string(y)?,
        (Value::Object(x), Value::Object(y)) => x == y,
        (Value::Unset, Value::Unset) => true,
        _ => false,
    })
}

/// Ordering is defined for numbers (with promotion) and string pairs.
/// Anything else has no order and faults. `None` means an incomparable
/// numeric pair (NaN); the predicates treat that as false.
fn values_order(m: &Machine<'_>, a: Value, b: Value) -> Result<Option<Ordering>, Fault> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Some(x.cmp(&y))),
        (Value::Int(x), Value::Float(y)) => Ok((x as f64).partial_cmp(&y)),
        (Value::Float(x), Value::Int(y)) => Ok(x.partial_cmp(&(y as f64))),
        (Value::Float(x), Value::Float(y)) => Ok(x.partial_cmp(&y)),
        (Value::Str(x), Value::Str(y)) => Ok(Some(m.string(x)?.cmp(m.string(y)?))),
        (a, b) => {
            let found = if matches!(a, Value::Int(_) | Value::Float(_) | Value::Str(_)) {
                b.tag_name()
            } else {
                a.tag_name()
            };
            Err(Fault::type_mismatch("number or string", found))
        }
    }
}

pub(super) fn eq(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let res = values_equal(m, a, b)?;
    m.push(Value::Int(res as i64))
}

pub(super) fn ne(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let res = !values_equal(m, a, b)?;
    m.push(Value::Int(res as i64))
}

pub(super) fn lt(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let res = matches!(values_order(m, a, b)?, Some(Ordering::Less));
    m.push(Value::Int(res as i64))
}

pub(super) fn le(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let res = matches!(
        values_order(m, a, b)?,
        Some(Ordering::Less | Ordering::Equal)
    );
    m.push(Value::Int(res as i64))
}

pub(super) fn gt(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let res = matches!(values_order(m, a, b)?, Some(Ordering::Greater));
    m.push(Value::Int(res as i64))
}

pub(super) fn ge(m: &mut Machine<'_>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let res = matches!(
        values_order(m, a, b)?,
        Some(Ordering::Greater | Ordering::Equal)
    );
    m.push(Value::Int(res as i64))
}
