//! Handlers that forward into the engine through [`ScriptHost`].
//!
//! These carry no game logic of their own: they unpack operands, cross the
//! host boundary, and push whatever comes back. A host error becomes a
//! call-scoped `EngineCallbackFailed` fault.
//!
//! [`ScriptHost`]: crate::host::ScriptHost

use crate::error::Fault;
use crate::value::{ObjectId, Value};
use crate::vm::Machine;

/// Pop an object operand that must actually name an object.
fn pop_object_required(m: &mut Machine<'_>) -> Result<ObjectId, Fault> {
    m.pop_object()?
        .ok_or(Fault::type_mismatch("object", "null object"))
}

/// `GET_PROP prop:u16`: pops an object, pushes the property value.
pub(super) fn get_prop(m: &mut Machine<'_>) -> Result<(), Fault> {
    let property = m.read_u16()?;
    let object = pop_object_required(m)?;
    let value = m
        .host()
        .get_property(object, property)
        .map_err(|e| Fault::engine("get_property", e))?;
    m.push(value)
}

/// `SET_PROP prop:u16`: pops the value, then the object.
pub(super) fn set_prop(m: &mut Machine<'_>) -> Result<(), Fault> {
    let property = m.read_u16()?;
    let value = m.pop()?;
    let object = pop_object_required(m)?;
    m.host()
        .set_property(object, property, value)
        .map_err(|e| Fault::engine("set_property", e))
}

/// `SPAWN`: pops a prototype id, pushes the new object's handle.
pub(super) fn spawn(m: &mut Machine<'_>) -> Result<(), Fault> {
    let prototype = m.pop_int()?;
    let object = m
        .host()
        .spawn_object(prototype)
        .map_err(|e| Fault::engine("spawn_object", e))?;
    m.push(Value::Object(Some(object)))
}

/// `DESTROY`: pops an object.
pub(super) fn destroy(m: &mut Machine<'_>) -> Result<(), Fault> {
    let object = pop_object_required(m)?;
    m.host()
        .destroy_object(object)
        .map_err(|e| Fault::engine("destroy_object", e))
}

/// `OBJ_EXISTS`: pops an object handle (null allowed), pushes 0/1.
/// The one place a script can test a handle without risking a fault.
pub(super) fn obj_exists(m: &mut Machine<'_>) -> Result<(), Fault> {
    let exists = match m.pop_object()? {
        Some(object) => m.host().object_exists(object),
        None => false,
    };
    m.push(Value::Int(exists as i64))
}

/// `ACTION action:u16 argc:u8`: pops `argc` arguments (first-pushed
/// first in the slice), pushes the host's result. Void actions return
/// `Unset`; the compiled code pops it when the result is unused.
pub(super) fn action(m: &mut Machine<'_>) -> Result<(), Fault> {
    let id = m.read_u16()?;
    let argc = m.read_u8()? as usize;

    let mut args = Vec::with_capacity(argc);
    for _ in 0..argc {
        args.push(m.pop()?);
    }
    args.reverse();

    let ret = m
        .host()
        .action(id, &args)
        .map_err(|e| Fault::engine("action", e))?;
    m.push(ret)
}
