use anyhow::Result;

use crate::value::{ObjectId, Value};

/// The engine-side surface opcode handlers call into.
///
/// This is the only path from a running script to game state: there is no
/// ambient "current game" lookup. The engine passes an implementation into
/// every [`Vm::call`](crate::vm::Vm::call); handlers receive it through the
/// [`Machine`](crate::vm::Machine).
///
/// Any error returned here becomes a call-scoped
/// [`Fault::EngineCallbackFailed`](crate::error::Fault): the script call is
/// abandoned, the engine keeps running.
pub trait ScriptHost {
    /// Is the handle still backed by a live object?
    fn object_exists(&self, object: ObjectId) -> bool;

    fn get_property(&mut self, object: ObjectId, property: u16) -> Result<Value>;

    fn set_property(&mut self, object: ObjectId, property: u16, value: Value) -> Result<()>;

    /// Create an object from a prototype id; returns its handle.
    fn spawn_object(&mut self, prototype: i64) -> Result<ObjectId>;

    fn destroy_object(&mut self, object: ObjectId) -> Result<()>;

    /// Everything else a domain opcode may mean: open a door, query the
    /// game clock, play a line of dialogue. The VM treats the id and the
    /// result as opaque.
    fn action(&mut self, action: u16, args: &[Value]) -> Result<Value>;
}
