//! Developer-facing utilities for exercising the VM in isolation.
//!
//! This is intentionally a module (not `src/bin/...`) so it can be reused
//! from unit tests, the crate's integration tests, and other workspace
//! crates. Real programs come from the script compiler; these helpers emit
//! raw instruction bytes for small fixtures.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::host::ScriptHost;
use crate::program::{ProcedureEntry, Program, ProgramParts};
use crate::value::{ObjectId, Value};

/// A host that answers everything with nothing. Stands in for the engine
/// when a test only cares about machine-internal behavior.
pub struct NullHost;

impl ScriptHost for NullHost {
    fn object_exists(&self, _object: ObjectId) -> bool {
        false
    }

    fn get_property(&mut self, _object: ObjectId, _property: u16) -> Result<Value> {
        Ok(Value::Unset)
    }

    fn set_property(&mut self, _object: ObjectId, _property: u16, _value: Value) -> Result<()> {
        Ok(())
    }

    fn spawn_object(&mut self, _prototype: i64) -> Result<ObjectId> {
        Ok(ObjectId(0))
    }

    fn destroy_object(&mut self, _object: ObjectId) -> Result<()> {
        Ok(())
    }

    fn action(&mut self, _action: u16, _args: &[Value]) -> Result<Value> {
        Ok(Value::Unset)
    }
}

/// A tiny in-memory world: objects with numbered properties, plus a log of
/// action calls. Enough to test every engine-forwarding handler.
#[derive(Default)]
pub struct ScratchWorld {
    pub objects: HashMap<ObjectId, HashMap<u16, Value>>,
    pub actions: Vec<(u16, Vec<Value>)>,
    pub action_result: Value,
    next_object: u64,
}

impl ScratchWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self) -> ObjectId {
        self.next_object += 1;
        let id = ObjectId(self.next_object);
        self.objects.insert(id, HashMap::new());
        id
    }
}

impl ScriptHost for ScratchWorld {
    fn object_exists(&self, object: ObjectId) -> bool {
        self.objects.contains_key(&object)
    }

    fn get_property(&mut self, object: ObjectId, property: u16) -> Result<Value> {
        match self.objects.get(&object) {
            Some(props) => Ok(props.get(&property).copied().unwrap_or(Value::Unset)),
            None => bail!("no such object: {}", object),
        }
    }

    fn set_property(&mut self, object: ObjectId, property: u16, value: Value) -> Result<()> {
        match self.objects.get_mut(&object) {
            Some(props) => {
                props.insert(property, value);
                Ok(())
            }
            None => bail!("no such object: {}", object),
        }
    }

    fn spawn_object(&mut self, prototype: i64) -> Result<ObjectId> {
        let id = self.add_object();
        if let Some(props) = self.objects.get_mut(&id) {
            props.insert(0, Value::Int(prototype));
        }
        Ok(id)
    }

    fn destroy_object(&mut self, object: ObjectId) -> Result<()> {
        if self.objects.remove(&object).is_none() {
            bail!("destroying unknown object: {}", object);
        }
        Ok(())
    }

    fn action(&mut self, action: u16, args: &[Value]) -> Result<Value> {
        self.actions.push((action, args.to_vec()));
        Ok(self.action_result)
    }
}

/// Raw instruction emitter for fixtures: big-endian, widths matching the
/// opcode table.
#[derive(Debug, Default, Clone)]
pub struct CodeBuf {
    bytes: Vec<u8>,
}

impl CodeBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn op(&mut self, code: u16) -> &mut Self {
        self.put_u16(code)
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.bytes.push(v);
        self
    }

    pub fn put_u16(&mut self, v: u16) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_i32(&mut self, v: i32) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_f64(&mut self, v: f64) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_be_bytes());
        self
    }
}

/// Procedure fixture: name, declared argument count, declared local count,
/// code body.
pub struct ProcFixture<'a> {
    pub name: &'a str,
    pub arg_count: u8,
    pub local_count: u8,
    pub code: CodeBuf,
}

impl<'a> ProcFixture<'a> {
    pub fn new(name: &'a str, arg_count: u8, local_count: u8, code: CodeBuf) -> Self {
        Self {
            name,
            arg_count,
            local_count,
            code,
        }
    }
}

/// Concatenate procedure bodies into one instruction stream and wrap it as
/// a validated [`Program`].
pub fn build_program(
    name: &str,
    procs: Vec<ProcFixture<'_>>,
    strings: &[&str],
    global_count: u16,
) -> Result<Arc<Program>> {
    let mut code = Vec::new();
    let mut procedures = Vec::with_capacity(procs.len());
    for p in procs {
        procedures.push(ProcedureEntry {
            name: p.name.to_owned(),
            offset: code.len() as u32,
            arg_count: p.arg_count,
            local_count: p.local_count,
        });
        code.extend_from_slice(&p.code.into_bytes());
    }

    let program = Program::from_parts(ProgramParts {
        name: name.to_owned(),
        code,
        strings: strings.iter().map(|s| (*s).to_owned()).collect(),
        procedures,
        global_count,
        export_count: 0,
    })?;
    Ok(Arc::new(program))
}
