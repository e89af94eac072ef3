//! Opcode handler registry and the dispatch contract.
//!
//! Every instruction kind is one entry in a fixed table keyed by its 16-bit
//! code. A handler reads its inline operands through the
//! [`Machine`](crate::vm::Machine) readers (advancing the pc by exactly the
//! width it consumes) and/or pops stack operands, performs its effect, and
//! pushes at most one result. The operand encoding is fixed per opcode and
//! documented by that opcode, not discoverable at runtime.
//!
//! A handler fails by returning a [`Fault`]; the dispatch loop turns that
//! into a call-scoped abort. Fetching a code with no registered handler is
//! [`Fault::UnknownOpcode`], surfaced loudly: it means the program and the
//! interpreter disagree about the instruction set.

mod base;
mod world;

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::error::Fault;
use crate::opcode;
use crate::vm::Machine;

/// One opcode's behavior.
pub type HandlerFn = fn(&mut Machine<'_>) -> Result<(), Fault>;

pub struct OpcodeDef {
    /// Mnemonic used in traces and fault reports.
    pub mnemonic: &'static str,
    pub run: HandlerFn,
}

/// Dispatch table: 16-bit opcode -> handler.
pub struct OpcodeRegistry {
    table: HashMap<u16, OpcodeDef>,
}

impl OpcodeRegistry {
    /// An empty registry. Most engines want [`OpcodeRegistry::core`].
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// The built-in instruction set: stack, constants, variables,
    /// arithmetic, comparisons, control flow, and the engine-forwarding
    /// block.
    pub fn core() -> Self {
        let mut registry = Self::new();
        for &(code, mnemonic, run) in CORE_OPCODES {
            registry.table.insert(code, OpcodeDef { mnemonic, run });
        }
        registry
    }

    /// Add an engine-defined opcode. Codes are fixed at load time, so a
    /// duplicate registration is a setup bug, not something to resolve at
    /// runtime.
    pub fn register(&mut self, code: u16, mnemonic: &'static str, run: HandlerFn) -> Result<()> {
        if let Some(existing) = self.table.get(&code) {
            bail!(
                "opcode 0x{:04X} already registered as {:?}",
                code,
                existing.mnemonic
            );
        }
        self.table.insert(code, OpcodeDef { mnemonic, run });
        Ok(())
    }

    pub fn lookup(&self, code: u16) -> Option<&OpcodeDef> {
        self.table.get(&code)
    }

    pub fn mnemonic(&self, code: u16) -> Option<&'static str> {
        self.table.get(&code).map(|def| def.mnemonic)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for OpcodeRegistry {
    fn default() -> Self {
        Self::core()
    }
}

const CORE_OPCODES: &[(u16, &str, HandlerFn)] = &[
    // control
    (opcode::NOP, "nop", base::nop),
    (opcode::JMP, "jmp", base::jmp),
    (opcode::JZ, "jz", base::jz),
    (opcode::CALL, "call", base::call),
    (opcode::RET, "ret", base::ret),
    (opcode::RETV, "retv", base::retv),
    (opcode::POP, "pop", base::pop),
    (opcode::DUP, "dup", base::dup),
    (opcode::SWAP, "swap", base::swap),
    // constants
    (opcode::PUSH_INT, "push_int", base::push_int),
    (opcode::PUSH_FLOAT, "push_float", base::push_float),
    (opcode::PUSH_STR, "push_str", base::push_str),
    (opcode::PUSH_UNSET, "push_unset", base::push_unset),
    (opcode::PUSH_SELF, "push_self", base::push_self),
    // variables
    (opcode::GET_GLOBAL, "get_global", base::get_global),
    (opcode::SET_GLOBAL, "set_global", base::set_global),
    (opcode::GET_LOCAL, "get_local", base::get_local),
    (opcode::SET_LOCAL, "set_local", base::set_local),
    (opcode::EXPORT_VAR, "export_var", base::export_var),
    (opcode::GET_EXPORT, "get_export", base::get_export),
    (opcode::SET_EXPORT, "set_export", base::set_export),
    // arithmetic / logic
    (opcode::ADD, "add", base::add),
    (opcode::SUB, "sub", base::sub),
    (opcode::MUL, "mul", base::mul),
    (opcode::DIV, "div", base::div),
    (opcode::MOD, "mod", base::modulo),
    (opcode::NEG, "neg", base::neg),
    (opcode::NOT, "not", base::not),
    (opcode::AND, "and", base::and),
    (opcode::OR, "or", base::or),
    (opcode::BAND, "band", base::band),
    (opcode::BOR, "bor", base::bor),
    // comparisons
    (opcode::EQ, "eq", base::eq),
    (opcode::NE, "ne", base::ne),
    (opcode::LT, "lt", base::lt),
    (opcode::LE, "le", base::le),
    (opcode::GT, "gt", base::gt),
    (opcode::GE, "ge", base::ge),
    // engine-forwarding
    (opcode::GET_PROP, "get_prop", world::get_prop),
    (opcode::SET_PROP, "set_prop", world::set_prop),
    (opcode::SPAWN, "spawn", world::spawn),
    (opcode::DESTROY, "destroy", world::destroy),
    (opcode::OBJ_EXISTS, "obj_exists", world::obj_exists),
    (opcode::ACTION, "action", world::action),
];
