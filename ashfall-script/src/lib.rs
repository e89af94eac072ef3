//! ashfall-script
//!
//! The Ashfall engine's scripting VM: a stack machine executing compiled
//! bytecode programs attached to in-game objects. The engine drives it by
//! calling named procedures in response to gameplay events (map enter,
//! update tick, use, look-at, ...); opcode handlers call back into the
//! engine through the [`host::ScriptHost`] surface.
//!
//! This crate does not parse compiled script containers; an external loader
//! supplies [`program::ProgramParts`] and receives a validated, shareable
//! [`program::Program`].

pub mod config;
pub mod error;
pub mod exports;
pub mod handler;
pub mod host;
pub mod opcode;
pub mod persist;
pub mod program;
pub mod stack;
pub mod value;
pub mod vm;

/// Local developer utilities (kept as a module, not a binary).
pub mod test;

pub use config::VmConfig;
pub use error::{Fault, FaultInfo, VarScope};
pub use exports::ExportTable;
pub use handler::{HandlerFn, OpcodeDef, OpcodeRegistry};
pub use host::ScriptHost;
pub use persist::VmSnapshot;
pub use program::{ProcedureEntry, Program, ProgramParts};
pub use stack::ValueStack;
pub use value::{ObjectId, Value};
pub use vm::{CallOutcome, Machine, Vm, VmState};
