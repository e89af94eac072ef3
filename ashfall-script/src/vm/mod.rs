//! The VM instance and its engine-facing call protocol.
//!
//! One [`Vm`] is created per scripted object and owns that object's
//! execution state: globals, the data stack, the locals stack, and the
//! call-frame stack. The immutable [`Program`] and the
//! [`OpcodeRegistry`] are shared across instances via `Arc`.
//!
//! Calls are synchronous: `call` runs the fetch-decode-dispatch loop to
//! completion (return or fault) before handing control back. Faults are
//! call-scoped: they abandon the in-flight call chain, leave globals and
//! exports at their last-written values, and the instance stays callable.

mod machine;

pub(crate) use machine::Frame;
pub use machine::Machine;

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::config::VmConfig;
use crate::error::FaultInfo;
use crate::exports::ExportTable;
use crate::handler::OpcodeRegistry;
use crate::host::ScriptHost;
use crate::persist::VmSnapshot;
use crate::program::Program;
use crate::stack::ValueStack;
use crate::value::{ObjectId, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// Program bound, globals not yet initialized.
    Uninitialized,
    /// Idle, waiting for the engine to request a procedure.
    Ready,
    /// A dispatch loop is running. Never observed across `call` since calls
    /// are synchronous; sub-calls nest inside without changing it.
    Executing,
    /// The last call faulted. The instance still accepts calls; the fault
    /// is kept for diagnostics.
    Faulted,
}

/// Result of one engine-level `call`.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The procedure ran to completion; carries its return value if the
    /// procedure produced one.
    Returned(Option<Value>),
    /// The program has no such entry point. Routine; engine events probe
    /// many scripts that implement only a subset of procedures.
    Skipped,
    /// The call chain was abandoned mid-flight.
    Faulted(FaultInfo),
}

impl CallOutcome {
    pub fn is_fault(&self) -> bool {
        matches!(self, CallOutcome::Faulted(_))
    }

    /// The returned value, when there is one.
    pub fn value(&self) -> Option<Value> {
        match self {
            CallOutcome::Returned(v) => *v,
            _ => None,
        }
    }
}

/// One live execution context bound to a [`Program`] and an owning engine
/// object.
pub struct Vm {
    program: Arc<Program>,
    registry: Arc<OpcodeRegistry>,
    config: VmConfig,
    owner: ObjectId,

    state: VmState,
    globals: Vec<Value>,
    stack: ValueStack,
    locals: Vec<Value>,
    frames: Vec<Frame>,
    last_fault: Option<FaultInfo>,
}

impl Vm {
    /// Bind a program without initializing globals yet.
    pub fn new(
        program: Arc<Program>,
        registry: Arc<OpcodeRegistry>,
        config: VmConfig,
        owner: ObjectId,
    ) -> Vm {
        let stack = ValueStack::new(config.max_stack_depth);
        Vm {
            program,
            registry,
            config,
            owner,
            state: VmState::Uninitialized,
            globals: Vec::new(),
            stack,
            locals: Vec::new(),
            frames: Vec::new(),
            last_fault: None,
        }
    }

    /// Bind a program and initialize it: the usual way the engine attaches
    /// a script to an object.
    pub fn load(
        program: Arc<Program>,
        registry: Arc<OpcodeRegistry>,
        config: VmConfig,
        owner: ObjectId,
    ) -> Vm {
        let mut vm = Vm::new(program, registry, config, owner);
        vm.start();
        vm
    }

    /// Initialize global slots to their defaults and become callable.
    pub fn start(&mut self) {
        self.globals = vec![Value::Unset; self.program.global_count() as usize];
        self.last_fault = None;
        self.state = VmState::Ready;
        log::debug!(
            target: "script",
            "{}: instance ready for {} ({} globals)",
            self.program.name(),
            self.owner,
            self.globals.len()
        );
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Diagnostics for the most recent faulted call, if any.
    pub fn last_fault(&self) -> Option<&FaultInfo> {
        self.last_fault.as_ref()
    }

    pub fn has_procedure(&self, name: &str) -> bool {
        self.program.has_procedure(name)
    }

    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    /// Invoke a named procedure. Synchronous; returns when the procedure
    /// completes, faults, or turns out not to exist. A still-uninitialized
    /// instance starts itself first.
    pub fn call(
        &mut self,
        host: &mut dyn ScriptHost,
        exports: &mut ExportTable,
        name: &str,
    ) -> CallOutcome {
        self.call_with_args(host, exports, name, &[])
    }

    /// Like [`call`](Vm::call), binding `args` to the procedure's leading
    /// locals. The engine should pass exactly the procedure's declared
    /// argument count: fewer faults with a stack underflow, extras are
    /// discarded when the call returns.
    pub fn call_with_args(
        &mut self,
        host: &mut dyn ScriptHost,
        exports: &mut ExportTable,
        name: &str,
        args: &[Value],
    ) -> CallOutcome {
        if self.state == VmState::Uninitialized {
            self.start();
        }

        let Some(index) = self.program.procedure_index(name) else {
            log::trace!(
                target: "script",
                "{}: no {:?} entry point, skipping",
                self.program.name(),
                name
            );
            return CallOutcome::Skipped;
        };

        log::debug!(target: "script", "{}: call {:?}", self.program.name(), name);
        self.state = VmState::Executing;
        self.stack.clear();
        self.locals.clear();
        self.frames.clear();

        let (result, opcode, op_pc, innermost) = {
            let mut machine = Machine {
                program: &*self.program,
                registry: &*self.registry,
                config: &self.config,
                host,
                exports,
                globals: &mut self.globals,
                owner: self.owner,
                pc: 0,
                stack: &mut self.stack,
                locals: &mut self.locals,
                frames: &mut self.frames,
                finished: false,
                return_value: None,
                steps: 0,
                op_pc: 0,
                current_opcode: None,
            };

            let result = (|| {
                for v in args {
                    machine.push(*v)?;
                }
                machine.call_procedure(index)?;
                machine.run()
            })();
            let innermost = machine.frames.last().map(|f| f.procedure);
            (result, machine.current_opcode, machine.op_pc, innermost)
        };

        // Call-transient state never survives the call either way.
        self.stack.clear();
        self.locals.clear();
        self.frames.clear();

        match result {
            Ok(value) => {
                self.state = VmState::Ready;
                CallOutcome::Returned(value)
            }
            Err(fault) => {
                // Attribute the fault to the innermost procedure still on
                // the frame stack; for nested calls that is more precise
                // than the entry point the engine asked for.
                let procedure = innermost
                    .and_then(|i| self.program.procedure(i).ok())
                    .map(|entry| entry.name.clone())
                    .unwrap_or_else(|| name.to_owned());
                let info = FaultInfo {
                    procedure,
                    opcode,
                    mnemonic: opcode.and_then(|op| self.registry.mnemonic(op)),
                    pc: op_pc,
                    fault,
                };
                log::error!(target: "script", "{}: {}", self.program.name(), info);
                self.last_fault = Some(info.clone());
                self.state = VmState::Faulted;
                CallOutcome::Faulted(info)
            }
        }
    }

    /// Serializable record of this instance's persistent state: its
    /// non-default globals. Locals and stacks are call-transient and never
    /// captured; exports are snapshotted on the engine's [`ExportTable`].
    pub fn snapshot(&self) -> VmSnapshot {
        VmSnapshot {
            program: self.program.name().to_owned(),
            globals: self
                .globals
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_unset())
                .map(|(i, v)| (i as u16, *v))
                .collect(),
        }
    }

    /// Restore globals from a snapshot taken against the same program.
    pub fn restore(&mut self, snapshot: &VmSnapshot) -> Result<()> {
        if snapshot.program != self.program.name() {
            bail!(
                "snapshot is for program {:?}, this instance runs {:?}",
                snapshot.program,
                self.program.name()
            );
        }
        if self.state == VmState::Uninitialized {
            self.start();
        }

        for (index, _) in &snapshot.globals {
            if *index as usize >= self.globals.len() {
                bail!(
                    "snapshot global index {} out of range (program declares {})",
                    index,
                    self.globals.len()
                );
            }
        }

        for slot in &mut self.globals {
            *slot = Value::Unset;
        }
        for (index, value) in &snapshot.globals {
            self.globals[*index as usize] = *value;
        }

        self.last_fault = None;
        self.state = VmState::Ready;
        Ok(())
    }
}
