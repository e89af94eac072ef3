use byteorder::{BigEndian, ByteOrder};

use crate::config::VmConfig;
use crate::error::{Fault, VarScope};
use crate::exports::ExportTable;
use crate::handler::OpcodeRegistry;
use crate::host::ScriptHost;
use crate::program::Program;
use crate::stack::ValueStack;
use crate::value::{ObjectId, Value};

/// Bookkeeping for one in-flight procedure invocation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    /// Where to resume in the caller. Unused for the root frame: popping it
    /// ends the call.
    pub return_pc: u32,
    /// Data-stack depth at call time (after the callee's arguments were
    /// consumed). `ret` cuts the stack back to exactly this depth before
    /// pushing the return value, so callers never see callee-internal
    /// operands.
    pub saved_stack_depth: u32,
    /// First slot of this frame's region on the locals stack.
    pub locals_base: u32,
    /// Size of the region: the procedure's argument slots plus its declared
    /// locals. Local indices validate against this and nothing else.
    pub local_count: u16,
    /// Procedure-table index, for diagnostics.
    pub procedure: u16,
}

/// The execution context handed to opcode handlers: one engine-level call in
/// flight on one VM instance.
///
/// Everything a handler may touch goes through this type: operand reads
/// (which advance the program counter by exactly the width consumed), the
/// data stack, the three variable scopes, control transfers, and the engine
/// host. There is no other way to reach game state from a handler.
pub struct Machine<'a> {
    pub(crate) program: &'a Program,
    pub(crate) registry: &'a OpcodeRegistry,
    pub(crate) config: &'a VmConfig,
    pub(crate) host: &'a mut dyn ScriptHost,
    pub(crate) exports: &'a mut ExportTable,
    pub(crate) globals: &'a mut Vec<Value>,
    pub(crate) owner: ObjectId,

    pub(crate) pc: u32,
    pub(crate) stack: &'a mut ValueStack,
    pub(crate) locals: &'a mut Vec<Value>,
    pub(crate) frames: &'a mut Vec<Frame>,

    /// Set when the root frame returns; ends the dispatch loop.
    pub(crate) finished: bool,
    pub(crate) return_value: Option<Value>,

    pub(crate) steps: u64,
    /// pc of the opcode word currently executing (for fault reports).
    pub(crate) op_pc: u32,
    pub(crate) current_opcode: Option<u16>,
}

impl<'a> Machine<'a> {
    // -------------------------
    // Inline operand readers
    // -------------------------

    fn ensure(&self, need: u32) -> Result<(), Fault> {
        let len = self.program.code().len() as u32;
        if self.pc.saturating_add(need) > len {
            return Err(Fault::PcOutOfRange { pc: self.pc, len });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, Fault> {
        self.ensure(1)?;
        let b = self.program.code()[self.pc as usize];
        self.pc += 1;
        Ok(b)
    }

    pub fn read_i8(&mut self) -> Result<i8, Fault> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, Fault> {
        self.ensure(2)?;
        let off = self.pc as usize;
        let v = BigEndian::read_u16(&self.program.code()[off..off + 2]);
        self.pc += 2;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> Result<i16, Fault> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, Fault> {
        self.ensure(4)?;
        let off = self.pc as usize;
        let v = BigEndian::read_u32(&self.program.code()[off..off + 4]);
        self.pc += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32, Fault> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f64(&mut self) -> Result<f64, Fault> {
        self.ensure(8)?;
        let off = self.pc as usize;
        let v = BigEndian::read_f64(&self.program.code()[off..off + 8]);
        self.pc += 8;
        Ok(v)
    }

    // -------------------------
    // Data stack
    // -------------------------

    pub fn push(&mut self, v: Value) -> Result<(), Fault> {
        self.stack.push(v)
    }

    pub fn pop(&mut self) -> Result<Value, Fault> {
        self.stack.pop()
    }

    pub fn pop_int(&mut self) -> Result<i64, Fault> {
        self.stack.pop_int()
    }

    pub fn pop_float(&mut self) -> Result<f64, Fault> {
        self.stack.pop_float()
    }

    pub fn pop_object(&mut self) -> Result<Option<ObjectId>, Fault> {
        self.stack.pop_object()
    }

    pub fn pop_str(&mut self) -> Result<u32, Fault> {
        self.stack.pop_str()
    }

    pub fn top(&self) -> Option<&Value> {
        self.stack.top()
    }

    pub fn peek(&self, n: usize) -> Option<&Value> {
        self.stack.peek(n)
    }

    // -------------------------
    // Variables & program data
    // -------------------------

    pub fn string(&self, id: u32) -> Result<&'a str, Fault> {
        self.program.string(id)
    }

    /// Handle of the object this VM instance is attached to.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    pub fn exports(&mut self) -> &mut ExportTable {
        self.exports
    }

    pub fn host(&mut self) -> &mut dyn ScriptHost {
        self.host
    }

    pub fn global(&self, index: u16) -> Result<Value, Fault> {
        self.globals
            .get(index as usize)
            .copied()
            .ok_or(Fault::VariableIndexOutOfRange {
                scope: VarScope::Global,
                index,
                limit: self.globals.len() as u16,
            })
    }

    pub fn set_global(&mut self, index: u16, value: Value) -> Result<(), Fault> {
        let limit = self.globals.len() as u16;
        match self.globals.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Fault::VariableIndexOutOfRange {
                scope: VarScope::Global,
                index,
                limit,
            }),
        }
    }

    fn frame(&self) -> Result<&Frame, Fault> {
        self.frames.last().ok_or(Fault::CallStackUnderflow)
    }

    pub fn local(&self, index: u16) -> Result<Value, Fault> {
        let frame = self.frame()?;
        if index >= frame.local_count {
            return Err(Fault::VariableIndexOutOfRange {
                scope: VarScope::Local,
                index,
                limit: frame.local_count,
            });
        }
        Ok(self.locals[frame.locals_base as usize + index as usize])
    }

    pub fn set_local(&mut self, index: u16, value: Value) -> Result<(), Fault> {
        let frame = *self.frame()?;
        if index >= frame.local_count {
            return Err(Fault::VariableIndexOutOfRange {
                scope: VarScope::Local,
                index,
                limit: frame.local_count,
            });
        }
        self.locals[frame.locals_base as usize + index as usize] = value;
        Ok(())
    }

    // -------------------------
    // Control transfers
    // -------------------------

    pub fn jump(&mut self, target: u32) {
        self.pc = target;
    }

    /// Enter a procedure: pop its arguments into a fresh locals region,
    /// push a frame, move the pc to the entry offset. The first-pushed
    /// argument becomes local 0.
    pub fn call_procedure(&mut self, index: u16) -> Result<(), Fault> {
        let (offset, arg_count, local_count) = {
            let entry = self.program.procedure(index)?;
            (entry.offset, entry.arg_count, entry.local_count)
        };
        if self.frames.len() >= self.config.max_call_depth {
            return Err(Fault::CallStackOverflow {
                limit: self.config.max_call_depth,
            });
        }

        let mut args = Vec::with_capacity(arg_count as usize);
        for _ in 0..arg_count {
            args.push(self.stack.pop()?);
        }
        args.reverse();

        self.frames.push(Frame {
            return_pc: self.pc,
            saved_stack_depth: self.stack.len() as u32,
            locals_base: self.locals.len() as u32,
            local_count: arg_count as u16 + local_count as u16,
            procedure: index,
        });

        self.locals.extend(args);
        self.locals
            .extend(std::iter::repeat(Value::Unset).take(local_count as usize));

        self.pc = offset;
        Ok(())
    }

    /// Leave the active procedure. Releases its locals region, restores the
    /// data stack to its depth at call time, and pushes `value` for the
    /// caller (or hands it to the engine when the root frame returns).
    pub fn ret(&mut self, value: Option<Value>) -> Result<(), Fault> {
        let frame = self.frames.pop().ok_or(Fault::CallStackUnderflow)?;
        self.locals.truncate(frame.locals_base as usize);
        self.stack.truncate(frame.saved_stack_depth as usize);

        if self.frames.is_empty() {
            self.finished = true;
            self.return_value = value;
            return Ok(());
        }

        self.pc = frame.return_pc;
        if let Some(v) = value {
            self.stack.push(v)?;
        }
        Ok(())
    }

    // -------------------------
    // Dispatch loop
    // -------------------------

    /// Fetch-decode-dispatch until the root frame returns or a fault hits.
    pub(crate) fn run(&mut self) -> Result<Option<Value>, Fault> {
        while !self.finished {
            if self.steps >= self.config.step_budget {
                return Err(Fault::ExecutionBudgetExceeded {
                    budget: self.config.step_budget,
                });
            }
            self.steps += 1;

            self.op_pc = self.pc;
            let opcode = self.read_u16()?;
            self.current_opcode = Some(opcode);

            let registry = self.registry;
            let def = registry.lookup(opcode).ok_or(Fault::UnknownOpcode {
                opcode,
                pc: self.op_pc,
            })?;
            log::trace!(
                target: "script",
                "pc=0x{:06X} [{:04X}] {}",
                self.op_pc,
                opcode,
                def.mnemonic
            );
            (def.run)(self)?;
        }
        Ok(self.return_value.take())
    }
}
