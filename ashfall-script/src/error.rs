use std::fmt;

/// Which variable store an out-of-range index was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    Global,
    Local,
}

impl fmt::Display for VarScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarScope::Global => write!(f, "global"),
            VarScope::Local => write!(f, "local"),
        }
    }
}

/// A call-scoped fault.
///
/// Every variant aborts only the call chain it occurs in: the VM instance
/// stays usable, globals and exports keep their last-written values, and the
/// engine keeps running. None of these are recovered silently; the dispatch
/// loop reports each one with full opcode context before returning control.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Fault {
    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack overflow (limit={limit})")]
    StackOverflow { limit: usize },

    #[error("call stack underflow")]
    CallStackUnderflow,

    #[error("call depth exceeded (limit={limit})")]
    CallStackOverflow { limit: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown opcode 0x{opcode:04X} at pc=0x{pc:X}")]
    UnknownOpcode { opcode: u16, pc: u32 },

    #[error("unknown procedure index {index}")]
    UnknownProcedure { index: u16 },

    #[error("{scope} variable index out of range: idx={index}, limit={limit}")]
    VariableIndexOutOfRange {
        scope: VarScope,
        index: u16,
        limit: u16,
    },

    #[error("string ref out of range: idx={index}, strings={limit}")]
    BadStringRef { index: u32, limit: u32 },

    #[error("export {name:?} has not been declared")]
    UndeclaredExport { name: String },

    #[error("execution budget exceeded ({budget} steps)")]
    ExecutionBudgetExceeded { budget: u64 },

    #[error("engine callback {what} failed: {message}")]
    EngineCallbackFailed {
        what: &'static str,
        message: String,
    },

    #[error("pc out of range: pc=0x{pc:X}, code_len=0x{len:X}")]
    PcOutOfRange { pc: u32, len: u32 },
}

impl Fault {
    /// Wrap an error surfaced by a [`ScriptHost`](crate::host::ScriptHost)
    /// callback. The error is rendered eagerly so faults stay cheap to clone
    /// and compare.
    pub(crate) fn engine(what: &'static str, err: anyhow::Error) -> Fault {
        Fault::EngineCallbackFailed {
            what,
            message: format!("{err:#}"),
        }
    }

    pub(crate) fn type_mismatch(expected: &'static str, found: &'static str) -> Fault {
        Fault::TypeMismatch { expected, found }
    }
}

/// Diagnostic record of a faulted call: which procedure, which opcode, where.
///
/// Stored on the VM instance (`last_fault`) and returned to the caller inside
/// [`CallOutcome::Faulted`](crate::vm::CallOutcome).
#[derive(Debug, Clone, PartialEq)]
pub struct FaultInfo {
    /// Innermost procedure that was executing; the entry point the engine
    /// asked for when no frame survives to tell.
    pub procedure: String,
    /// Opcode being executed when the fault hit, if one was fetched.
    pub opcode: Option<u16>,
    /// Mnemonic of that opcode, when the registry knows it.
    pub mnemonic: Option<&'static str>,
    /// Program counter of the faulting instruction's opcode word.
    pub pc: u32,
    pub fault: Fault,
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault in {:?} at pc=0x{:X}", self.procedure, self.pc)?;
        match (self.opcode, self.mnemonic) {
            (Some(op), Some(m)) => write!(f, " [{:04X} {}]", op, m)?,
            (Some(op), None) => write!(f, " [{:04X}]", op)?,
            _ => {}
        }
        write!(f, ": {}", self.fault)
    }
}
