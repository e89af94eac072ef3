use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::error::Fault;

/// One entry-point of a program: a named procedure.
///
/// `arg_count` and `local_count` are fixed by the compiler; a call frame
/// validates local indices against `arg_count + local_count` of the
/// procedure it entered, never against any other procedure's counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureEntry {
    pub name: String,
    /// Absolute byte offset of the first opcode in the instruction stream.
    pub offset: u32,
    pub arg_count: u8,
    pub local_count: u8,
}

/// What the external loader hands us: the decoded pieces of one compiled
/// script file. The container layout those pieces came from is the loader's
/// business; the VM only sees this struct.
#[derive(Debug, Clone, Default)]
pub struct ProgramParts {
    /// Source file name, kept for diagnostics and snapshot matching.
    pub name: String,
    /// The linear instruction stream: big-endian u16 opcodes plus inline
    /// operands, widths fixed per opcode.
    pub code: Vec<u8>,
    /// String/identifier table referenced by `Value::Str` and by the
    /// export opcodes.
    pub strings: Vec<String>,
    pub procedures: Vec<ProcedureEntry>,
    pub global_count: u16,
    /// Number of exports the script is expected to declare. A capacity
    /// hint; declaration itself happens at run time.
    pub export_count: u16,
}

/// An immutable, validated program. One `Arc<Program>` is shared by every
/// VM instance spawned from the same compiled file.
#[derive(Debug)]
pub struct Program {
    name: String,
    code: Vec<u8>,
    strings: Vec<String>,
    procedures: Vec<ProcedureEntry>,
    by_name: HashMap<String, u16>,
    global_count: u16,
    export_count: u16,
}

impl Program {
    /// Validate loader output and freeze it.
    ///
    /// Rejects entry offsets outside the instruction stream, duplicate
    /// procedure names, and a procedure table too large to index with the
    /// call opcode's u16 operand.
    pub fn from_parts(parts: ProgramParts) -> Result<Program> {
        if parts.procedures.len() > u16::MAX as usize {
            bail!(
                "{}: too many procedures: {}",
                parts.name,
                parts.procedures.len()
            );
        }

        let mut by_name = HashMap::with_capacity(parts.procedures.len());
        for (idx, proc) in parts.procedures.iter().enumerate() {
            if proc.offset as usize >= parts.code.len() {
                bail!(
                    "{}: procedure {:?} entry offset 0x{:X} outside code (len=0x{:X})",
                    parts.name,
                    proc.name,
                    proc.offset,
                    parts.code.len()
                );
            }
            if by_name.insert(proc.name.clone(), idx as u16).is_some() {
                bail!("{}: duplicate procedure name {:?}", parts.name, proc.name);
            }
        }

        log::debug!(
            target: "script",
            "loaded program {:?}: {} procedures, {} globals, {} strings",
            parts.name,
            parts.procedures.len(),
            parts.global_count,
            parts.strings.len()
        );

        Ok(Program {
            name: parts.name,
            code: parts.code,
            strings: parts.strings,
            procedures: parts.procedures,
            by_name,
            global_count: parts.global_count,
            export_count: parts.export_count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn global_count(&self) -> u16 {
        self.global_count
    }

    pub fn export_count(&self) -> u16 {
        self.export_count
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Resolve a string-table reference.
    pub fn string(&self, id: u32) -> Result<&str, Fault> {
        self.strings
            .get(id as usize)
            .map(String::as_str)
            .ok_or(Fault::BadStringRef {
                index: id,
                limit: self.strings.len() as u32,
            })
    }

    pub fn procedures(&self) -> &[ProcedureEntry] {
        &self.procedures
    }

    pub fn procedure(&self, index: u16) -> Result<&ProcedureEntry, Fault> {
        self.procedures
            .get(index as usize)
            .ok_or(Fault::UnknownProcedure { index })
    }

    /// Entry-point lookup. A miss means "this script does not implement
    /// that procedure" and is routine, so this returns an `Option`, not an
    /// error.
    pub fn procedure_index(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    pub fn has_procedure(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}
