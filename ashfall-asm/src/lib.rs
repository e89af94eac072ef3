//! ashfall-asm
//!
//! Programmatic assembler for Ashfall script programs. Plays the role of
//! the script compiler's backend: you describe procedures with an
//! instruction-level builder (labels included), and get back the
//! [`ProgramParts`] image the VM loads. Branch targets and cross-procedure
//! calls are symbolic while building and resolved in a two-pass layout,
//! so test fixtures and tools never hand-compute byte offsets.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};

use ashfall_script::opcode;
use ashfall_script::{ProcedureEntry, Program, ProgramParts};

/// A branch target inside one procedure. Create with
/// [`ProcedureBuilder::label`], place with [`ProcedureBuilder::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone)]
enum Inst {
    /// Bare opcode, no inline operands.
    Simple(u16),
    /// `jmp`/`jz` with a symbolic target.
    Branch { code: u16, target: Label },
    /// `call` by procedure name; resolved to a table index at assembly.
    CallNamed(String),
    PushInt(i32),
    PushFloat(f64),
    /// Opcode with a u32 string-id operand; the string is interned at
    /// assembly.
    StrOp { code: u16, text: String },
    /// Opcode with a u16 slot/property operand.
    SlotOp { code: u16, slot: u16 },
    Action { id: u16, argc: u8 },
    /// Zero-width label marker.
    BindLabel(Label),
}

fn inst_size(inst: &Inst) -> u32 {
    match inst {
        Inst::Simple(_) => 2,
        Inst::Branch { .. } => 6,
        Inst::CallNamed(_) => 4,
        Inst::PushInt(_) => 6,
        Inst::PushFloat(_) => 10,
        Inst::StrOp { .. } => 6,
        Inst::SlotOp { .. } => 4,
        Inst::Action { .. } => 5,
        Inst::BindLabel(_) => 0,
    }
}

/// Builds one procedure's body.
pub struct ProcedureBuilder {
    name: String,
    arg_count: u8,
    local_count: u8,
    insts: Vec<Inst>,
    next_label: usize,
}

impl ProcedureBuilder {
    pub fn new(name: &str, arg_count: u8, local_count: u8) -> Self {
        Self {
            name: name.to_owned(),
            arg_count,
            local_count,
            insts: Vec::new(),
            next_label: 0,
        }
    }

    pub fn label(&mut self) -> Label {
        let l = Label(self.next_label);
        self.next_label += 1;
        l
    }

    /// Place a label at the current position. Binding the same label twice
    /// is rejected at assembly.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.insts.push(Inst::BindLabel(label));
        self
    }

    fn simple(&mut self, code: u16) -> &mut Self {
        self.insts.push(Inst::Simple(code));
        self
    }

    // control

    pub fn nop(&mut self) -> &mut Self {
        self.simple(opcode::NOP)
    }

    pub fn jmp(&mut self, target: Label) -> &mut Self {
        self.insts.push(Inst::Branch {
            code: opcode::JMP,
            target,
        });
        self
    }

    pub fn jz(&mut self, target: Label) -> &mut Self {
        self.insts.push(Inst::Branch {
            code: opcode::JZ,
            target,
        });
        self
    }

    pub fn call(&mut self, procedure: &str) -> &mut Self {
        self.insts.push(Inst::CallNamed(procedure.to_owned()));
        self
    }

    pub fn ret(&mut self) -> &mut Self {
        self.simple(opcode::RET)
    }

    pub fn retv(&mut self) -> &mut Self {
        self.simple(opcode::RETV)
    }

    pub fn pop(&mut self) -> &mut Self {
        self.simple(opcode::POP)
    }

    pub fn dup(&mut self) -> &mut Self {
        self.simple(opcode::DUP)
    }

    pub fn swap(&mut self) -> &mut Self {
        self.simple(opcode::SWAP)
    }

    // constants

    pub fn push_int(&mut self, v: i32) -> &mut Self {
        self.insts.push(Inst::PushInt(v));
        self
    }

    pub fn push_float(&mut self, v: f64) -> &mut Self {
        self.insts.push(Inst::PushFloat(v));
        self
    }

    pub fn push_str(&mut self, text: &str) -> &mut Self {
        self.insts.push(Inst::StrOp {
            code: opcode::PUSH_STR,
            text: text.to_owned(),
        });
        self
    }

    pub fn push_unset(&mut self) -> &mut Self {
        self.simple(opcode::PUSH_UNSET)
    }

    pub fn push_self(&mut self) -> &mut Self {
        self.simple(opcode::PUSH_SELF)
    }

    // variables

    pub fn get_global(&mut self, slot: u16) -> &mut Self {
        self.insts.push(Inst::SlotOp {
            code: opcode::GET_GLOBAL,
            slot,
        });
        self
    }

    pub fn set_global(&mut self, slot: u16) -> &mut Self {
        self.insts.push(Inst::SlotOp {
            code: opcode::SET_GLOBAL,
            slot,
        });
        self
    }

    pub fn get_local(&mut self, slot: u16) -> &mut Self {
        self.insts.push(Inst::SlotOp {
            code: opcode::GET_LOCAL,
            slot,
        });
        self
    }

    pub fn set_local(&mut self, slot: u16) -> &mut Self {
        self.insts.push(Inst::SlotOp {
            code: opcode::SET_LOCAL,
            slot,
        });
        self
    }

    pub fn export_var(&mut self, name: &str) -> &mut Self {
        self.insts.push(Inst::StrOp {
            code: opcode::EXPORT_VAR,
            text: name.to_owned(),
        });
        self
    }

    pub fn get_export(&mut self, name: &str) -> &mut Self {
        self.insts.push(Inst::StrOp {
            code: opcode::GET_EXPORT,
            text: name.to_owned(),
        });
        self
    }

    pub fn set_export(&mut self, name: &str) -> &mut Self {
        self.insts.push(Inst::StrOp {
            code: opcode::SET_EXPORT,
            text: name.to_owned(),
        });
        self
    }

    // arithmetic / logic / comparisons

    pub fn add(&mut self) -> &mut Self {
        self.simple(opcode::ADD)
    }

    pub fn sub(&mut self) -> &mut Self {
        self.simple(opcode::SUB)
    }

    pub fn mul(&mut self) -> &mut Self {
        self.simple(opcode::MUL)
    }

    pub fn div(&mut self) -> &mut Self {
        self.simple(opcode::DIV)
    }

    pub fn modulo(&mut self) -> &mut Self {
        self.simple(opcode::MOD)
    }

    pub fn neg(&mut self) -> &mut Self {
        self.simple(opcode::NEG)
    }

    pub fn not(&mut self) -> &mut Self {
        self.simple(opcode::NOT)
    }

    pub fn and(&mut self) -> &mut Self {
        self.simple(opcode::AND)
    }

    pub fn or(&mut self) -> &mut Self {
        self.simple(opcode::OR)
    }

    pub fn band(&mut self) -> &mut Self {
        self.simple(opcode::BAND)
    }

    pub fn bor(&mut self) -> &mut Self {
        self.simple(opcode::BOR)
    }

    pub fn eq(&mut self) -> &mut Self {
        self.simple(opcode::EQ)
    }

    pub fn ne(&mut self) -> &mut Self {
        self.simple(opcode::NE)
    }

    pub fn lt(&mut self) -> &mut Self {
        self.simple(opcode::LT)
    }

    pub fn le(&mut self) -> &mut Self {
        self.simple(opcode::LE)
    }

    pub fn gt(&mut self) -> &mut Self {
        self.simple(opcode::GT)
    }

    pub fn ge(&mut self) -> &mut Self {
        self.simple(opcode::GE)
    }

    // engine-forwarding

    pub fn get_prop(&mut self, property: u16) -> &mut Self {
        self.insts.push(Inst::SlotOp {
            code: opcode::GET_PROP,
            slot: property,
        });
        self
    }

    pub fn set_prop(&mut self, property: u16) -> &mut Self {
        self.insts.push(Inst::SlotOp {
            code: opcode::SET_PROP,
            slot: property,
        });
        self
    }

    pub fn spawn(&mut self) -> &mut Self {
        self.simple(opcode::SPAWN)
    }

    pub fn destroy(&mut self) -> &mut Self {
        self.simple(opcode::DESTROY)
    }

    pub fn obj_exists(&mut self) -> &mut Self {
        self.simple(opcode::OBJ_EXISTS)
    }

    pub fn action(&mut self, id: u16, argc: u8) -> &mut Self {
        self.insts.push(Inst::Action { id, argc });
        self
    }
}

/// Assembles procedures into one program image.
pub struct Assembler {
    name: String,
    global_count: u16,
    export_count: u16,
    strings: Vec<String>,
    string_ids: HashMap<String, u32>,
    procedures: Vec<ProcedureBuilder>,
}

impl Assembler {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            global_count: 0,
            export_count: 0,
            strings: Vec::new(),
            string_ids: HashMap::new(),
            procedures: Vec::new(),
        }
    }

    pub fn globals(&mut self, count: u16) -> &mut Self {
        self.global_count = count;
        self
    }

    pub fn exports(&mut self, count: u16) -> &mut Self {
        self.export_count = count;
        self
    }

    pub fn add(&mut self, procedure: ProcedureBuilder) -> &mut Self {
        self.procedures.push(procedure);
        self
    }

    fn intern(&mut self, text: &str) -> u32 {
        if let Some(id) = self.string_ids.get(text) {
            return *id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(text.to_owned());
        self.string_ids.insert(text.to_owned(), id);
        id
    }

    /// Two-pass layout: first assign every procedure and label an absolute
    /// offset, then encode with all references resolved.
    pub fn assemble(mut self) -> Result<ProgramParts> {
        let mut proc_index: HashMap<String, u16> = HashMap::new();
        for (idx, p) in self.procedures.iter().enumerate() {
            if proc_index.insert(p.name.clone(), idx as u16).is_some() {
                bail!("duplicate procedure name {:?}", p.name);
            }
        }

        // Intern every referenced string up front so encoding below can
        // borrow the procedure list freely.
        let texts: Vec<String> = self
            .procedures
            .iter()
            .flat_map(|p| p.insts.iter())
            .filter_map(|inst| match inst {
                Inst::StrOp { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        for text in &texts {
            self.intern(text);
        }

        // Pass 1: offsets and label addresses.
        let mut entries = Vec::with_capacity(self.procedures.len());
        let mut label_addrs: Vec<HashMap<usize, u32>> = Vec::with_capacity(self.procedures.len());
        let mut offset = 0u32;
        for p in &self.procedures {
            entries.push(ProcedureEntry {
                name: p.name.clone(),
                offset,
                arg_count: p.arg_count,
                local_count: p.local_count,
            });

            let mut labels = HashMap::new();
            let mut addr = offset;
            for inst in &p.insts {
                if let Inst::BindLabel(label) = inst {
                    if labels.insert(label.0, addr).is_some() {
                        bail!("label bound twice in {:?}", p.name);
                    }
                }
                addr += inst_size(inst);
            }
            offset = addr;
            label_addrs.push(labels);
        }

        // Pass 2: encode.
        let mut code = Vec::with_capacity(offset as usize);
        for (p, labels) in self.procedures.iter().zip(&label_addrs) {
            for inst in &p.insts {
                match inst {
                    Inst::Simple(c) => put_u16(&mut code, *c),
                    Inst::Branch { code: c, target } => {
                        let Some(addr) = labels.get(&target.0) else {
                            bail!("unbound label in {:?}", p.name);
                        };
                        put_u16(&mut code, *c);
                        put_u32(&mut code, *addr);
                    }
                    Inst::CallNamed(callee) => {
                        let Some(idx) = proc_index.get(callee) else {
                            bail!("{:?} calls unknown procedure {:?}", p.name, callee);
                        };
                        put_u16(&mut code, opcode::CALL);
                        put_u16(&mut code, *idx);
                    }
                    Inst::PushInt(v) => {
                        put_u16(&mut code, opcode::PUSH_INT);
                        code.extend_from_slice(&v.to_be_bytes());
                    }
                    Inst::PushFloat(v) => {
                        put_u16(&mut code, opcode::PUSH_FLOAT);
                        code.extend_from_slice(&v.to_be_bytes());
                    }
                    Inst::StrOp { code: c, text } => {
                        put_u16(&mut code, *c);
                        put_u32(&mut code, self.string_ids[text]);
                    }
                    Inst::SlotOp { code: c, slot } => {
                        put_u16(&mut code, *c);
                        put_u16(&mut code, *slot);
                    }
                    Inst::Action { id, argc } => {
                        put_u16(&mut code, opcode::ACTION);
                        put_u16(&mut code, *id);
                        code.push(*argc);
                    }
                    Inst::BindLabel(_) => {}
                }
            }
        }

        log::debug!(
            "assembled {:?}: {} procedures, {} strings, {} code bytes",
            self.name,
            entries.len(),
            self.strings.len(),
            code.len()
        );

        Ok(ProgramParts {
            name: self.name,
            code,
            strings: self.strings,
            procedures: entries,
            global_count: self.global_count,
            export_count: self.export_count,
        })
    }

    /// Assemble and validate in one go.
    pub fn build(self) -> Result<Arc<Program>> {
        let parts = self.assemble()?;
        Ok(Arc::new(Program::from_parts(parts)?))
    }
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}
