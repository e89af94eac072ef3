use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The persistent slice of one VM instance: its non-default globals, keyed
/// by slot index, plus the program name for matching on restore.
///
/// Locals and stacks are call-transient and never captured. Exports live on
/// the engine's [`ExportTable`](crate::exports::ExportTable) and are
/// snapshotted there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSnapshot {
    pub program: String,
    /// (slot, value) pairs in ascending slot order; slots absent here were
    /// `Unset` at snapshot time and are reset on restore.
    pub globals: Vec<(u16, Value)>,
}

impl VmSnapshot {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut rdr = File::open(path)?;
        let mut buffer = Vec::new();
        rdr.read_to_end(&mut buffer)?;

        let snapshot: VmSnapshot = bincode::deserialize(&buffer)?;
        Ok(snapshot)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let buffer = bincode::serialize(&self)?;
        let mut wtr = File::create(path)?;
        wtr.write_all(&buffer)?;
        Ok(())
    }
}
