use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::Fault;
use crate::value::Value;

/// Name-keyed variable bindings visible across VM instances.
///
/// The engine owns one table (per save, typically) and lends it to every
/// call; scripts communicate with each other exclusively through it. A
/// binding must be declared before any script or the engine may read or
/// write it, and bindings are never removed during normal execution.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExportTable {
    vars: HashMap<String, Value>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Declare a binding. Re-declaring an existing name keeps its current
    /// value, so a declaring procedure can be probed repeatedly without
    /// resetting shared state.
    pub fn declare(&mut self, name: &str, initial: Value) {
        if !self.vars.contains_key(name) {
            log::debug!(target: "script", "export declared: {:?} = {}", name, initial);
            self.vars.insert(name.to_owned(), initial);
        }
    }

    pub fn get(&self, name: &str) -> Result<Value, Fault> {
        self.vars
            .get(name)
            .copied()
            .ok_or_else(|| Fault::UndeclaredExport {
                name: name.to_owned(),
            })
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<(), Fault> {
        match self.vars.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Fault::UndeclaredExport {
                name: name.to_owned(),
            }),
        }
    }

    /// Enumerate bindings as (name, value) pairs, sorted by name so the
    /// result is deterministic for the save system.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        let mut pairs: Vec<_> = self
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    /// Replace all bindings from a snapshot.
    pub fn restore(&mut self, pairs: &[(String, Value)]) {
        self.vars.clear();
        for (name, value) in pairs {
            self.vars.insert(name.clone(), *value);
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut rdr = File::open(path)?;
        let mut buffer = Vec::new();
        rdr.read_to_end(&mut buffer)?;

        let table: ExportTable = bincode::deserialize(&buffer)?;
        Ok(table)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let buffer = bincode::serialize(&self)?;
        let mut wtr = File::create(path)?;
        wtr.write_all(&buffer)?;
        Ok(())
    }
}
