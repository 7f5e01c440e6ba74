//! A fused computation: the ordered roots produced by one kernel launch.

use std::collections::BTreeMap;
use std::sync::Arc;

use snafu::ensure;

use crate::error::*;
use crate::instruction::Instruction;

#[derive(Debug, Clone)]
pub struct Fusion {
    name: String,
    roots: Vec<Arc<Instruction>>,
    parameters: Vec<Arc<Instruction>>,
}

impl Fusion {
    /// Build a fusion from its roots (output order).
    ///
    /// Parameters are collected from the roots; the same position must always carry the same dtype and shape.
    pub fn new(name: impl Into<String>, roots: Vec<Arc<Instruction>>) -> Result<Self> {
        let name = name.into();
        ensure!(!roots.is_empty(), EmptyFusionSnafu { name });

        let mut parameters: BTreeMap<usize, Arc<Instruction>> = BTreeMap::new();
        for parameter in roots.iter().flat_map(|root| root.parameters()) {
            let Some(index) = parameter.parameter_index() else { continue };
            match parameters.get(&index) {
                Some(known) => {
                    let same = known.dtype() == parameter.dtype() && known.shape() == parameter.shape();
                    ensure!(same, ParameterConflictSnafu { index });
                }
                None => {
                    parameters.insert(index, parameter);
                }
            }
        }

        Ok(Self { name, roots, parameters: parameters.into_values().collect() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roots(&self) -> &[Arc<Instruction>] {
        &self.roots
    }

    /// One representative per parameter position, ordered by position.
    pub fn parameters(&self) -> &[Arc<Instruction>] {
        &self.parameters
    }

    pub fn parameter(&self, index: usize) -> Option<&Arc<Instruction>> {
        self.parameters.iter().find(|p| p.parameter_index() == Some(index))
    }

    /// Every instruction of the fusion in topological order, each once.
    pub fn instructions(&self) -> Vec<Arc<Instruction>> {
        let mut seen = std::collections::HashSet::new();
        self.roots.iter().flat_map(|root| root.toposort()).filter(|node| seen.insert(node.id())).collect()
    }
}

impl std::fmt::Display for Fusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "fusion {} {{", self.name)?;
        for instruction in self.instructions() {
            writeln!(f, "  {instruction}")?;
        }
        let roots = self.roots.iter().map(|r| format!("%{}", r.id())).collect::<Vec<_>>().join(", ");
        write!(f, "  ROOT ({roots})\n}}")
    }
}
