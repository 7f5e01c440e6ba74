//! Partition of fusion roots into reduction groups.
//!
//! A *hero* is a `Reduce` reachable from a root without passing through another `Reduce`. Roots that share a
//! hero land in the same group; roots without heroes are side outputs and ride along with the group that
//! reads the same input.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use strum::Display;
use tracing::debug;

use strata_ir::{Fusion, Instruction, Op, ReduceOp};

use crate::error::*;

/// How a root of a group is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RootKind {
    /// Elementwise function of finished reductions, written once per kept element.
    Reduction,
    /// Elementwise function of the reduced input, written while the input is read.
    SideOutput,
}

#[derive(Debug, Clone)]
pub struct GroupRoot {
    /// Position among the fusion roots.
    pub position: usize,
    pub instruction: Arc<Instruction>,
    pub kind: RootKind,
}

/// Roots computed by one pass over the reduced input.
#[derive(Debug, Clone)]
pub struct ReductionGroup {
    pub id: usize,
    /// Distinct heroes in order of first appearance.
    pub heroes: Vec<Arc<Instruction>>,
    pub roots: Vec<GroupRoot>,
}

impl ReductionGroup {
    pub fn reduction_roots(&self) -> impl Iterator<Item = &GroupRoot> {
        self.roots.iter().filter(|root| root.kind == RootKind::Reduction)
    }

    pub fn side_outputs(&self) -> impl Iterator<Item = &GroupRoot> {
        self.roots.iter().filter(|root| root.kind == RootKind::SideOutput)
    }

    pub fn hero_index(&self, hero: &Instruction) -> Option<usize> {
        self.heroes.iter().position(|h| h.id() == hero.id())
    }

    pub fn root(&self, position: usize) -> Option<&GroupRoot> {
        self.roots.iter().find(|root| root.position == position)
    }
}

/// The parts of a `Reduce` instruction.
#[derive(Debug, Clone, Copy)]
pub struct Hero<'a> {
    pub operand: &'a Arc<Instruction>,
    pub init: &'a Arc<Instruction>,
    pub dims: &'a [usize],
    pub reduce_op: ReduceOp,
}

impl<'a> Hero<'a> {
    pub fn of(instruction: &'a Instruction) -> Option<Self> {
        match instruction.op() {
            Op::Reduce { operand, init, dims, reduce_op } => {
                Some(Self { operand, init, dims, reduce_op: *reduce_op })
            }
            _ => None,
        }
    }
}

/// Heroes reachable from `root`, in depth-first order.
pub fn find_heroes(root: &Arc<Instruction>) -> Result<Vec<Arc<Instruction>>> {
    let mut heroes = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.id()) {
            continue;
        }
        if let Some(hero) = Hero::of(&node) {
            if hero.operand.toposort().iter().chain(hero.init.toposort().iter()).any(|n| n.is_reduce()) {
                debug!(hero = node.id(), "rejecting chained reduction");
                return ChainedReductionSnafu { hero: node.id() }.fail();
            }
            heroes.push(node);
            continue;
        }
        stack.extend(node.operands().into_iter().rev().cloned());
    }

    Ok(heroes)
}

/// Group the roots of `fusion` by shared heroes and attach side outputs.
pub fn group_roots(fusion: &Fusion) -> Result<Vec<ReductionGroup>> {
    let roots = fusion.roots();
    let heroes_per_root = roots.iter().map(find_heroes).collect::<Result<Vec<_>>>()?;

    let mut sets = DisjointSet::new(roots.len());
    let mut owner: HashMap<u64, usize> = HashMap::new();
    for (position, heroes) in heroes_per_root.iter().enumerate() {
        for hero in heroes {
            match owner.get(&hero.id()) {
                Some(&other) => sets.union(position, other),
                None => {
                    owner.insert(hero.id(), position);
                }
            }
        }
    }

    let mut groups: Vec<ReductionGroup> = Vec::new();
    let mut group_of_set: HashMap<usize, usize> = HashMap::new();
    for (position, heroes) in heroes_per_root.iter().enumerate() {
        if heroes.is_empty() {
            continue;
        }
        let id = *group_of_set.entry(sets.find(position)).or_insert_with(|| {
            groups.push(ReductionGroup { id: groups.len(), heroes: Vec::new(), roots: Vec::new() });
            groups.len() - 1
        });
        let group = &mut groups[id];
        for hero in heroes {
            if group.hero_index(hero).is_none() {
                group.heroes.push(hero.clone());
            }
        }
        group.roots.push(GroupRoot { position, instruction: roots[position].clone(), kind: RootKind::Reduction });
    }

    snafu::ensure!(!groups.is_empty(), NoReductionSnafu { fusion: fusion.name() });

    for (position, heroes) in heroes_per_root.iter().enumerate() {
        if !heroes.is_empty() {
            continue;
        }
        let root = &roots[position];
        let parameters: HashSet<u64> = root.parameters().iter().map(|p| p.id()).collect();
        let target = groups.iter().position(|group| {
            let Some(hero) = group.heroes.first().and_then(|h| Hero::of(h)) else { return false };
            hero.operand.num_elements() == root.num_elements()
                && group
                    .heroes
                    .iter()
                    .filter_map(|h| Hero::of(h))
                    .any(|h| h.operand.parameters().iter().any(|p| parameters.contains(&p.id())))
        });
        let Some(target) = target else {
            debug!(root = position, "side output reads no reduction input");
            return OrphanSideOutputSnafu { root: position }.fail();
        };
        groups[target].roots.push(GroupRoot { position, instruction: root.clone(), kind: RootKind::SideOutput });
    }

    let with_side_outputs = groups.iter().filter(|g| g.side_outputs().next().is_some()).count();
    if with_side_outputs > 1 {
        debug!(with_side_outputs, "rejecting side outputs spread over several groups");
    }
    snafu::ensure!(with_side_outputs <= 1, TooManySideOutputGroupsSnafu { count: with_side_outputs });

    debug!(
        num_groups = groups.len(),
        num_heroes = groups.iter().map(|g| g.heroes.len()).sum::<usize>(),
        "grouped reduction roots"
    );
    Ok(groups)
}

/// Parameters read between the heroes and a reduction root must have the root's shape.
pub fn check_epilogue_operands(root: &GroupRoot) -> Result<()> {
    let expected = root.instruction.shape();
    let mut visited = HashSet::new();
    let mut stack = vec![root.instruction.clone()];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.id()) || node.is_reduce() {
            continue;
        }
        if node.parameter_index().is_some() && node.shape() != expected {
            debug!(root = root.position, operand = ?node.shape(), "rejecting epilogue operand shape");
            return EpilogueOperandShapeSnafu {
                root: root.position,
                expected: Box::new(expected.clone()),
                actual: Box::new(node.shape().clone()),
            }
            .fail();
        }
        stack.extend(node.operands().into_iter().cloned());
    }
    Ok(())
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self { parent: (0..size).collect() }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[a.max(b)] = a.min(b);
        }
    }
}
