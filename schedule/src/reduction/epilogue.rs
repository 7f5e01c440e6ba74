//! Evaluation of the roots of a group from finished reduction values.
//!
//! Reduction roots are elementwise functions of the heroes (one finished value per vector lane) and of
//! epilogue parameters read at the root's own index. Side-output roots arrive already computed as tensor
//! fragments and pass through unchanged. The two kinds of value are kept apart: a hero given a tensor value,
//! or a side output given a scalar, is an error.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use strata_ir::eval::evaluate;
use strata_ir::shape::{delinearize, linearize};
use strata_ir::{ConstValue, Index, InstrKey, Instruction, Shape};

use crate::error::*;

use super::groups::{ReductionGroup, RootKind};

/// Value handed to the epilogue for one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum EpilogueValue {
    /// Finished reduction, one value per vector lane.
    Scalar(SmallVec<[ConstValue; 4]>),
    /// Elements of a side output produced by this thread.
    Tensor(Vec<TensorElement>),
}

/// One element of a root, attributed to the vector lane that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorElement {
    pub vector_index: usize,
    pub index: Index,
    pub value: ConstValue,
}

/// Values of one fusion root produced by one thread.
#[derive(Debug, Clone, PartialEq)]
pub struct RootValues {
    pub position: usize,
    pub elements: Vec<TensorElement>,
}

/// Evaluates every root of a group for one thread.
#[derive(Debug, Clone, Copy)]
pub struct EpilogueEvaluator<'a> {
    group: &'a ReductionGroup,
    kept_shape: &'a [usize],
}

impl<'a> EpilogueEvaluator<'a> {
    /// `kept_shape` is the projected output shape the output indices refer to.
    pub fn new(group: &'a ReductionGroup, kept_shape: &'a [usize]) -> Self {
        Self { group, kept_shape }
    }

    /// Outputs of every root of the group, in group root order.
    ///
    /// `values` maps each hero to [`EpilogueValue::Scalar`] and each side-output root to
    /// [`EpilogueValue::Tensor`]. `output_indices[lane]` is the kept element written for a vector lane, or `None`
    /// if the lane writes nothing. `read_parameter` resolves epilogue parameters at the root's index.
    pub fn evaluate(
        &self,
        values: &HashMap<InstrKey, EpilogueValue>,
        output_indices: &[Option<Index>],
        read_parameter: &mut dyn FnMut(&Arc<Instruction>, &[i64]) -> Result<ConstValue>,
    ) -> Result<Vec<RootValues>> {
        let mut outputs = Vec::with_capacity(self.group.roots.len());

        for root in &self.group.roots {
            let elements = match root.kind {
                RootKind::SideOutput => match lookup(values, &root.instruction)? {
                    EpilogueValue::Tensor(elements) => elements.clone(),
                    EpilogueValue::Scalar(_) => return mismatch(&root.instruction, "tensor"),
                },
                RootKind::Reduction => {
                    let mut elements = Vec::new();
                    for (lane, index) in output_indices.iter().enumerate() {
                        let Some(index) = index else { continue };
                        let index = self.root_index(index, root.instruction.shape());
                        let mut leaf = |instr: &Arc<Instruction>, at: &[i64]| -> Result<ConstValue> {
                            if instr.is_reduce() {
                                return hero_value(values, instr, lane);
                            }
                            read_parameter(instr, at)
                        };
                        let value = evaluate(&root.instruction, &index, &mut leaf)?;
                        elements.push(TensorElement { vector_index: lane, index, value });
                    }
                    elements
                }
            };
            outputs.push(RootValues { position: root.position, elements });
        }

        Ok(outputs)
    }

    /// The element of a reduction root that corresponds to a kept element.
    fn root_index(&self, kept: &[i64], root_shape: &Shape) -> Index {
        delinearize(linearize(kept, self.kept_shape), root_shape)
    }
}

fn lookup<'v>(values: &'v HashMap<InstrKey, EpilogueValue>, instr: &Arc<Instruction>) -> Result<&'v EpilogueValue> {
    values.get(&InstrKey(instr.clone())).ok_or_else(|| MissingValueSnafu { instruction: instr.id() }.build())
}

fn hero_value(values: &HashMap<InstrKey, EpilogueValue>, hero: &Arc<Instruction>, lane: usize) -> Result<ConstValue> {
    match lookup(values, hero)? {
        EpilogueValue::Scalar(lanes) => {
            lanes.get(lane).copied().ok_or_else(|| MissingValueSnafu { instruction: hero.id() }.build())
        }
        EpilogueValue::Tensor(_) => mismatch(hero, "scalar"),
    }
}

fn mismatch<T>(instr: &Instruction, expected: &'static str) -> Result<T> {
    ValueKindMismatchSnafu { instruction: instr.id(), expected }.fail()
}
