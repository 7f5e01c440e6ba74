//! SIMT reference execution of emitted reduction programs.
//!
//! Executes every group's [`ReductionProgram`] over host tensors with explicit blocks, warps and lanes:
//! shuffles read the register of the lane `distance` above (a lane past the end of the warp reads its own),
//! shared memory is a per-hero tile whose slots remember the barrier epoch they were written in, and every
//! output element must be written exactly once. Accumulators start from the combiner identity and each
//! hero's init is folded in once per output element. A program that would race, read stale shared memory or
//! miss an output fails with an error instead of producing a value.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::{SmallVec, smallvec};
use tracing::debug;

use strata_dtype::{DType, HasDType};
use strata_ir::eval::evaluate;
use strata_ir::shape::{delinearize, linearize, num_elements};
use strata_ir::{ConstValue, Index, InstrKey, Instruction, ReduceOp, Shape};

use crate::error::*;
use crate::reduction::groups::Hero;
use crate::reduction::{EmittedGroup, EpilogueEvaluator, EpilogueValue, ReductionFusion, ReductionGroup};
use crate::reduction::{ReductionStep, TensorElement};

/// Dense row-major tensor in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    dtype: DType,
    shape: Shape,
    data: Vec<ConstValue>,
}

impl HostTensor {
    /// # Panics
    ///
    /// If `data` does not hold exactly one value per element.
    pub fn new(dtype: DType, shape: &[usize], data: Vec<ConstValue>) -> Self {
        assert_eq!(data.len(), num_elements(shape), "{} values for shape {shape:?}", data.len());
        Self { dtype, shape: Shape::from_slice(shape), data: data.into_iter().map(|v| v.cast(dtype)).collect() }
    }

    pub fn from_fn(dtype: DType, shape: &[usize], mut f: impl FnMut(&[i64]) -> ConstValue) -> Self {
        let data = (0..num_elements(shape)).map(|linear| f(&delinearize(linear, shape))).collect();
        Self::new(dtype, shape, data)
    }

    pub fn from_slice<T: HasDType + Into<ConstValue> + Copy>(shape: &[usize], values: &[T]) -> Self {
        Self::new(T::DTYPE, shape, values.iter().map(|&v| v.into()).collect())
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[ConstValue] {
        &self.data
    }

    pub fn get(&self, index: &[i64]) -> ConstValue {
        self.data[linearize(index, &self.shape)]
    }
}

/// Run every group of `reduction` over `args` and return one tensor per fusion root.
#[tracing::instrument(skip_all, fields(fusion = reduction.fusion().name()))]
pub fn simulate(reduction: &ReductionFusion, args: &[HostTensor]) -> Result<Vec<HostTensor>> {
    check_arguments(reduction, args)?;

    let mut outputs: Vec<Output> = reduction.fusion().roots().iter().map(|root| Output::new(root)).collect();
    let launch = reduction.launch_dimensions();
    let warp_size = reduction.strategy().warp_size();

    for group in reduction.groups() {
        let (Some(emitted), Some(epilogue)) = (reduction.emit_group(group.id), reduction.epilogue(group.id)) else {
            continue;
        };
        debug!(group = group.id, program = %emitted.program, "simulating group");

        let context = GroupContext::new(reduction, group, &emitted, epilogue, args, warp_size);
        for block in 0..launch.block_counts[0] {
            let mut state = BlockState::new(&context, block as i64, launch.num_threads_per_block());
            for step in &emitted.program.steps {
                state.execute(step, &mut outputs)?;
            }
            state.check_shared_consumed()?;
        }
    }

    outputs.into_iter().enumerate().map(|(position, output)| output.finish(position)).collect()
}

fn check_arguments(reduction: &ReductionFusion, args: &[HostTensor]) -> Result<()> {
    for parameter in reduction.fusion().parameters() {
        let Some(index) = parameter.parameter_index() else { continue };
        let Some(arg) = args.get(index) else {
            return ArgumentMismatchSnafu { index, reason: format!("missing, {} arguments given", args.len()) }.fail();
        };
        if arg.dtype != parameter.dtype() || arg.shape != *parameter.shape() {
            let reason = format!(
                "expected {}{:?}, got {}{:?}",
                parameter.dtype(),
                parameter.shape().as_slice(),
                arg.dtype,
                arg.shape.as_slice()
            );
            return ArgumentMismatchSnafu { index, reason }.fail();
        }
    }
    Ok(())
}

fn read_parameter(args: &[HostTensor], instr: &Arc<Instruction>, index: &[i64]) -> Result<ConstValue> {
    match instr.parameter_index() {
        Some(position) => Ok(args[position].get(index)),
        None => MissingValueSnafu { instruction: instr.id() }.fail(),
    }
}

// ============================================================================
// Outputs
// ============================================================================

struct Output {
    dtype: DType,
    shape: Shape,
    data: Vec<Option<ConstValue>>,
}

impl Output {
    fn new(root: &Instruction) -> Self {
        Self { dtype: root.dtype(), shape: root.shape().clone(), data: vec![None; root.num_elements()] }
    }

    fn write(&mut self, position: usize, index: &[i64], value: ConstValue) -> Result<()> {
        let slot = &mut self.data[linearize(index, &self.shape)];
        if slot.is_some() {
            return DuplicateOutputWriteSnafu { root: position, index: Index::from_slice(index) }.fail();
        }
        *slot = Some(value);
        Ok(())
    }

    fn finish(self, position: usize) -> Result<HostTensor> {
        let mut data = Vec::with_capacity(self.data.len());
        for (linear, value) in self.data.into_iter().enumerate() {
            match value {
                Some(value) => data.push(value),
                None => {
                    return MissingOutputWriteSnafu { root: position, index: delinearize(linear, &self.shape) }.fail();
                }
            }
        }
        Ok(HostTensor { dtype: self.dtype, shape: self.shape, data })
    }
}

// ============================================================================
// Execution
// ============================================================================

struct HeroState {
    operand: Arc<Instruction>,
    init: ConstValue,
    identity: ConstValue,
    reduce_op: ReduceOp,
    dtype: DType,
}

struct GroupContext<'a> {
    group: &'a ReductionGroup,
    emitted: &'a EmittedGroup,
    epilogue: EpilogueEvaluator<'a>,
    args: &'a [HostTensor],
    heroes: Vec<HeroState>,
    canonical_shape: Shape,
    input_shape: Shape,
    warp_size: usize,
}

impl<'a> GroupContext<'a> {
    fn new(
        reduction: &'a ReductionFusion,
        group: &'a ReductionGroup,
        emitted: &'a EmittedGroup,
        epilogue: EpilogueEvaluator<'a>,
        args: &'a [HostTensor],
        warp_size: usize,
    ) -> Self {
        let heroes = group
            .heroes
            .iter()
            .filter_map(|hero| {
                let parts = Hero::of(hero)?;
                let init = match parts.init.op() {
                    strata_ir::Op::Constant(value) => *value,
                    _ => return None,
                };
                let operand = parts.operand.clone();
                let identity = parts.reduce_op.identity(hero.dtype());
                Some(HeroState { operand, init, identity, reduce_op: parts.reduce_op, dtype: hero.dtype() })
            })
            .collect();
        let analysis = reduction.analysis();
        Self {
            group,
            emitted,
            epilogue,
            args,
            heroes,
            canonical_shape: analysis.dimensions.input_shape(),
            input_shape: analysis.input_shape.clone(),
            warp_size,
        }
    }

    fn combine(&self, hero: usize, lhs: ConstValue, rhs: ConstValue) -> Result<ConstValue> {
        let state = &self.heroes[hero];
        let combined = state.reduce_op.combine(state.dtype, lhs, rhs);
        combined.ok_or_else(|| CombineFailedSnafu { op: state.reduce_op, lhs, rhs }.build())
    }

    fn identities(&self, lanes: usize) -> Vec<Lanes> {
        self.heroes.iter().map(|hero| smallvec![hero.identity; lanes]).collect()
    }
}

type Lanes = SmallVec<[ConstValue; 4]>;

struct SharedSlot {
    value: ConstValue,
    epoch: usize,
    reads: usize,
}

struct BlockState<'c, 'a> {
    context: &'c GroupContext<'a>,
    block: i64,
    /// `[thread][hero][lane]`
    accumulators: Vec<Vec<Lanes>>,
    /// `[thread][side output]`
    side_outputs: Vec<Vec<Vec<TensorElement>>>,
    /// `[hero]`: slot -> value
    shared: Vec<HashMap<Index, SharedSlot>>,
    epoch: usize,
}

impl<'c, 'a> BlockState<'c, 'a> {
    fn new(context: &'c GroupContext<'a>, block: i64, num_threads: usize) -> Self {
        let num_side_outputs = context.group.side_outputs().count();
        Self {
            context,
            block,
            accumulators: vec![context.identities(1); num_threads],
            side_outputs: vec![vec![Vec::new(); num_side_outputs]; num_threads],
            shared: context.heroes.iter().map(|_| HashMap::new()).collect(),
            epoch: 0,
        }
    }

    fn domain_point(&self, thread: usize) -> [i64; 3] {
        [thread as i64, self.block, self.context.group.id as i64]
    }

    fn execute(&mut self, step: &ReductionStep, outputs: &mut [Output]) -> Result<()> {
        match step {
            ReductionStep::AccumulateTile { lanes, lane_symbol } => self.accumulate(*lanes, *lane_symbol),
            ReductionStep::ShuffleReduce { max_distance } => self.shuffle_reduce(*max_distance),
            ReductionStep::StoreShared { lane_symbol, .. } => self.store_shared(*lane_symbol),
            ReductionStep::Barrier => {
                self.epoch += 1;
                Ok(())
            }
            ReductionStep::LoadShared { lane_symbol } => self.load_shared(*lane_symbol),
            ReductionStep::WriteOutputs { lane_symbol } => self.write_outputs(*lane_symbol, outputs),
        }
    }

    fn accumulate(&mut self, lanes: usize, lane_symbol: Option<usize>) -> Result<()> {
        let context = self.context;
        let input = &context.emitted.indexing.input;
        let side_roots: Vec<_> = context.group.side_outputs().map(|root| root.instruction.clone()).collect();
        let mut leaf = |instr: &Arc<Instruction>, at: &[i64]| read_parameter(context.args, instr, at);

        for thread in 0..self.accumulators.len() {
            let mut accumulators = context.identities(lanes);
            let dims = self.domain_point(thread);
            for symbols in input.symbol_points() {
                let Some(index) = input.evaluate(&dims, &symbols) else { continue };
                let lane = lane_symbol.map_or(0, |s| symbols[s] as usize);
                let linear = linearize(&index, &context.canonical_shape);

                let operand_index = delinearize(linear, &context.input_shape);
                for (h, hero) in context.heroes.iter().enumerate() {
                    let value = evaluate(&hero.operand, &operand_index, &mut leaf)?;
                    accumulators[h][lane] = context.combine(h, accumulators[h][lane], value)?;
                }
                for (i, root) in side_roots.iter().enumerate() {
                    let root_index = delinearize(linear, root.shape());
                    let value = evaluate(root, &root_index, &mut leaf)?;
                    self.side_outputs[thread][i].push(TensorElement { vector_index: lane, index: root_index, value });
                }
            }
            self.accumulators[thread] = accumulators;
        }
        Ok(())
    }

    fn shuffle_reduce(&mut self, max_distance: usize) -> Result<()> {
        let warp = self.context.warp_size;
        let num_threads = self.accumulators.len();
        let mut distance = max_distance;

        while distance > 0 {
            let snapshot = self.accumulators.clone();
            for thread in 0..num_threads {
                let source = if thread % warp + distance < warp && thread + distance < num_threads {
                    thread + distance
                } else {
                    thread
                };
                for (h, lanes) in self.accumulators[thread].iter_mut().enumerate() {
                    for (lane, value) in lanes.iter_mut().enumerate() {
                        *value = self.context.combine(h, snapshot[thread][h][lane], snapshot[source][h][lane])?;
                    }
                }
            }
            distance /= 2;
        }
        Ok(())
    }

    fn store_shared(&mut self, lane_symbol: Option<usize>) -> Result<()> {
        let Some(write) = &self.context.emitted.indexing.shared_write else { return Ok(()) };
        for thread in 0..self.accumulators.len() {
            let dims = self.domain_point(thread);
            for symbols in write.symbol_points() {
                let Some(slot) = write.evaluate(&dims, &symbols) else { continue };
                let lane = lane_symbol.map_or(0, |s| symbols[s] as usize);
                for (h, tile) in self.shared.iter_mut().enumerate() {
                    if tile.contains_key(&slot) {
                        return SharedSlotRewrittenSnafu { hero: h, slot }.fail();
                    }
                    let value = self.accumulators[thread][h][lane];
                    tile.insert(slot.clone(), SharedSlot { value, epoch: self.epoch, reads: 0 });
                }
            }
        }
        Ok(())
    }

    fn load_shared(&mut self, lane_symbol: Option<usize>) -> Result<()> {
        let context = self.context;
        let Some(read) = &context.emitted.indexing.shared_read else { return Ok(()) };

        for thread in 0..self.accumulators.len() {
            let dims = self.domain_point(thread);
            let mut loaded: Vec<SmallVec<[Option<ConstValue>; 4]>> =
                self.accumulators[thread].iter().map(|lanes| smallvec![None; lanes.len()]).collect();

            for symbols in read.symbol_points() {
                let Some(slot) = read.evaluate(&dims, &symbols) else { continue };
                let lane = lane_symbol.map_or(0, |s| symbols[s] as usize);
                for (h, tile) in self.shared.iter_mut().enumerate() {
                    let Some(entry) = tile.get_mut(&slot) else {
                        return UnwrittenSharedReadSnafu { hero: h, slot }.fail();
                    };
                    if entry.epoch >= self.epoch {
                        return UnsynchronizedSharedReadSnafu { hero: h, slot }.fail();
                    }
                    entry.reads += 1;
                    loaded[h][lane] = Some(match loaded[h][lane] {
                        Some(partial) => context.combine(h, partial, entry.value)?,
                        None => entry.value,
                    });
                }
            }

            for (h, lanes) in self.accumulators[thread].iter_mut().enumerate() {
                for (value, loaded) in lanes.iter_mut().zip(&loaded[h]) {
                    *value = loaded.unwrap_or(context.heroes[h].identity);
                }
            }
        }
        Ok(())
    }

    fn write_outputs(&mut self, lane_symbol: Option<usize>, outputs: &mut [Output]) -> Result<()> {
        let context = self.context;
        let output = &context.emitted.indexing.output;
        let side_roots: Vec<_> = context.group.side_outputs().map(|root| root.instruction.clone()).collect();
        let mut read = |instr: &Arc<Instruction>, at: &[i64]| read_parameter(context.args, instr, at);

        for thread in 0..self.accumulators.len() {
            let lanes = self.accumulators[thread].first().map_or(1, |lanes| lanes.len());
            let mut output_indices: SmallVec<[Option<Index>; 4]> = smallvec![None; lanes];
            let dims = self.domain_point(thread);
            for symbols in output.symbol_points() {
                if let Some(index) = output.evaluate(&dims, &symbols) {
                    output_indices[lane_symbol.map_or(0, |s| symbols[s] as usize)] = Some(index);
                }
            }

            let mut values = HashMap::new();
            for (h, (hero, lanes)) in context.group.heroes.iter().zip(&self.accumulators[thread]).enumerate() {
                let folded = lanes.iter().map(|&value| context.combine(h, context.heroes[h].init, value));
                values.insert(InstrKey(hero.clone()), EpilogueValue::Scalar(folded.collect::<Result<_>>()?));
            }
            for (root, elements) in side_roots.iter().zip(&mut self.side_outputs[thread]) {
                values.insert(InstrKey(root.clone()), EpilogueValue::Tensor(std::mem::take(elements)));
            }

            for root in context.epilogue.evaluate(&values, &output_indices, &mut read)? {
                for element in root.elements {
                    outputs[root.position].write(root.position, &element.index, element.value)?;
                }
            }
        }
        Ok(())
    }

    /// Every published slot must be read exactly once.
    fn check_shared_consumed(&self) -> Result<()> {
        for (hero, tile) in self.shared.iter().enumerate() {
            if let Some((slot, entry)) = tile.iter().find(|(_, entry)| entry.reads != 1) {
                return SharedSlotNotConsumedSnafu { hero, slot: slot.clone(), reads: entry.reads }.fail();
            }
        }
        Ok(())
    }
}
