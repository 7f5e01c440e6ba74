//! Shape analysis of a reduction fusion.
//!
//! Runs once per fusion, before any emission: groups the roots, checks that the heroes agree, classifies
//! the reduction layout and picks the tile configuration.

use smallvec::SmallVec;
use tracing::debug;

use strata_ir::{Fusion, Op, Shape};

use crate::config::ReductionConfig;
use crate::device::DeviceDescription;
use crate::error::*;

use super::dimensions::{ReductionDimensions, ReductionKind};
use super::groups::{Hero, ReductionGroup, check_epilogue_operands, group_roots};
use super::tiling::{TileConfiguration, column_tiling, row_tiling};

/// Immutable result of analysing a fusion for the reduction emitter.
#[derive(Debug, Clone)]
pub struct ShapeAnalysis {
    /// Physical shape of the reduced operand, shared by every hero.
    pub input_shape: Shape,
    /// Reduced dimensions of `input_shape`.
    pub reduced_dims: SmallVec<[usize; 4]>,
    pub dimensions: ReductionDimensions,
    /// Projected output shape, see [`ReductionDimensions::kept_shape`].
    pub kept_shape: Shape,
    pub groups: Vec<ReductionGroup>,
    pub tiling: TileConfiguration,
    /// Widest hero element, in bytes.
    pub element_bytes: usize,
}

impl ShapeAnalysis {
    #[tracing::instrument(skip_all, fields(fusion = fusion.name()))]
    pub fn new(fusion: &Fusion, device: &DeviceDescription, config: &ReductionConfig) -> Result<Self> {
        device.validate();

        let groups = group_roots(fusion)?;
        let heroes: Vec<_> =
            groups.iter().flat_map(|g| &g.heroes).filter_map(|h| Hero::of(h).map(|parts| (h, parts))).collect();
        let Some(&(_, first)) = heroes.first() else {
            return NoReductionSnafu { fusion: fusion.name() }.fail();
        };
        let input_shape = first.operand.shape().clone();
        let reduced_dims: SmallVec<[usize; 4]> = SmallVec::from_slice(first.dims);

        let mut element_bytes = first.operand.dtype().bytes();
        for &(hero, parts) in &heroes {
            if parts.operand.shape() != &input_shape || parts.dims != reduced_dims.as_slice() {
                debug!(hero = hero.id(), "rejecting reductions of different shapes");
                return IncompatibleHeroesSnafu {
                    expected: Box::new(input_shape.clone()),
                    expected_dims: reduced_dims.to_vec(),
                    actual: Box::new(parts.operand.shape().clone()),
                    actual_dims: parts.dims.to_vec(),
                }
                .fail();
            }
            if !matches!(parts.init.op(), Op::Constant(_)) {
                debug!(hero = hero.id(), "rejecting non-constant init");
                return NonConstantInitSnafu { hero: hero.id() }.fail();
            }
            element_bytes = element_bytes.max(hero.dtype().bytes());
        }

        for root in groups.iter().flat_map(|g| g.reduction_roots()) {
            check_epilogue_operands(root)?;
        }

        if input_shape.contains(&0) {
            debug!(shape = ?input_shape, "rejecting empty reduction input");
            return EmptyTensorSnafu { shape: Box::new(input_shape) }.fail();
        }

        let Some(dimensions) = ReductionDimensions::classify(&input_shape, &reduced_dims) else {
            debug!(shape = ?input_shape, dims = ?reduced_dims, "rejecting reduction layout");
            return UnsupportedLayoutSnafu { shape: Box::new(input_shape), dims: reduced_dims.to_vec() }.fail();
        };

        let tiling = match dimensions.kind {
            ReductionKind::Row => row_tiling(&dimensions, device, config, element_bytes)?,
            ReductionKind::Column => column_tiling(&dimensions, device, config, element_bytes),
        };

        debug!(
            kind = %dimensions.kind,
            dims = ?dimensions.dimensions,
            num_groups = groups.len(),
            vector_size = tiling.vector_size(),
            "reduction shape analysis"
        );
        let kept_shape = dimensions.kept_shape();
        Ok(Self { input_shape, reduced_dims, dimensions, kept_shape, groups, tiling, element_bytes })
    }

    pub fn num_heroes(&self) -> usize {
        self.groups.iter().map(|g| g.heroes.len()).max().unwrap_or(0)
    }

    /// Group that owns the fusion root at `position`.
    pub fn group_of_root(&self, position: usize) -> Option<&ReductionGroup> {
        self.groups.iter().find(|g| g.root(position).is_some())
    }
}
