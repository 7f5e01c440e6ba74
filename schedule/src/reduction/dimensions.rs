//! Classification of a reduction into the canonical row or column layout.

use smallvec::{SmallVec, smallvec};
use strum::Display;

use strata_ir::Shape;

/// Which side of the canonical 3-D shape is reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReductionKind {
    /// `[reduced_major, kept, reduced_minor]`: contiguous reduced elements.
    Row,
    /// `[kept_major, reduced, kept_minor]`: contiguous kept elements.
    Column,
}

/// The reduced operand regrouped into three dimensions.
///
/// The canonical shape is a bitcast of the physical operand shape: size-1 dimensions are dropped and adjacent
/// dimensions of the same kind are merged, which keeps the row-major order of elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReductionDimensions {
    pub kind: ReductionKind,
    pub dimensions: [usize; 3],
}

impl ReductionDimensions {
    /// Classify the reduction of `dims` over `shape`; `None` if the layout is neither row nor column.
    pub fn classify(shape: &[usize], dims: &[usize]) -> Option<Self> {
        let mut runs: SmallVec<[(bool, usize); 4]> = SmallVec::new();
        for (axis, &size) in shape.iter().enumerate() {
            if size == 1 {
                continue;
            }
            let reduced = dims.contains(&axis);
            match runs.last_mut() {
                Some((kind, extent)) if *kind == reduced => *extent *= size,
                _ => runs.push((reduced, size)),
            }
        }

        use ReductionKind::*;
        let (kind, dimensions) = match runs.as_slice() {
            [] => (Row, [1, 1, 1]),
            [(true, r)] => (Row, [1, 1, *r]),
            [(false, k)] => (Row, [1, *k, 1]),
            [(false, k), (true, r)] => (Row, [1, *k, *r]),
            [(true, r0), (false, k), (true, r1)] => (Row, [*r0, *k, *r1]),
            [(true, r), (false, k)] => (Column, [1, *r, *k]),
            [(false, k0), (true, r), (false, k1)] => (Column, [*k0, *r, *k1]),
            _ => return None,
        };
        Some(Self { kind, dimensions })
    }

    pub fn is_row(&self) -> bool {
        self.kind == ReductionKind::Row
    }

    /// The canonical operand shape.
    pub fn input_shape(&self) -> Shape {
        SmallVec::from_slice(&self.dimensions)
    }

    /// The kept dimensions, in the order they appear in the canonical shape.
    pub fn kept_shape(&self) -> Shape {
        let [a, b, c] = self.dimensions;
        match self.kind {
            ReductionKind::Row => smallvec![b],
            ReductionKind::Column => smallvec![a, c],
        }
    }

    /// Number of elements folded into each output.
    pub fn reduced_elements(&self) -> usize {
        let [a, b, c] = self.dimensions;
        match self.kind {
            ReductionKind::Row => a * c,
            ReductionKind::Column => b,
        }
    }
}
