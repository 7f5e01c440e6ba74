//! Symbolic indexing: intervals, affine expressions and indexing maps.
//!
//! Indexing maps describe which tensor element a parallel lane touches. They are values: built once from the
//! launch configuration, composed with layout changes (bitcasts) and simplified against the domain bounds.

mod affine;
mod interval;
mod map;

pub use affine::{AffineExpr, AffineKind};
pub use interval::Interval;
pub use map::{IndexingMap, Points, Variable};

use crate::shape::{num_elements, strides};

/// Map from an index of `from` to the index of the same linear element in `to`.
///
/// # Panics
///
/// If the two shapes have a different number of elements.
pub fn bitcast_map(from: &[usize], to: &[usize]) -> IndexingMap {
    assert_eq!(num_elements(from), num_elements(to), "bitcast between {from:?} and {to:?} changes the element count");

    let linear = from
        .iter()
        .zip(strides(from))
        .enumerate()
        .map(|(i, (_, stride))| AffineExpr::dim(i) * stride as i64)
        .fold(AffineExpr::constant(0), |acc, term| acc + term);

    let results = to.iter().zip(strides(to)).enumerate().map(|(i, (&size, stride))| {
        let quotient = linear.clone().floor_div(stride as i64);
        if i == 0 { quotient } else { quotient.modulo(size as i64) }
    });

    let dimensions = from.iter().enumerate().map(|(i, &d)| Variable::new(format!("d{i}"), Interval::extent(d)));
    IndexingMap::new(dimensions.collect(), Vec::new(), results, Vec::new()).simplify()
}
