//! Dense row-major shapes and index arithmetic.

use smallvec::SmallVec;

/// Static tensor shape, outermost dimension first.
pub type Shape = SmallVec<[usize; 4]>;

/// Multi-dimensional element index (or a tuple of indexing-map results).
pub type Index = SmallVec<[i64; 4]>;

/// Number of elements of a shape (1 for scalars).
pub fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides in elements.
pub fn strides(shape: &[usize]) -> SmallVec<[usize; 4]> {
    let mut strides: SmallVec<[usize; 4]> = SmallVec::from_elem(1, shape.len());
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Linear offset of an in-bounds `index`.
pub fn linearize(index: &[i64], shape: &[usize]) -> usize {
    debug_assert_eq!(index.len(), shape.len());
    index.iter().zip(shape).fold(0, |acc, (&i, &d)| {
        debug_assert!(i >= 0 && (i as usize) < d, "index {index:?} is out of bounds for {shape:?}");
        acc * d + i as usize
    })
}

/// Inverse of [`linearize`].
pub fn delinearize(mut linear: usize, shape: &[usize]) -> Index {
    let mut index: Index = SmallVec::from_elem(0, shape.len());
    for (slot, &d) in index.iter_mut().zip(shape).rev() {
        *slot = (linear % d) as i64;
        linear /= d;
    }
    index
}

/// Shape with the listed dimensions removed.
pub fn remove_dims(shape: &[usize], dims: &[usize]) -> Shape {
    shape.iter().enumerate().filter(|(i, _)| !dims.contains(i)).map(|(_, &d)| d).collect()
}
