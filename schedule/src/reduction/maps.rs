//! Construction of thread-to-element indexing maps.
//!
//! Every map of a reduction launch shares the domain `(thread_id, block_id, group_id)`. Symbols enumerate
//! the elements one thread touches; a symbol that no result depends on is collapsed to `[0, 0]`.

use strata_ir::{AffineExpr, IndexingMap, Interval, Variable};

use super::tiling::TileConfiguration;

pub const THREAD: usize = 0;
pub const BLOCK: usize = 1;
pub const GROUP: usize = 2;

/// Domain of the launch: `d0 = thread_id`, `d1 = block_id`, `d2 = group_id`.
pub fn launch_domain(tiling: &TileConfiguration, num_groups: usize) -> Vec<Variable> {
    vec![
        Variable::new("thread_id", Interval::extent(tiling.total_threads())),
        Variable::new("block_id", Interval::extent(tiling.total_blocks())),
        Variable::new("group_id", Interval::extent(num_groups)),
    ]
}

/// One symbol per tile dimension, ranging over the per-thread tile.
pub fn tile_symbols(tiling: &TileConfiguration) -> Vec<Variable> {
    let extents = tiling.tile_per_thread.iter().enumerate();
    extents.map(|(i, &n)| Variable::new(format!("tile_{i}"), Interval::extent(n))).collect()
}

/// Per-dimension coordinates of a linear id over a row-major grid (`thread_id` over `num_threads`, ...).
pub fn delinearize(id: AffineExpr, sizes: &[usize; 4]) -> [AffineExpr; 4] {
    let mut stride = 1i64;
    let mut coords: [AffineExpr; 4] = std::array::from_fn(|_| AffineExpr::constant(0));
    for i in (0..4).rev() {
        let size = sizes[i] as i64;
        coords[i] = if size == 1 {
            AffineExpr::constant(0)
        } else if i == 0 {
            id.clone().floor_div(stride)
        } else {
            id.clone().floor_div(stride).modulo(size)
        };
        stride *= size;
    }
    coords
}

/// Build and simplify a map over the launch domain.
///
/// Symbols not referenced by `results` are collapsed to the point `[0, 0]`, so iterating the symbol domain
/// never visits the same result twice.
pub fn indexing_map(
    dimensions: Vec<Variable>,
    mut symbols: Vec<Variable>,
    results: Vec<AffineExpr>,
    constraints: Vec<(AffineExpr, Interval)>,
) -> IndexingMap {
    for (i, symbol) in symbols.iter_mut().enumerate() {
        if !results.iter().any(|r| r.uses_symbol(i)) {
            symbol.bounds = Interval::point(0);
        }
    }
    IndexingMap::new(dimensions, symbols, results, constraints).simplify()
}

/// Restrict a launch map to one group.
pub fn for_group(map: &IndexingMap, group: usize) -> IndexingMap {
    map.clone().with_constraint(AffineExpr::dim(GROUP), Interval::point(group as i64)).simplify()
}
