use proptest::prelude::*;

use crate::indexing::{AffineExpr, IndexingMap, Interval, Variable};

use super::generators::*;

/// Every point of a small box.
fn points(bounds: &[Interval]) -> Vec<Vec<i64>> {
    bounds.iter().fold(vec![Vec::new()], |acc, b| {
        acc.into_iter().flat_map(|p| (b.lower..=b.upper).map(move |v| [p.clone(), vec![v]].concat())).collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Simplification never changes the value inside the declared bounds.
    #[test]
    fn simplify_preserves_evaluation(
        expr in arb_affine_expr(2, 1),
        d0 in arb_interval(),
        d1 in arb_interval(),
        s0 in arb_interval(),
    ) {
        let dims = [d0, d1];
        let syms = [s0];
        let simplified = expr.simplify(&dims, &syms);

        for dim_point in points(&dims) {
            for sym_point in points(&syms) {
                prop_assert_eq!(
                    expr.evaluate(&dim_point, &sym_point),
                    simplified.evaluate(&dim_point, &sym_point),
                    "{} simplified to {} at {:?}{:?}", expr, simplified, dim_point, sym_point
                );
            }
        }
    }

    /// The computed range contains every value the expression takes.
    #[test]
    fn range_is_conservative(expr in arb_affine_expr(2, 0), d0 in arb_interval(), d1 in arb_interval()) {
        let dims = [d0, d1];
        let range = expr.range(&dims, &[]);
        for point in points(&dims) {
            let value = expr.evaluate(&point, &[]);
            prop_assert!(range.contains(value), "{} = {} at {:?} escapes {}", expr, value, point, range);
        }
    }

    /// Simplifying twice gives the same expression as simplifying once.
    #[test]
    fn simplify_is_idempotent(expr in arb_affine_expr(2, 1), d0 in arb_interval(), d1 in arb_interval()) {
        let dims = [d0, d1];
        let syms = [Interval::new(0, 3)];
        let once = expr.simplify(&dims, &syms);
        let twice = once.simplify(&dims, &syms);
        prop_assert_eq!(once.evaluate(&[d0.lower, d1.upper], &[2]), twice.evaluate(&[d0.lower, d1.upper], &[2]));
    }

    /// Map simplification keeps the image and the domain membership of every box point.
    #[test]
    fn map_simplify_preserves_domain(
        result in arb_affine_expr(2, 0),
        constraint in arb_affine_expr(2, 0),
        allowed in arb_interval(),
    ) {
        let dimensions = vec![Variable::new("x", Interval::new(0, 5)), Variable::new("y", Interval::new(0, 4))];
        let map = IndexingMap::new(dimensions, Vec::new(), [result], vec![(constraint, allowed)]);
        let simplified = map.clone().simplify();

        for point in map.dimension_points() {
            prop_assert_eq!(map.evaluate(&point, &[]), simplified.evaluate(&point, &[]), "at {:?}", point);
        }
    }
}

#[test]
fn points_helper_covers_box() {
    let bounds = [Interval::new(0, 1), Interval::new(-1, 1)];
    assert_eq!(points(&bounds).len(), 6);
    assert_eq!(AffineExpr::constant(3).simplify(&bounds, &[]), AffineExpr::constant(3));
}
