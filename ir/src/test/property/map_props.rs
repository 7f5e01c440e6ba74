use proptest::prelude::*;

use crate::indexing::{IndexingMap, bitcast_map};
use crate::shape::{delinearize, linearize, num_elements};

use super::generators::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A bitcast sends every index to the index with the same linear offset.
    #[test]
    fn bitcast_preserves_linear_offset(shape in arb_shape(4, 5), split in 1usize..=3) {
        let total = num_elements(&shape);
        let target = if total % split == 0 { vec![split, total / split] } else { vec![total] };
        let map = bitcast_map(&shape, &target);

        for point in map.dimension_points() {
            let image = map.evaluate(&point, &[]).expect("bitcast is total on its domain");
            prop_assert_eq!(linearize(&point, &shape), linearize(&image, &target));
        }
    }

    /// Bitcasting there and back simplifies to the identity.
    #[test]
    fn bitcast_round_trip_is_identity(shape in arb_shape(3, 6)) {
        let flat = vec![num_elements(&shape)];
        let round_trip = bitcast_map(&shape, &flat).compose(&bitcast_map(&flat, &shape)).simplify();

        let identity = IndexingMap::identity(&shape).simplify();
        prop_assert_eq!(round_trip.results(), identity.results());
        prop_assert!(round_trip.constraints().is_empty(), "unexpected constraints in\n{}", round_trip);
    }

    /// Iteration visits each point of the box exactly once in row-major order.
    #[test]
    fn points_enumerate_box(shape in arb_shape(3, 4)) {
        let map = IndexingMap::identity(&shape);
        let points: Vec<_> = map.dimension_points().collect();

        prop_assert_eq!(points.len(), num_elements(&shape));
        for (linear, point) in points.iter().enumerate() {
            prop_assert_eq!(point, &delinearize(linear, &shape));
        }
    }
}
