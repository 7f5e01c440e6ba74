use strata_ir::{BinaryOp, DType, Fusion, Instruction, ReduceOp, UnaryOp};

use crate::error::Error;
use crate::reduction::{ReductionKind, RootKind, ShapeAnalysis};
use crate::test::helpers::{reduce, reduce_of};
use crate::{DeviceDescription, ReductionConfig, ReductionFusion};

fn analyze(fusion: &Fusion) -> Result<ShapeAnalysis, Error> {
    ShapeAnalysis::new(fusion, &DeviceDescription::with_warp_size(4), &ReductionConfig::default())
}

fn fusion(roots: Vec<std::sync::Arc<Instruction>>) -> Fusion {
    Fusion::new("test", roots).unwrap()
}

// =============================================================================
// Accepted fusions
// =============================================================================

#[test]
fn test_single_row_reduction() {
    let analysis = analyze(&fusion(vec![reduce(&[2, 3, 4], &[2], ReduceOp::Add, DType::Float32)])).unwrap();

    assert_eq!(analysis.input_shape.as_slice(), &[2, 3, 4]);
    assert_eq!(analysis.reduced_dims.as_slice(), &[2]);
    assert_eq!(analysis.dimensions.kind, ReductionKind::Row);
    assert_eq!(analysis.dimensions.dimensions, [1, 6, 4]);
    assert_eq!(analysis.kept_shape.as_slice(), &[6]);
    assert_eq!(analysis.element_bytes, 4);
    assert_eq!(analysis.groups.len(), 1);
    assert_eq!(analysis.num_heroes(), 1);
}

#[test]
fn test_roots_sharing_a_hero_form_one_group() {
    let sum = reduce(&[4, 8], &[1], ReduceOp::Add, DType::Int32);
    let negated = Instruction::unary(UnaryOp::Neg, &sum).unwrap();
    let analysis = analyze(&fusion(vec![sum, negated])).unwrap();

    assert_eq!(analysis.groups.len(), 1);
    let group = &analysis.groups[0];
    assert_eq!(group.heroes.len(), 1);
    assert_eq!(group.reduction_roots().map(|r| r.position).collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn test_shared_heroes_merge_groups() {
    let input = Instruction::parameter(0, DType::Int32, &[4, 8]);
    let sum = reduce_of(&input, &[1], ReduceOp::Add);
    let max = reduce_of(&input, &[1], ReduceOp::Max);
    let min = reduce_of(&input, &[1], ReduceOp::Min);
    let spread = Instruction::binary(BinaryOp::Sub, &max, &sum).unwrap();

    let analysis = analyze(&fusion(vec![sum.clone(), spread, min])).unwrap();
    assert_eq!(analysis.groups.len(), 2);
    assert_eq!(analysis.groups[0].heroes.len(), 2);
    assert_eq!(analysis.groups[0].roots.len(), 2);
    assert_eq!(analysis.groups[1].heroes.len(), 1);
    assert_eq!(analysis.group_of_root(2).map(|g| g.id), Some(1));
    assert_eq!(analysis.groups[0].hero_index(&sum), Some(0));
    assert_eq!(analysis.num_heroes(), 2);
}

#[test]
fn test_side_output_joins_group_of_its_input() {
    let input = Instruction::parameter(0, DType::Int32, &[4, 8]);
    let sum = reduce_of(&input, &[1], ReduceOp::Add);
    let doubled = Instruction::binary(BinaryOp::Add, &input, &input).unwrap();

    let analysis = analyze(&fusion(vec![sum, doubled])).unwrap();
    let group = &analysis.groups[0];
    assert_eq!(group.side_outputs().map(|r| r.position).collect::<Vec<_>>(), vec![1]);
    assert_eq!(group.root(1).map(|r| r.kind), Some(RootKind::SideOutput));
}

#[test]
fn test_element_bytes_is_widest_hero() {
    let narrow = reduce(&[4, 8], &[0], ReduceOp::Add, DType::Float32);
    let wide = reduce_of(&Instruction::parameter(1, DType::Float64, &[4, 8]), &[0], ReduceOp::Add);
    let analysis = analyze(&fusion(vec![narrow, wide])).unwrap();

    assert_eq!(analysis.groups.len(), 2);
    assert_eq!(analysis.element_bytes, 8);
}

// =============================================================================
// Rejected fusions
// =============================================================================

#[test]
fn test_rejects_fusion_without_reduction() {
    let input = Instruction::parameter(0, DType::Int32, &[4]);
    let err = analyze(&fusion(vec![Instruction::unary(UnaryOp::Neg, &input).unwrap()])).unwrap_err();
    assert_eq!(err, Error::NoReduction { fusion: "test".to_string() });
    assert!(err.is_unsupported_shape());
}

#[test]
fn test_rejects_chained_reduction() {
    let inner = reduce(&[4, 8], &[1], ReduceOp::Add, DType::Int32);
    let outer = reduce_of(&inner, &[0], ReduceOp::Max);
    let err = analyze(&fusion(vec![outer.clone()])).unwrap_err();
    assert_eq!(err, Error::ChainedReduction { hero: outer.id() });
}

#[test]
fn test_rejects_heroes_of_different_shapes() {
    let a = reduce(&[4, 8], &[1], ReduceOp::Add, DType::Int32);
    let b = reduce_of(&Instruction::parameter(1, DType::Int32, &[8, 4]), &[1], ReduceOp::Add);
    let err = analyze(&fusion(vec![a, b])).unwrap_err();
    assert!(matches!(err, Error::IncompatibleHeroes { .. }), "{err}");
    assert!(err.is_unsupported_shape());
}

#[test]
fn test_rejects_heroes_over_different_dims() {
    let input = Instruction::parameter(0, DType::Int32, &[4, 8]);
    let rows = reduce_of(&input, &[1], ReduceOp::Add);
    let columns = reduce_of(&input, &[0], ReduceOp::Add);
    let err = analyze(&fusion(vec![rows, columns])).unwrap_err();
    assert!(matches!(err, Error::IncompatibleHeroes { .. }), "{err}");
}

#[test]
fn test_rejects_interleaved_layout() {
    let err = analyze(&fusion(vec![reduce(&[2, 3, 4, 5], &[1, 3], ReduceOp::Add, DType::Int32)])).unwrap_err();
    assert!(matches!(err, Error::UnsupportedLayout { ref dims, .. } if dims == &[1, 3]), "{err}");
}

#[test]
fn test_rejects_parameter_init() {
    let input = Instruction::parameter(0, DType::Int32, &[4, 8]);
    let init = Instruction::parameter(1, DType::Int32, &[]);
    let sum = Instruction::reduce(&input, &init, &[1], ReduceOp::Add).unwrap();
    let err = analyze(&fusion(vec![sum.clone()])).unwrap_err();
    assert_eq!(err, Error::NonConstantInit { hero: sum.id() });
}

#[test]
fn test_rejects_empty_input() {
    let err = analyze(&fusion(vec![reduce(&[0, 4], &[1], ReduceOp::Add, DType::Int32)])).unwrap_err();
    assert!(matches!(err, Error::EmptyTensor { .. }), "{err}");
}

#[test]
fn test_rejects_orphan_side_output() {
    let sum = reduce(&[4, 8], &[1], ReduceOp::Add, DType::Int32);
    let other = Instruction::parameter(1, DType::Int32, &[4, 8]);
    let negated = Instruction::unary(UnaryOp::Neg, &other).unwrap();
    let err = analyze(&fusion(vec![sum, negated])).unwrap_err();
    assert_eq!(err, Error::OrphanSideOutput { root: 1 });
}

#[test]
fn test_rejects_side_outputs_in_two_groups() {
    let a = Instruction::parameter(0, DType::Int32, &[4, 8]);
    let b = Instruction::parameter(1, DType::Int32, &[4, 8]);
    let roots = vec![
        reduce_of(&a, &[1], ReduceOp::Add),
        reduce_of(&b, &[1], ReduceOp::Add),
        Instruction::unary(UnaryOp::Neg, &a).unwrap(),
        Instruction::unary(UnaryOp::Neg, &b).unwrap(),
    ];
    let err = analyze(&fusion(roots)).unwrap_err();
    assert_eq!(err, Error::TooManySideOutputGroups { count: 2 });
}

#[test]
fn test_rejects_broadcast_epilogue_operand() {
    let sum = reduce(&[4, 8], &[1], ReduceOp::Add, DType::Int32);
    let scale = Instruction::parameter(1, DType::Int32, &[]);
    let scaled = Instruction::binary(BinaryOp::Mul, &sum, &scale).unwrap();
    let err = analyze(&fusion(vec![scaled])).unwrap_err();
    assert!(matches!(err, Error::EpilogueOperandShape { root: 0, .. }), "{err}");
}

#[test]
fn test_rejects_shared_memory_overflow() {
    let device = DeviceDescription { shared_memory_per_block: 64, ..DeviceDescription::with_warp_size(4) };
    let fusion = fusion(vec![reduce(&[5, 6], &[0], ReduceOp::Add, DType::Int32)]);
    let err = ReductionFusion::new(&fusion, &device, &ReductionConfig::default()).unwrap_err();
    // Column tile [1, 4, 5] of i32.
    assert_eq!(err, Error::SharedMemoryExceeded { required: 80, available: 64 });
    assert!(err.is_unsupported_shape());
}

#[test]
fn test_simulation_errors_are_not_shape_rejections() {
    assert!(!Error::MissingOutputWrite { root: 0, index: Default::default() }.is_unsupported_shape());
    assert!(!Error::ArgumentMismatch { index: 0, reason: String::new() }.is_unsupported_shape());
}
