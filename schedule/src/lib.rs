//! Reduction fusion emitter for the Strata compiler.
//!
//! Turns a fusion whose roots are reductions (plus elementwise epilogues and side outputs) into a launch
//! configuration, thread-to-element indexing maps and a per-group SIMT program.
//!
//! # Module Organization
//!
//! - [`reduction`] - Shape analysis, tiling, row/column strategies, programs and the epilogue
//! - [`simulate`] - Reference execution of emitted programs over host tensors
//! - [`device`] - Target device capabilities
//! - [`config`] - Tile heuristic configuration (builder and environment)
//! - [`launch`] - Launch dimensions
//! - [`error`] - Error types and result handling

pub mod config;
pub mod device;
pub mod error;
pub mod launch;
pub mod reduction;
pub mod simulate;


pub use config::ReductionConfig;
pub use device::DeviceDescription;
pub use error::{Error, Result};
pub use launch::LaunchDimensions;
pub use reduction::{
    EmittedGroup, EpilogueEvaluator, EpilogueValue, GroupIndexing, ReductionFusion, ReductionGroup, ReductionKind,
    ReductionProgram, ReductionStep, ReductionStrategy, ShapeAnalysis, TileConfiguration,
};
pub use simulate::{HostTensor, simulate};
