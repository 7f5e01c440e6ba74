//! Property-based tests for the reduction emitter.
//!
//! Random shapes, reduced dimensions, combiners and warp sizes; every emittable reduction must cover its
//! input once, write every output once and agree with a sequential fold.
