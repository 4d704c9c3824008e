//! Analysis module for trait-shift testing.
//!
//! This module implements the resampling layer of the pipeline:
//!
//! 1. **Permutation test** ([`permutation`]): Observed shift of the change subset
//!    against a null of equally sized samples drawn without replacement
//! 2. **Rarefaction** ([`rarefaction`]): The same test repeated over subset sizes
//!    `1..=n`, showing how much of the signal a handful of tips carry

mod permutation;
mod rarefaction;

pub use permutation::{permutation_test, PermutationTest};
