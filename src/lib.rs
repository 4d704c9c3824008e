//! # clade-shift
//!
//! Test whether a continuous trait shifts where a binary trait changes state
//! on a phylogeny.
//!
//! The pipeline has three stages:
//! - Reconstruct the binary trait (presence/absence of a defense structure) at
//!   every internal node, by topology majority or by a two-state Markov model
//!   on branch lengths
//! - Walk the tree once, assigning every clade an origination state and sorting
//!   tip values into `normal` (consistent with the clade's origin) and `change`
//!   (measured at a state change)
//! - Permutation-test whether the statistic (median by default) of the change
//!   values differs from the pooled distribution, optionally rarefied over the
//!   number of change values
//!
//! ## Quick Start
//!
//! ```
//! use clade_shift::tree::TreeModel;
//! use clade_shift::{CladeShift, State, Taxon};
//!
//! // ((A,B),C,D), tips first: A=0 B=1 C=2 D=3, then (A,B)=4, root=5
//! let tree = TreeModel::from_structure(
//!     vec![Some(4), Some(4), Some(5), Some(5), Some(5), None],
//!     vec![Some(1.0), Some(1.0), Some(2.0), Some(2.0), Some(1.0), None],
//!     vec!["A".into(), "B".into(), "C".into(), "D".into()],
//! )
//! .unwrap();
//!
//! let taxa = vec![
//!     Taxon::new("A", 1.2, State::Absent),
//!     Taxon::new("B", 1.5, State::Absent),
//!     Taxon::new("C", 14.0, State::Present),
//!     Taxon::new("D", 16.0, State::Present),
//! ];
//!
//! let report = CladeShift::new().seed(7).run(&tree, &taxa).unwrap();
//! println!("p = {:.3}", report.test.p_value);
//! ```
//!
//! The tester is usable on its own:
//!
//! ```
//! use clade_shift::analysis::PermutationTest;
//! use clade_shift::statistics::Median;
//!
//! let pooled: Vec<f64> = (1..=10).map(f64::from).collect();
//! let result = PermutationTest::new(1000).test(&pooled, &[8, 9], &Median).unwrap();
//! assert_eq!(result.observed, -4.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod constants;
mod error;
mod result;
mod shift;
mod types;

// Functional modules
pub mod analysis;
pub mod ancestral;
pub mod changes;
pub mod output;
pub mod statistics;
pub mod tree;

#[cfg(feature = "parallel")]
pub(crate) mod thread_pool;

// Re-exports for public API
pub use ancestral::{Method, Rate, Reconstruction};
pub use config::{Alternative, Config, Pooling};
pub use constants::{DEFAULT_RAREFACTION_DRAWS, DEFAULT_REPLICATES, DEFAULT_SEED, TIE_TOLERANCE};
pub use error::{Error, Result};
pub use result::{
    ChangeBundle, Clade, ExpectedVariability, RarefactionPoint, ShiftReport, TestResult,
};
pub use shift::CladeShift;
pub use tree::{NodeId, TreeModel};
pub use types::{NodeStates, State, Taxon};

/// Convenience function: run the full pipeline with default configuration
/// and the given estimation method.
///
/// # Errors
///
/// See [`CladeShift::run`].
pub fn analyze(tree: &TreeModel, taxa: &[Taxon], method: Method) -> Result<ShiftReport> {
    CladeShift::new().method(method).run(tree, taxa)
}
