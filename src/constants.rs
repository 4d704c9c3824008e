//! Default values and numeric tolerances.

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 42;

/// Default number of permutation replicates.
pub const DEFAULT_REPLICATES: usize = 1_000;

/// Default number of random subsets drawn per rarefied size.
pub const DEFAULT_RAREFACTION_DRAWS: usize = 20;

/// Relative tolerance when comparing null effects against the observed one.
///
/// Effects that differ only by floating-point rounding count as ties, which
/// keeps p-values unchanged when the data are rescaled.
pub const TIE_TOLERANCE: f64 = 1e-9;

/// Salt separating the rarefaction subset stream from the null stream.
pub const RAREFACTION_STREAM: u64 = 0x5241_5245_4641_4354; // "RAREFACT"
