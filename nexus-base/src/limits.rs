// Pipeline-wide limits and defaults. Named here instead of left as magic
// numbers at the call site, the way submerge-coldb names its chunk/track/
// block sizes as constants even when only used in one place.

/// Step 4 (completion to fixed point) gives up after this many rounds
/// without convergence and fails with `SubmitErrorKind::CompletionCycle`.
pub const MAX_ITERATIONS: u32 = 100;

/// Default closeness threshold used by the default structural equality
/// predicate's real-number comparisons (§4.5), before any
/// `NexusManager::tolerance` override.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;
