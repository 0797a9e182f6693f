//! Bounded search driver for envrig environment models.
//!
//! The core exposes every legal interleaving of a model as a distinct
//! deterministic path keyed by its choice sequence; this crate is the
//! driver that resumes the search along each alternative:
//!
//! ```text
//! 1. Run a path with a scripted choice prefix (empty at first)
//! 2. Record which branch points it passed and which ordinals it took
//! 3. Backtrack to the deepest branch point with an untried ordinal,
//!    extend the prefix, re-run
//! 4. Repeat until the tree is exhausted or the path/choice budgets end
//! ```
//!
//! Exhaustive depth-first enumeration covers small models completely; a
//! seeded random walk samples state spaces too big to exhaust, and is
//! deterministic given its seed.  Every violating path is kept as a
//! replayable [`Counterexample`](counterexample::Counterexample): its
//! choice sequence fed back as a scripted prefix reproduces the identical
//! trace and verdict.

pub mod counterexample;
pub mod explorer;

pub use counterexample::Counterexample;
pub use explorer::{ExplorationReport, ExploreError, Explorer, ExplorerConfig, SearchMode};
