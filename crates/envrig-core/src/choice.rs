//! The choice oracle — nondeterministic branch points made explicit.
//!
//! Every call to [`ChoiceSource::choose`] is an independent branch point
//! in the search tree, not a random draw: the value comes from a scripted
//! prefix (the path currently being explored or replayed) and, past the
//! prefix, from a tail policy.  Every resolution is recorded as a
//! [`ChoiceRecord`], and the resulting [`ChoiceSeq`] *is* the path's
//! identity — feeding it back as the prefix reproduces the identical run.
//!
//! There is no memoization and no bias: the oracle keeps no state that
//! couples one call to the next beyond the running sequence id.

use crate::error::ChoiceError;
use envrig_model::Domain;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One resolved branch point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRecord {
    /// Position of this choice within its path (0-based).
    pub sequence_id: u64,
    /// What was being decided, for auditing counterexamples.
    pub label: String,
    /// Size of the domain presented at this branch point.
    pub n_options: u64,
    /// 0-based ordinal picked within the domain.
    pub ordinal: u64,
}

/// The full choice sequence of one explored path — its replay key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceSeq {
    records: Vec<ChoiceRecord>,
}

impl ChoiceSeq {
    pub fn new(records: Vec<ChoiceRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ChoiceRecord] {
        &self.records
    }

    /// The raw ordinal sequence, usable as a scripted prefix.
    pub fn ordinals(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.ordinal).collect()
    }
}

/// How choices past the scripted prefix are resolved.
#[derive(Debug, Clone)]
enum TailPolicy {
    /// Always the first ordinal — the backbone of exhaustive search.
    First,
    /// Seeded uniform draw — deterministic given the seed.
    Seeded(ChaCha8Rng),
}

/// Resolves choices for one path: scripted prefix first, tail policy
/// after, with every resolution recorded.
#[derive(Debug, Clone)]
pub struct ChoiceSource {
    prefix: Vec<u64>,
    tail: TailPolicy,
    budget: u64,
    taken: Vec<ChoiceRecord>,
}

impl ChoiceSource {
    /// Follow `prefix`, then take the first ordinal at every further
    /// branch point.  `budget` caps total choices per path.
    pub fn scripted(prefix: Vec<u64>, budget: u64) -> Self {
        Self {
            prefix,
            tail: TailPolicy::First,
            budget,
            taken: Vec::new(),
        }
    }

    /// Follow `prefix`, then draw uniformly from a ChaCha stream seeded
    /// with `seed`.  Identical seeds give identical paths.
    pub fn seeded(prefix: Vec<u64>, seed: u64, budget: u64) -> Self {
        Self {
            prefix,
            tail: TailPolicy::Seeded(ChaCha8Rng::seed_from_u64(seed)),
            budget,
            taken: Vec::new(),
        }
    }

    /// Pick an unconstrained value from `domain`.
    ///
    /// Returns the domain *value* (not the ordinal).  An empty domain is
    /// a caller contract violation; running past the budget terminates
    /// the path.
    pub fn choose(&mut self, label: &str, domain: &Domain) -> Result<u64, ChoiceError> {
        let n_options = domain.size();
        if n_options == 0 {
            return Err(ChoiceError::EmptyDomain {
                label: label.to_string(),
            });
        }

        let sequence_id = self.taken.len() as u64;
        if sequence_id >= self.budget {
            return Err(ChoiceError::BudgetExhausted {
                budget: self.budget,
            });
        }

        let ordinal = match self.prefix.get(sequence_id as usize) {
            Some(&scripted) => {
                if scripted >= n_options {
                    return Err(ChoiceError::ScriptOutOfDomain {
                        label: label.to_string(),
                        ordinal: scripted,
                        n_options,
                    });
                }
                scripted
            }
            None => match &mut self.tail {
                TailPolicy::First => 0,
                TailPolicy::Seeded(rng) => rng.gen_range(0..n_options),
            },
        };

        self.taken.push(ChoiceRecord {
            sequence_id,
            label: label.to_string(),
            n_options,
            ordinal,
        });

        domain
            .value_at(ordinal)
            .ok_or(ChoiceError::ScriptOutOfDomain {
                label: label.to_string(),
                ordinal,
                n_options,
            })
    }

    /// Boolean branch point.
    pub fn choose_bool(&mut self, label: &str) -> Result<bool, ChoiceError> {
        Ok(self.choose(label, &Domain::Bool)? == 1)
    }

    /// Index branch point over `0..n`.
    pub fn choose_index(&mut self, label: &str, n: u32) -> Result<usize, ChoiceError> {
        Ok(self.choose(label, &Domain::Index(n))? as usize)
    }

    /// Choices resolved so far.
    pub fn records(&self) -> &[ChoiceRecord] {
        &self.taken
    }

    /// Number of choices resolved so far.
    pub fn choices_taken(&self) -> u64 {
        self.taken.len() as u64
    }

    /// Consume the source, yielding the path's choice sequence.
    pub fn into_seq(self) -> ChoiceSeq {
        ChoiceSeq::new(self.taken)
    }
}
