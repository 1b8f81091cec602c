// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use std::fmt;

/// The order tests are run in within each group.
///
/// Groups themselves always run in discovery order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TestOrder {
    /// A uniformly random permutation, derived from the seed.
    ///
    /// The same seed and test list always produce the same order.
    Shuffle {
        /// The seed for the random number generator.
        seed: u64,
    },

    /// Discovery order.
    Discovery,
}

impl TestOrder {
    /// Returns a shuffled order with a seed taken from the OS's entropy source.
    pub fn random() -> Self {
        TestOrder::Shuffle {
            seed: rand::random(),
        }
    }

    /// Returns an orderer for a run. Each group is permuted by successive calls to
    /// [`TestOrderer::order`].
    pub(crate) fn orderer(self) -> TestOrderer {
        let rng = match self {
            TestOrder::Shuffle { seed } => Some(StdRng::seed_from_u64(seed)),
            TestOrder::Discovery => None,
        };
        TestOrderer { rng }
    }
}

impl fmt::Display for TestOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOrder::Shuffle { seed } => write!(f, "shuffled (seed {seed})"),
            TestOrder::Discovery => write!(f, "discovery order"),
        }
    }
}

/// Stateful orderer for a single run.
#[derive(Debug)]
pub(crate) struct TestOrderer {
    rng: Option<StdRng>,
}

impl TestOrderer {
    pub(crate) fn order<T>(&mut self, items: &mut [T]) {
        if let Some(rng) = &mut self.rng {
            items.shuffle(rng);
        }
    }
}
