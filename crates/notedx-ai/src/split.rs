//! Per-class holdout split.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Indices into the corpus. Both lists preserve a fixed, seed-determined order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold out exactly one example per distinct label.
///
/// Labels are visited in order of first appearance and the held-out member
/// of each is drawn from a `StdRng` seeded with `seed`. A label with a single
/// example ends up only in `test`. Every other label appears in both
/// partitions. `train` keeps corpus order; `test` follows label order.
pub fn stratified_holdout(labels: &[String], seed: u64) -> Split {
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        match groups.iter_mut().find(|(l, _)| *l == label.as_str()) {
            Some((_, members)) => members.push(i),
            None => groups.push((label.as_str(), vec![i])),
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut held_out = vec![false; labels.len()];
    let mut test = Vec::with_capacity(groups.len());
    for (label, members) in &groups {
        let pick = members[rng.random_range(0..members.len())];
        held_out[pick] = true;
        test.push(pick);
        if members.len() == 1 {
            warn!(label, "label has a single example; it is held out and absent from training");
        }
    }

    let train = (0..labels.len()).filter(|&i| !held_out[i]).collect();
    Split { train, test }
}
