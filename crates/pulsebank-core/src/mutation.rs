//! Algorithmic pattern variations.
//!
//! Every operator rewrites all sixteen voices of one [`BankSlot`] at the
//! slot's cycle length. Operators that need randomness take the RNG as a
//! parameter so variations can be reproduced from a seed.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bank::BankSlot;
use crate::indispensability;
use crate::{MAX_STEPS, NUM_VOICES};

/// A pattern variation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    Reverse,
    RotateLeft,
    RotateRight,
    /// Double the length and mirror the first half into the second.
    Palindrome,
    /// Double the length and repeat the first half.
    Double,
    /// Resample each voice from its own first-order transition counts.
    MarkovHorizontal,
    /// Shuffle metric cells, keeping each cell's steps together.
    CellShuffle,
}

impl Mutation {
    pub const ALL: [Mutation; 7] = [
        Mutation::Reverse,
        Mutation::RotateLeft,
        Mutation::RotateRight,
        Mutation::Palindrome,
        Mutation::Double,
        Mutation::MarkovHorizontal,
        Mutation::CellShuffle,
    ];

    /// Apply this variation to a slot.
    pub fn apply(self, slot: &mut BankSlot, rng: &mut impl Rng) {
        match self {
            Mutation::Reverse => reverse(slot),
            Mutation::RotateLeft => rotate_left(slot),
            Mutation::RotateRight => rotate_right(slot),
            Mutation::Palindrome => palindrome(slot),
            Mutation::Double => double(slot),
            Mutation::MarkovHorizontal => markov_horizontal(slot, rng),
            Mutation::CellShuffle => cell_shuffle(slot, rng),
        }
    }
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mutation::Reverse => "reverse",
            Mutation::RotateLeft => "rotate_left",
            Mutation::RotateRight => "rotate_right",
            Mutation::Palindrome => "palindrome",
            Mutation::Double => "double",
            Mutation::MarkovHorizontal => "markov_horizontal",
            Mutation::CellShuffle => "cell_shuffle",
        };
        f.write_str(name)
    }
}

/// Rewrite every voice through a step permutation: the value at `j` moves
/// to `target(j)`.
fn permute(slot: &mut BankSlot, target: impl Fn(usize, usize) -> usize) {
    let n = slot.num_beats();
    for voice in slot.voices_mut().iter_mut() {
        let old: Vec<bool> = voice.pattern().to_vec();
        for (j, &on) in old.iter().enumerate() {
            voice.set_beat(target(j, n), on);
        }
    }
}

/// Step `j` moves to `n - 1 - j`.
pub fn reverse(slot: &mut BankSlot) {
    permute(slot, |j, n| n - 1 - j);
}

/// Step `j` moves to `j - 1`, wrapping.
pub fn rotate_left(slot: &mut BankSlot) {
    permute(slot, |j, n| (j + n - 1) % n);
}

/// Step `j` moves to `j + 1`, wrapping.
pub fn rotate_right(slot: &mut BankSlot) {
    permute(slot, |j, n| (j + 1) % n);
}

fn doubled_length(slot: &BankSlot) -> usize {
    (slot.num_beats() * 2).min(MAX_STEPS)
}

/// Grow to `min(2n, 32)` steps and mirror the first half around the middle.
pub fn palindrome(slot: &mut BankSlot) {
    let n = doubled_length(slot);
    slot.set_num_beats(n);
    for voice in slot.voices_mut().iter_mut() {
        for j in 0..n / 2 {
            let on = voice.step(j);
            voice.set_beat(n - 1 - j, on);
        }
    }
}

/// Grow to `min(2n, 32)` steps and repeat the first half.
pub fn double(slot: &mut BankSlot) {
    let n = doubled_length(slot);
    slot.set_num_beats(n);
    for voice in slot.voices_mut().iter_mut() {
        for j in 0..n / 2 {
            let on = voice.step(j);
            voice.set_beat(n / 2 + j, on);
        }
    }
}

/// Resample every voice from a two-state Markov chain of its own steps.
///
/// Transitions are counted with wrap-around. The first step is drawn from
/// the column totals of the table, each following step from the row of the
/// previously drawn step. Each decision uses one uniform draw.
pub fn markov_horizontal(slot: &mut BankSlot, rng: &mut impl Rng) {
    let n = slot.num_beats();
    for voice in slot.voices_mut().iter_mut() {
        let mut table = [[0u32; 2]; 2];
        for j in 0..n {
            let from = voice.step(j) as usize;
            let to = voice.step((j + 1) % n) as usize;
            table[from][to] += 1;
        }

        let totals = [table[0][0] + table[1][0], table[0][1] + table[1][1]];
        let mut current = draw(rng, totals);
        for j in 0..n {
            voice.set_beat(j, current);
            current = draw(rng, table[current as usize]);
        }
    }
}

/// Pick `false` with weight `counts[0]` and `true` with weight `counts[1]`.
fn draw(rng: &mut impl Rng, counts: [u32; 2]) -> bool {
    let total = counts[0] + counts[1];
    let r = rng.random::<f64>() * total as f64;
    r >= counts[0] as f64
}

/// Lengths of the metric cells of an `n`-step cycle.
///
/// A new cell starts after every interior local maximum of the weight
/// table; the lengths always sum to `n`. Cycles shorter than three steps
/// form a single cell.
pub fn cell_lengths(n: usize) -> Vec<usize> {
    if n < 3 {
        return vec![n];
    }
    let mut lengths = Vec::new();
    let mut count = 1;
    let maxima: Vec<usize> = indispensability::weights(n).local_maxima().collect();
    for i in 1..n - 1 {
        if maxima.contains(&i) {
            lengths.push(count);
            count = 1;
        } else {
            count += 1;
        }
    }
    lengths.push(count + 1);
    lengths
}

/// Shuffle the metric cells of the slot.
///
/// The voices of each step move together and steps keep their order inside
/// a cell, so every voice keeps its number of active steps.
pub fn cell_shuffle(slot: &mut BankSlot, rng: &mut impl Rng) {
    let n = slot.num_beats();
    if n < 3 {
        return;
    }

    let mut next = 0;
    let mut cells: Vec<Vec<[bool; NUM_VOICES]>> = cell_lengths(n)
        .into_iter()
        .map(|len| {
            let cell = (next..next + len)
                .map(|step| std::array::from_fn(|v| slot.voice(v).step(step)))
                .collect();
            next += len;
            cell
        })
        .collect();

    cells.shuffle(rng);

    for (step, column) in cells.iter().flatten().enumerate() {
        for (voice, &on) in column.iter().enumerate() {
            slot.set_beat(voice, step, on);
        }
    }
}
