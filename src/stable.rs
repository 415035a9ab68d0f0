//! Capacitated stable matching (Hospital/Residents) between sentences and paragraphs.
//!
//! Summary sentences are residents that each need one paragraph; paragraphs are hospitals
//! that each accept up to `capacity` sentences. Both sides rank the other by similarity:
//! - sentence `i` ranks paragraphs by descending `m[i, ·]`,
//! - paragraph `j` ranks sentences by descending `m[·, j]`,
//!
//! with ties broken by ascending index. A matching is *stable* when no sentence `i` and
//! paragraph `j` would both rather be matched with each other: `i` prefers `j` to its current
//! paragraph (or is unassigned) and `j` has a free slot or holds a sentence it ranks below `i`.
//!
//! Two extended Gale–Shapley variants are provided:
//! - [`Optimality::Resident`]: sentences propose, paragraphs keep their best `capacity`
//!   proposers. Yields the sentence-optimal stable matching.
//! - [`Optimality::Hospital`]: paragraphs with free slots propose down their lists, a
//!   sentence keeps its best offer. Yields the paragraph-optimal stable matching.
//!
//! Everything is index-based with explicit cursors; traversal order is fixed, so results are
//! identical across runs. At most `S·T` proposals are made.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::align::{Alignment, Error, Result};
use crate::similarity;

/// Which side's optimal stable matching to compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimality {
    /// Sentences propose (sentence-optimal).
    #[default]
    Resident,
    /// Paragraphs propose (paragraph-optimal).
    Hospital,
}

/// Preference lists and rank tables derived from a similarity matrix.
#[derive(Debug, Clone)]
pub struct Preferences {
    /// `sentence_prefs[i]`: paragraphs in the order sentence `i` prefers them.
    pub sentence_prefs: Vec<Vec<usize>>,
    /// `paragraph_prefs[j]`: sentences in the order paragraph `j` prefers them.
    pub paragraph_prefs: Vec<Vec<usize>>,
    /// `sentence_rank[i][j]`: position of paragraph `j` in sentence `i`'s list.
    pub sentence_rank: Vec<Vec<usize>>,
    /// `paragraph_rank[j][i]`: position of sentence `i` in paragraph `j`'s list.
    pub paragraph_rank: Vec<Vec<usize>>,
}

fn ranking<F>(n: usize, score: F) -> (Vec<usize>, Vec<usize>)
where
    F: Fn(usize) -> f64,
{
    let mut order: Vec<usize> = (0..n).collect();
    // Stable sort: equal scores keep ascending index order.
    order.sort_by(|&a, &b| score(b).total_cmp(&score(a)));
    let mut rank = vec![0usize; n];
    for (pos, &k) in order.iter().enumerate() {
        rank[k] = pos;
    }
    (order, rank)
}

impl Preferences {
    /// Build both sides' preferences from an `S × T` matrix (assumed finite).
    pub fn from_matrix(matrix: ArrayView2<'_, f64>) -> Self {
        let (s, t) = matrix.dim();
        let mut sentence_prefs = Vec::with_capacity(s);
        let mut sentence_rank = Vec::with_capacity(s);
        for i in 0..s {
            let (order, rank) = ranking(t, |j| matrix[[i, j]]);
            sentence_prefs.push(order);
            sentence_rank.push(rank);
        }
        let mut paragraph_prefs = Vec::with_capacity(t);
        let mut paragraph_rank = Vec::with_capacity(t);
        for j in 0..t {
            let (order, rank) = ranking(s, |i| matrix[[i, j]]);
            paragraph_prefs.push(order);
            paragraph_rank.push(rank);
        }
        Self {
            sentence_prefs,
            paragraph_prefs,
            sentence_rank,
            paragraph_rank,
        }
    }

    fn sentences(&self) -> usize {
        self.sentence_prefs.len()
    }

    fn paragraphs(&self) -> usize {
        self.paragraph_prefs.len()
    }
}

/// Sentence-optimal stable matching with uniform paragraph `capacity`.
pub fn align_stable(matrix: ArrayView2<'_, f64>, capacity: usize) -> Result<Alignment> {
    align_stable_with(matrix, capacity, Optimality::Resident)
}

/// Stable matching with uniform paragraph `capacity`, optimal for the chosen side.
///
/// If `capacity * T >= S` every sentence is placed, and an unplaced sentence is reported as
/// [`Error::UnplacedSentence`]. Otherwise the input is infeasible: sentences that lose out
/// are left as `None` in the returned alignment.
pub fn align_stable_with(
    matrix: ArrayView2<'_, f64>,
    capacity: usize,
    optimality: Optimality,
) -> Result<Alignment> {
    if capacity == 0 {
        return Err(Error::InvalidCapacity(capacity));
    }
    similarity::validate_finite(matrix)?;

    let (s, t) = matrix.dim();
    if s == 0 {
        return Ok(Alignment::default());
    }
    if t == 0 {
        return Ok(Alignment::unassigned(s));
    }

    let prefs = Preferences::from_matrix(matrix);
    let alignment = match optimality {
        Optimality::Resident => resident_proposing(&prefs, capacity),
        Optimality::Hospital => hospital_proposing(&prefs, capacity),
    };

    let unplaced = alignment.unassigned_sentences();
    if let Some(&sentence) = unplaced.first() {
        if capacity.saturating_mul(t) >= s {
            return Err(Error::UnplacedSentence {
                sentence,
                sentences: s,
                paragraphs: t,
                capacity,
            });
        }
        tracing::warn!(
            sentences = s,
            paragraphs = t,
            capacity,
            unassigned = unplaced.len(),
            "stable matching capacity is insufficient; leaving sentences unassigned"
        );
    }
    Ok(alignment)
}

fn resident_proposing(prefs: &Preferences, capacity: usize) -> Alignment {
    let (s, t) = (prefs.sentences(), prefs.paragraphs());
    let mut next = vec![0usize; s];
    let mut held: Vec<Vec<usize>> = vec![Vec::with_capacity(capacity + 1); t];
    let mut free: VecDeque<usize> = (0..s).collect();

    while let Some(i) = free.pop_front() {
        let Some(&j) = prefs.sentence_prefs[i].get(next[i]) else {
            // List exhausted: stays unassigned.
            continue;
        };
        next[i] += 1;
        held[j].push(i);
        if held[j].len() > capacity {
            let rank = &prefs.paragraph_rank[j];
            let worst = held[j]
                .iter()
                .enumerate()
                .max_by_key(|&(_, &k)| rank[k])
                .map(|(pos, _)| pos);
            if let Some(pos) = worst {
                let rejected = held[j].swap_remove(pos);
                free.push_back(rejected);
            }
        }
    }

    let mut slots = vec![None; s];
    for (j, sentences) in held.iter().enumerate() {
        for &i in sentences {
            slots[i] = Some(j);
        }
    }
    Alignment::new(slots)
}

fn hospital_proposing(prefs: &Preferences, capacity: usize) -> Alignment {
    let (s, t) = (prefs.sentences(), prefs.paragraphs());
    let mut next = vec![0usize; t];
    let mut load = vec![0usize; t];
    let mut slots: Vec<Option<usize>> = vec![None; s];
    let mut open: VecDeque<usize> = (0..t).collect();

    while let Some(j) = open.pop_front() {
        while load[j] < capacity {
            let Some(&i) = prefs.paragraph_prefs[j].get(next[j]) else {
                break;
            };
            next[j] += 1;
            let accepts = match slots[i] {
                None => true,
                Some(cur) => prefs.sentence_rank[i][j] < prefs.sentence_rank[i][cur],
            };
            if !accepts {
                continue;
            }
            if let Some(cur) = slots[i].replace(j) {
                load[cur] -= 1;
                open.push_back(cur);
            }
            load[j] += 1;
        }
    }

    Alignment::new(slots)
}

/// True when `alignment` respects `capacity` and admits no blocking pair under `matrix`.
pub fn is_stable(matrix: ArrayView2<'_, f64>, alignment: &Alignment, capacity: usize) -> bool {
    let (s, t) = matrix.dim();
    if alignment.len() != s || alignment.check_bounds(t).is_err() {
        return false;
    }
    let loads = alignment.loads(t);
    if loads.iter().any(|&l| l > capacity) {
        return false;
    }
    let prefs = Preferences::from_matrix(matrix);

    // Worst-ranked sentence currently held by each paragraph.
    let mut worst: Vec<Option<usize>> = vec![None; t];
    for (i, j) in alignment.pairs() {
        let r = prefs.paragraph_rank[j][i];
        if worst[j].map_or(true, |w| r > w) {
            worst[j] = Some(r);
        }
    }

    for i in 0..s {
        let cur_rank = alignment.get(i).map(|j| prefs.sentence_rank[i][j]);
        for j in 0..t {
            let sentence_wants = cur_rank.map_or(true, |c| prefs.sentence_rank[i][j] < c);
            if !sentence_wants {
                continue;
            }
            let paragraph_wants = loads[j] < capacity
                || worst[j].map_or(false, |w| prefs.paragraph_rank[j][i] < w);
            if paragraph_wants {
                return false;
            }
        }
    }
    true
}
