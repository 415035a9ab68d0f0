//! Sentence → paragraph alignments and the greedy aligner.
//!
//! An [`Alignment`] has one slot per summary sentence holding the index of its paragraph,
//! or `None` when the aligner could not place it. Greedy alignment never leaves a slot
//! empty unless there are no paragraphs at all.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::similarity;

/// Errors for the aligners.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The similarity matrix failed validation.
    #[error(transparent)]
    Matrix(#[from] similarity::Error),
    /// Stable matching needs every paragraph to accept at least one sentence.
    #[error("paragraph capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),
    /// Internal invariant: capacity sufficed, yet a sentence ended up unassigned.
    #[error("sentence {sentence} left unassigned although capacity {capacity} x {paragraphs} paragraphs covers {sentences} sentences")]
    UnplacedSentence {
        /// Index of the unplaced sentence.
        sentence: usize,
        /// Total number of sentences.
        sentences: usize,
        /// Number of paragraphs.
        paragraphs: usize,
        /// Per-paragraph capacity.
        capacity: usize,
    },
    /// Paragraph index outside the matrix.
    #[error("sentence {sentence} aligned to paragraph {paragraph}, but only {paragraphs} exist")]
    ParagraphOutOfRange {
        /// Sentence index.
        sentence: usize,
        /// Offending paragraph index.
        paragraph: usize,
        /// Number of paragraphs.
        paragraphs: usize,
    },
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Per-sentence paragraph assignment; `None` marks an unassigned sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment(Vec<Option<usize>>);

impl Alignment {
    /// Wrap raw assignments.
    pub fn new(slots: Vec<Option<usize>>) -> Self {
        Self(slots)
    }

    /// `n` unassigned sentences.
    pub fn unassigned(n: usize) -> Self {
        Self(vec![None; n])
    }

    /// Number of sentences covered.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no sentences.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paragraph assigned to sentence `i` (`None` if unassigned or out of range).
    pub fn get(&self, i: usize) -> Option<usize> {
        self.0.get(i).copied().flatten()
    }

    /// Raw slots.
    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.0
    }

    /// `(sentence, paragraph)` pairs for assigned sentences, in sentence order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|j| (i, j)))
    }

    /// Indices of unassigned sentences.
    pub fn unassigned_sentences(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of sentences assigned to each of `paragraphs` paragraphs.
    pub fn loads(&self, paragraphs: usize) -> Vec<usize> {
        let mut loads = vec![0usize; paragraphs];
        for (_, j) in self.pairs() {
            if j < paragraphs {
                loads[j] += 1;
            }
        }
        loads
    }

    /// Check every assigned index is below `paragraphs`.
    pub fn check_bounds(&self, paragraphs: usize) -> Result<()> {
        for (sentence, paragraph) in self.pairs() {
            if paragraph >= paragraphs {
                return Err(Error::ParagraphOutOfRange {
                    sentence,
                    paragraph,
                    paragraphs,
                });
            }
        }
        Ok(())
    }
}

impl From<Vec<usize>> for Alignment {
    fn from(v: Vec<usize>) -> Self {
        Self(v.into_iter().map(Some).collect())
    }
}

/// Which aligner to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignMode {
    /// Per-sentence argmax.
    Greedy,
    /// Capacitated stable matching.
    Stable,
}

impl AlignMode {
    /// Lower-case name, used in titles and output file extensions.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignMode::Greedy => "greedy",
            AlignMode::Stable => "stable",
        }
    }
}

impl fmt::Display for AlignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlignMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "greedy" => Ok(AlignMode::Greedy),
            "stable" => Ok(AlignMode::Stable),
            other => Err(format!("unknown alignment mode {other:?} (expected greedy|stable)")),
        }
    }
}

/// Index of the first maximum of `row` (`None` for an empty row).
pub(crate) fn first_argmax<'a, I>(row: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (j, &v) in row.into_iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((j, v)),
        }
    }
    best.map(|(j, _)| j)
}

/// Assign every sentence (row) to its highest-scoring paragraph (column).
///
/// Ties go to the lowest paragraph index. A matrix with zero columns leaves every sentence
/// unassigned.
pub fn align_greedy(matrix: ArrayView2<'_, f64>) -> Result<Alignment> {
    similarity::validate_finite(matrix)?;
    let slots = matrix.rows().into_iter().map(first_argmax).collect();
    Ok(Alignment(slots))
}

/// One-hot `S × T` matrix marking each sentence's paragraph.
pub fn alignment_matrix(alignment: &Alignment, paragraphs: usize) -> Result<Array2<f64>> {
    alignment.check_bounds(paragraphs)?;
    let mut m = Array2::<f64>::zeros((alignment.len(), paragraphs));
    for (i, j) in alignment.pairs() {
        m[[i, j]] = 1.0;
    }
    Ok(m)
}
