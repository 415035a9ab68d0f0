//! Per-chapter alignment pipeline: merge → score → align → aggregate.
//!
//! Chapters are independent. [`align_batch`] runs them on the rayon pool and keeps going when
//! one fails; every chapter gets its own `Result`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, AggregatedAlignment};
use crate::align::{self, align_greedy, AlignMode, Alignment};
use crate::merge::{self, merge_paragraphs, SentenceCounter};
use crate::record::{ChapterRecord, OutputRecord};
use crate::similarity::{self, SimilarityProvider};
use crate::stable::{align_stable_with, Optimality};

/// Errors for chapter alignment.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Chapter has no summary sentences.
    #[error("chapter has an empty summary")]
    EmptySummary,
    /// Paragraph merging failed.
    #[error("merge: {0}")]
    Merge(#[from] merge::Error),
    /// Scoring failed.
    #[error("similarity: {0}")]
    Similarity(#[from] similarity::Error),
    /// Alignment failed.
    #[error("align: {0}")]
    Align(#[from] align::Error),
    /// Aggregation failed.
    #[error("aggregate: {0}")]
    Aggregate(#[from] aggregate::Error),
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

fn default_modes() -> Vec<AlignMode> {
    vec![AlignMode::Stable, AlignMode::Greedy]
}

/// Alignment parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Blocks with more sentences than this stand alone.
    pub min_sentences: usize,
    /// Merged paragraphs hold at most this many sentences.
    pub max_sentences: usize,
    /// Sentences each paragraph can take in stable matching.
    pub capacity: usize,
    /// Which side the stable matching favours.
    pub optimality: Optimality,
    /// Aligners to run, in output order.
    #[serde(default = "default_modes")]
    pub modes: Vec<AlignMode>,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            min_sentences: 4,
            max_sentences: 12,
            capacity: 10,
            optimality: Optimality::Resident,
            modes: default_modes(),
        }
    }
}

impl AlignConfig {
    /// Reject bounds and capacities the pipeline cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.max_sentences == 0 {
            return Err(Error::Config("max_sentences must be at least 1".into()));
        }
        if self.min_sentences > self.max_sentences {
            return Err(Error::Config(format!(
                "min_sentences ({}) exceeds max_sentences ({})",
                self.min_sentences, self.max_sentences
            )));
        }
        if self.capacity == 0 {
            return Err(Error::Config("capacity must be at least 1".into()));
        }
        if self.modes.is_empty() {
            return Err(Error::Config("at least one alignment mode is required".into()));
        }
        Ok(())
    }
}

/// Result of one aligner on one chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeAlignment {
    /// Aligner used.
    pub mode: AlignMode,
    /// Chapter title, e.g. `"emma.gradesaver-stable"`.
    pub title: String,
    /// Per-sentence assignment.
    pub alignment: Alignment,
    /// Aggregated paragraphs, in first-appearance order.
    pub aggregated: Vec<AggregatedAlignment>,
}

impl ModeAlignment {
    /// Output records, one per aggregated paragraph.
    pub fn records(&self) -> Vec<OutputRecord> {
        self.aggregated
            .iter()
            .cloned()
            .map(|agg| OutputRecord::from_aggregated(&self.title, agg))
            .collect()
    }
}

/// Everything computed for one chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterAlignment {
    /// Merged paragraphs (alignment targets).
    pub paragraphs: Vec<String>,
    /// Summary sentences (alignment queries).
    pub sentences: Vec<String>,
    /// `sentences × paragraphs` similarity.
    pub similarity: ndarray::Array2<f64>,
    /// One entry per configured mode, in configuration order.
    pub modes: Vec<ModeAlignment>,
}

impl ChapterAlignment {
    /// Result for `mode`, if it was run.
    pub fn mode(&self, mode: AlignMode) -> Option<&ModeAlignment> {
        self.modes.iter().find(|m| m.mode == mode)
    }
}

/// Align one chapter's summary to its merged paragraphs with every configured mode.
pub fn align_chapter<P, C>(
    record: &ChapterRecord,
    config: &AlignConfig,
    provider: &P,
    counter: &C,
) -> Result<ChapterAlignment>
where
    P: SimilarityProvider + ?Sized,
    C: SentenceCounter + ?Sized,
{
    config.validate()?;
    let sentences = record.summary_sentences();
    if sentences.is_empty() {
        return Err(Error::EmptySummary);
    }
    let blocks = record.text_blocks();
    let paragraphs =
        merge_paragraphs(&blocks, config.min_sentences, config.max_sentences, counter)?;
    tracing::debug!(
        chapter = record.label(),
        blocks = blocks.len(),
        paragraphs = paragraphs.len(),
        sentences = sentences.len(),
        "merged chapter text"
    );

    let sim = similarity::score(provider, &paragraphs, &sentences)?;

    let mut modes = Vec::with_capacity(config.modes.len());
    for &mode in &config.modes {
        let alignment = match mode {
            AlignMode::Greedy => align_greedy(sim.view())?,
            AlignMode::Stable => align_stable_with(sim.view(), config.capacity, config.optimality)?,
        };
        let aggregated = aggregate::aggregate(&alignment, &sentences, &paragraphs, sim.view())?;
        tracing::debug!(
            chapter = record.label(),
            %mode,
            groups = aggregated.len(),
            "aligned chapter"
        );
        modes.push(ModeAlignment {
            mode,
            title: record.title(mode),
            alignment,
            aggregated,
        });
    }

    Ok(ChapterAlignment {
        paragraphs,
        sentences,
        similarity: sim,
        modes,
    })
}

/// Align many chapters in parallel.
///
/// Output order matches `records`. Chapters with an empty summary are skipped (`None`);
/// failing chapters are logged and reported as `Some(Err(_))` without stopping the rest.
pub fn align_batch<P, C>(
    records: &[ChapterRecord],
    config: &AlignConfig,
    provider: &P,
    counter: &C,
) -> Vec<Option<Result<ChapterAlignment>>>
where
    P: SimilarityProvider + Sync + ?Sized,
    C: SentenceCounter + Sync + ?Sized,
{
    records
        .par_iter()
        .map(|record| {
            if record.summary_sentences().is_empty() {
                tracing::debug!(chapter = record.label(), "skipping chapter with empty summary");
                return None;
            }
            let res = align_chapter(record, config, provider, counter);
            if let Err(e) = &res {
                tracing::warn!(chapter = record.label(), error = %e, "chapter alignment failed");
            }
            Some(res)
        })
        .collect()
}
