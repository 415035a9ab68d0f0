//! Paragraph-level alignment of chapter summaries to chapter text.
//!
//! Given a chapter (a list of raw text blocks) and its reference summary (a list of
//! sentences), this crate:
//! 1. merges the blocks into paragraphs of bounded sentence count ([`merge`]),
//! 2. scores every summary sentence against every paragraph ([`similarity`]),
//! 3. assigns each sentence to a paragraph, greedily ([`align`]) or by capacitated
//!    stable matching ([`stable`]),
//! 4. groups the sentences by paragraph ([`aggregate`]).
//!
//! [`pipeline`] wires these together per chapter and over batches; [`record`] handles the
//! JSON Lines records on either side.
//!
//! Public invariants (must not change):
//! - Matrices are `sentences × paragraphs`, validated (shape, finiteness) before matching.
//! - All tie-breaks go to the lowest index; results do not depend on hash order or RNG.
//! - Unplaced sentences are explicit (`None`), never defaulted to paragraph 0.
//! - Scoring models and sentence segmentation are injected, never global.

pub mod aggregate;
pub mod align;
pub mod merge;
pub mod pipeline;
pub mod record;
pub mod similarity;
pub mod stable;

pub use aggregate::{aggregate, AggregatedAlignment, AlignedSentence};
pub use align::{align_greedy, AlignMode, Alignment};
pub use merge::{merge_paragraphs, SentenceCounter, UnicodeSentenceCounter};
pub use pipeline::{align_batch, align_chapter, AlignConfig, ChapterAlignment};
pub use record::{ChapterRecord, OutputRecord};
pub use similarity::{HashedNgramSimilarity, SimilarityProvider};
pub use stable::{align_stable, align_stable_with, Optimality};
