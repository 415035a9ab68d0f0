//! Paragraph merging: coalesce raw chapter blocks into sentence-bounded paragraphs.
//!
//! Scraped chapters arrive as blocks of wildly different length (a line of dialogue, a
//! two-page description). Similarity scores are only comparable across targets of similar
//! size, so short blocks are merged until adding the next one would exceed
//! `max_sentences`, while any block with more than `min_sentences` sentences stands alone.
//!
//! Rules, scanning left to right with a buffer and its running sentence count `c`:
//! - block with `n > min_sentences`: flush the buffer (if non-empty), emit the block verbatim;
//! - otherwise, if `c + n > max_sentences`: flush, restart the buffer with this block;
//! - otherwise: append to the buffer, `c += n`.
//!
//! The buffer is flushed once more at the end. Buffers are joined with a single space.

use unicode_segmentation::UnicodeSegmentation;

/// Errors for paragraph merging.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Merge bounds must satisfy `1 <= max_sentences` and `min_sentences <= max_sentences`.
    #[error("invalid merge bounds: min_sentences={min}, max_sentences={max}")]
    InvalidBounds {
        /// Requested lower bound.
        min: usize,
        /// Requested upper bound.
        max: usize,
    },
    /// Internal invariant: a buffer was about to be flushed holding too many sentences.
    #[error("merge buffer holds {count} sentences, above max_sentences={max}")]
    BufferOverflow {
        /// Sentence count of the offending buffer.
        count: usize,
        /// Configured upper bound.
        max: usize,
    },
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Sentence segmentation capability used to size blocks.
pub trait SentenceCounter {
    /// Number of sentences in `text`.
    fn count_sentences(&self, text: &str) -> usize;
}

/// UAX #29 sentence boundaries (via `unicode-segmentation`).
///
/// Only segments containing at least one alphanumeric character are counted, so stray
/// punctuation or whitespace never inflates a block.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeSentenceCounter;

impl SentenceCounter for UnicodeSentenceCounter {
    fn count_sentences(&self, text: &str) -> usize {
        text.unicode_sentences().count()
    }
}

impl<F> SentenceCounter for F
where
    F: Fn(&str) -> usize,
{
    fn count_sentences(&self, text: &str) -> usize {
        self(text)
    }
}

struct Buffer<'a> {
    parts: Vec<&'a str>,
    count: usize,
}

impl<'a> Buffer<'a> {
    fn new() -> Self {
        Self {
            parts: Vec::new(),
            count: 0,
        }
    }

    fn flush_into(&mut self, out: &mut Vec<String>, max: usize) -> Result<()> {
        if self.parts.is_empty() {
            return Ok(());
        }
        if self.count > max {
            return Err(Error::BufferOverflow {
                count: self.count,
                max,
            });
        }
        out.push(self.parts.join(" "));
        self.parts.clear();
        self.count = 0;
        Ok(())
    }
}

/// Merge `paragraphs` into blocks of roughly `[min_sentences, max_sentences]` sentences.
///
/// Empty (or whitespace-only) input blocks are dropped first. Oversized blocks are emitted
/// verbatim, never truncated; output paragraphs are never empty.
pub fn merge_paragraphs<S, C>(
    paragraphs: &[S],
    min_sentences: usize,
    max_sentences: usize,
    counter: &C,
) -> Result<Vec<String>>
where
    S: AsRef<str>,
    C: SentenceCounter + ?Sized,
{
    if max_sentences == 0 || min_sentences > max_sentences {
        return Err(Error::InvalidBounds {
            min: min_sentences,
            max: max_sentences,
        });
    }

    let mut out = Vec::new();
    let mut buf = Buffer::new();

    for p in paragraphs {
        let p: &str = p.as_ref();
        if p.trim().is_empty() {
            continue;
        }
        let n = counter.count_sentences(p);

        if n > min_sentences {
            buf.flush_into(&mut out, max_sentences)?;
            out.push(p.to_string());
        } else if buf.count + n > max_sentences {
            buf.flush_into(&mut out, max_sentences)?;
            buf.parts.push(p);
            buf.count = n;
        } else {
            buf.parts.push(p);
            buf.count += n;
        }
    }
    buf.flush_into(&mut out, max_sentences)?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dots(text: &str) -> usize {
        text.matches('.').count()
    }

    #[test]
    fn short_blocks_are_joined_until_the_upper_bound() {
        let ps = ["A. B.", "C.", "D. E.", "F. G. H."];
        let out = merge_paragraphs(&ps, 3, 5, &dots).unwrap();
        assert_eq!(out, vec!["A. B. C. D. E.", "F. G. H."]);
    }

    #[test]
    fn long_block_flushes_buffer_and_stands_alone() {
        let ps = ["A.", "B.", "1. 2. 3. 4. 5. 6. 7. 8.", "C."];
        let out = merge_paragraphs(&ps, 2, 4, &dots).unwrap();
        assert_eq!(out, vec!["A. B.", "1. 2. 3. 4. 5. 6. 7. 8.", "C."]);
    }

    #[test]
    fn single_oversized_block_is_verbatim() {
        let big = "One. Two. Three. Four. Five. Six.";
        let out = merge_paragraphs(&[big], 1, 2, &dots).unwrap();
        assert_eq!(out, vec![big.to_string()]);
    }

    #[test]
    fn empty_blocks_are_filtered() {
        let ps = ["", "A.", "   ", "B."];
        let out = merge_paragraphs(&ps, 3, 12, &dots).unwrap();
        assert_eq!(out, vec!["A. B."]);
        let none: [&str; 2] = ["", ""];
        assert!(merge_paragraphs(&none, 3, 12, &dots).unwrap().is_empty());
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = merge_paragraphs(&["A."], 5, 2, &dots).unwrap_err();
        assert_eq!(err, Error::InvalidBounds { min: 5, max: 2 });
        assert!(merge_paragraphs(&["A."], 0, 0, &dots).is_err());
    }

    #[test]
    fn unicode_counter_counts_sentences() {
        let c = UnicodeSentenceCounter;
        assert_eq!(c.count_sentences("He left. She stayed! Why?"), 3);
        assert_eq!(c.count_sentences("No terminal punctuation"), 1);
    }

    proptest! {
        #[test]
        fn every_output_is_oversized_single_block_or_within_max(
            sizes in prop::collection::vec(1usize..8, 0..30),
            min in 1usize..5,
            extra in 0usize..6,
        ) {
            let max = min + extra;
            let ps: Vec<String> = sizes
                .iter()
                .enumerate()
                .map(|(k, &n)| (0..n).map(|s| format!("w{k}x{s}.")).collect::<Vec<_>>().join(" "))
                .collect();
            let out = merge_paragraphs(&ps, min, max, &dots).unwrap();
            for o in &out {
                let n = dots(o);
                let standalone = ps.iter().any(|p| p == o) && n > min;
                prop_assert!(standalone || n <= max, "out={o:?} n={n} min={min} max={max}");
                prop_assert!(!o.is_empty());
            }
        }

        #[test]
        fn merging_preserves_every_word_in_order(
            blocks in prop::collection::vec("[a-z]{1,6}( [a-z]{1,6}){0,4}\\.", 0..25),
            min in 0usize..4,
            extra in 1usize..6,
        ) {
            let out = merge_paragraphs(&blocks, min, min + extra, &dots).unwrap();
            let before: Vec<&str> = blocks.iter().flat_map(|b| b.split_whitespace()).collect();
            let after: Vec<&str> = out.iter().flat_map(|b| b.split_whitespace()).collect();
            prop_assert_eq!(before, after);
        }
    }
}
