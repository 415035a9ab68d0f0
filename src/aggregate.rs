//! Grouping aligned summary sentences by paragraph.
//!
//! Each bucket fixes its paragraph text once, on first sight, and accumulates sentences and
//! scores in the order sentences are visited. Buckets come out in order of first appearance.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::align::Alignment;

/// Errors for aggregation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Inputs disagree on the number of sentences or paragraphs.
    #[error("{what}: expected {expected}, got {got}")]
    LengthMismatch {
        /// Which input is off.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },
    /// Alignment points past the paragraph list.
    #[error("sentence {sentence} aligned to paragraph {paragraph}, but only {paragraphs} exist")]
    ParagraphOutOfRange {
        /// Sentence index.
        sentence: usize,
        /// Offending paragraph index.
        paragraph: usize,
        /// Number of paragraphs.
        paragraphs: usize,
    },
    /// Internal invariant: two rows for the same bucket carry different paragraph text.
    #[error("paragraph text diverges within bucket {key:?}")]
    ParagraphTextMismatch {
        /// Bucket key (paragraph index or title).
        key: String,
    },
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// All summary sentences aligned to one paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedAlignment {
    /// Index of the paragraph within its chapter.
    pub paragraph: usize,
    /// Paragraph text.
    pub text: String,
    /// Aligned summary sentences, in alignment order.
    pub summary: Vec<String>,
    /// Similarity score of each sentence in `summary`.
    pub scores: Vec<f64>,
}

impl AggregatedAlignment {
    /// Expand back into one `(sentence, paragraph, score)` triple per aligned sentence.
    pub fn expand(&self) -> impl Iterator<Item = (&str, usize, f64)> + '_ {
        self.summary
            .iter()
            .zip(&self.scores)
            .map(move |(s, &score)| (s.as_str(), self.paragraph, score))
    }
}

fn check_shapes(
    alignment: &Alignment,
    sentences: usize,
    paragraphs: usize,
    matrix: ArrayView2<'_, f64>,
) -> Result<()> {
    let (rows, cols) = matrix.dim();
    for (what, expected, got) in [
        ("alignment length", sentences, alignment.len()),
        ("matrix rows", sentences, rows),
        ("matrix columns", paragraphs, cols),
    ] {
        if expected != got {
            return Err(Error::LengthMismatch {
                what,
                expected,
                got,
            });
        }
    }
    Ok(())
}

fn paragraph_text<P: AsRef<str>>(paragraphs: &[P], sentence: usize, paragraph: usize) -> Result<&str> {
    paragraphs
        .get(paragraph)
        .map(AsRef::as_ref)
        .ok_or(Error::ParagraphOutOfRange {
            sentence,
            paragraph,
            paragraphs: paragraphs.len(),
        })
}

/// Group `sentences` by the paragraph `alignment` assigns them to.
///
/// `matrix` must be `sentences.len() × paragraphs.len()`; unassigned sentences are skipped.
pub fn aggregate<S, P>(
    alignment: &Alignment,
    sentences: &[S],
    paragraphs: &[P],
    matrix: ArrayView2<'_, f64>,
) -> Result<Vec<AggregatedAlignment>>
where
    S: AsRef<str>,
    P: AsRef<str>,
{
    check_shapes(alignment, sentences.len(), paragraphs.len(), matrix)?;

    let mut slot_of: Vec<Option<usize>> = vec![None; paragraphs.len()];
    let mut out: Vec<AggregatedAlignment> = Vec::new();

    for (i, j) in alignment.pairs() {
        let text = paragraph_text(paragraphs, i, j)?;
        let bucket = match slot_of[j] {
            Some(k) => {
                let b = &mut out[k];
                if b.text != text {
                    return Err(Error::ParagraphTextMismatch { key: j.to_string() });
                }
                b
            }
            None => {
                slot_of[j] = Some(out.len());
                out.push(AggregatedAlignment {
                    paragraph: j,
                    text: text.to_string(),
                    summary: Vec::new(),
                    scores: Vec::new(),
                });
                let last = out.len() - 1;
                &mut out[last]
            }
        };
        bucket.summary.push(sentences[i].as_ref().to_string());
        bucket.scores.push(matrix[[i, j]]);
    }

    Ok(out)
}

/// One summary sentence with its aligned paragraph, as a flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSentence {
    /// The summary sentence.
    pub summary_sentence: String,
    /// Text of the paragraph it was aligned to.
    pub paragraph_alignment: String,
    /// Similarity between the two.
    pub alignment_score: f64,
    /// `"<base title>-<paragraph index>"`; identifies the paragraph.
    pub title: String,
}

/// Flatten an alignment into per-sentence rows titled `"{base_title}-{paragraph}"`.
pub fn gather<S, P>(
    alignment: &Alignment,
    sentences: &[S],
    paragraphs: &[P],
    matrix: ArrayView2<'_, f64>,
    base_title: &str,
) -> Result<Vec<AlignedSentence>>
where
    S: AsRef<str>,
    P: AsRef<str>,
{
    check_shapes(alignment, sentences.len(), paragraphs.len(), matrix)?;
    alignment
        .pairs()
        .map(|(i, j)| {
            let text = paragraph_text(paragraphs, i, j)?;
            Ok(AlignedSentence {
                summary_sentence: sentences[i].as_ref().to_string(),
                paragraph_alignment: text.to_string(),
                alignment_score: matrix[[i, j]],
                title: format!("{base_title}-{j}"),
            })
        })
        .collect()
}

/// Group flat rows by title, keeping first-appearance order.
///
/// Rows sharing a title must share the paragraph text.
pub fn aggregate_rows(rows: &[AlignedSentence]) -> Result<Vec<(String, AggregatedAlignment)>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<(String, AggregatedAlignment)> = Vec::new();

    for row in rows {
        match index.get(row.title.as_str()) {
            Some(&k) => {
                let (_, b) = &mut out[k];
                if b.text != row.paragraph_alignment {
                    return Err(Error::ParagraphTextMismatch {
                        key: row.title.clone(),
                    });
                }
                b.summary.push(row.summary_sentence.clone());
                b.scores.push(row.alignment_score);
            }
            None => {
                index.insert(row.title.as_str(), out.len());
                let paragraph = paragraph_from_title(&row.title).unwrap_or(out.len());
                out.push((
                    row.title.clone(),
                    AggregatedAlignment {
                        paragraph,
                        text: row.paragraph_alignment.clone(),
                        summary: vec![row.summary_sentence.clone()],
                        scores: vec![row.alignment_score],
                    },
                ));
            }
        }
    }
    Ok(out)
}

fn paragraph_from_title(title: &str) -> Option<usize> {
    title.rsplit_once('-').and_then(|(_, n)| n.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align_greedy;
    use ndarray::array;

    #[test]
    fn groups_sentences_in_encounter_order() {
        let a = Alignment::from(vec![0, 0, 1]);
        let m = array![[0.9, 0.1], [0.7, 0.2], [0.3, 0.8]];
        let out = aggregate(&a, &["a", "b", "c"], &["P0", "P1"], m.view()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "P0");
        assert_eq!(out[0].summary, vec!["a", "b"]);
        assert_eq!(out[0].scores, vec![0.9, 0.7]);
        assert_eq!(out[1].paragraph, 1);
        assert_eq!(out[1].summary, vec!["c"]);
        assert_eq!(out[1].scores, vec![0.8]);
    }

    #[test]
    fn buckets_follow_first_appearance_not_paragraph_index() {
        let a = Alignment::from(vec![2, 0, 2]);
        let m = array![[0.1, 0.2, 0.9], [0.8, 0.1, 0.1], [0.1, 0.1, 0.7]];
        let out = aggregate(&a, &["x", "y", "z"], &["A", "B", "C"], m.view()).unwrap();
        let order: Vec<usize> = out.iter().map(|g| g.paragraph).collect();
        assert_eq!(order, vec![2, 0]);
        assert_eq!(out[0].summary, vec!["x", "z"]);
    }

    #[test]
    fn skips_unassigned_and_checks_lengths() {
        let a = Alignment::new(vec![None, Some(0)]);
        let m = array![[0.1], [0.2]];
        let out = aggregate(&a, &["a", "b"], &["P"], m.view()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].summary, vec!["b"]);

        let err = aggregate(&a, &["a"], &["P"], m.view()).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { what: "alignment length", .. }));
    }

    #[test]
    fn out_of_range_paragraph_is_rejected() {
        let a = Alignment::from(vec![3]);
        let m = array![[0.1]];
        let err = aggregate(&a, &["a"], &["P"], m.view()).unwrap_err();
        assert!(matches!(err, Error::ParagraphOutOfRange { paragraph: 3, .. }));
    }

    #[test]
    fn empty_alignment_aggregates_to_nothing() {
        let m = ndarray::Array2::<f64>::zeros((0, 2));
        let none: [&str; 0] = [];
        let out = aggregate(&Alignment::default(), &none, &["P0", "P1"], m.view()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn expanding_greedy_aggregation_recovers_pairs() {
        let m = array![[0.2, 0.9, 0.1], [0.6, 0.3, 0.1], [0.1, 0.95, 0.4], [0.1, 0.2, 0.3]];
        let sentences = ["s0", "s1", "s2", "s3"];
        let paragraphs = ["p0", "p1", "p2"];
        let a = align_greedy(m.view()).unwrap();
        let out = aggregate(&a, &sentences, &paragraphs, m.view()).unwrap();

        let mut pairs: Vec<(usize, usize, f64)> = out
            .iter()
            .flat_map(|g| g.expand())
            .map(|(s, j, score)| {
                let i = sentences.iter().position(|x| *x == s).unwrap();
                (i, j, score)
            })
            .collect();
        pairs.sort_by_key(|&(i, _, _)| i);
        let expected: Vec<(usize, usize, f64)> =
            a.pairs().map(|(i, j)| (i, j, m[[i, j]])).collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn gather_keeps_sentence_order_and_titles() {
        let a = Alignment::from(vec![1, 0, 1]);
        let m = array![[0.1, 0.9], [0.8, 0.2], [0.3, 0.7]];
        let rows = gather(&a, &["a", "b", "c"], &["P0", "P1"], m.view(), "emma.sparknotes-greedy")
            .unwrap();
        let got: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.summary_sentence.as_str(), r.title.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("a", "emma.sparknotes-greedy-1"),
                ("b", "emma.sparknotes-greedy-0"),
                ("c", "emma.sparknotes-greedy-1"),
            ]
        );
        assert_eq!(rows[1].paragraph_alignment, "P0");
        assert_eq!(rows[2].alignment_score, 0.7);
    }

    #[test]
    fn aggregate_rows_matches_index_aggregation() {
        let a = Alignment::from(vec![1, 0, 1]);
        let m = array![[0.1, 0.9], [0.8, 0.2], [0.3, 0.7]];
        let s = ["a", "b", "c"];
        let p = ["P0", "P1"];
        let rows = gather(&a, &s, &p, m.view(), "t").unwrap();
        let by_title = aggregate_rows(&rows).unwrap();
        let direct = aggregate(&a, &s, &p, m.view()).unwrap();
        let titles: Vec<&str> = by_title.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(titles, vec!["t-1", "t-0"]);
        let groups: Vec<AggregatedAlignment> = by_title.into_iter().map(|(_, g)| g).collect();
        assert_eq!(groups, direct);
    }

    #[test]
    fn aggregate_rows_rejects_divergent_text() {
        let row = |text: &str| AlignedSentence {
            summary_sentence: "s".into(),
            paragraph_alignment: text.into(),
            alignment_score: 0.5,
            title: "book.src-stable-0".into(),
        };
        let err = aggregate_rows(&[row("one"), row("two")]).unwrap_err();
        assert_eq!(
            err,
            Error::ParagraphTextMismatch {
                key: "book.src-stable-0".into()
            }
        );
    }
}
