//! Similarity between summary sentences and paragraphs.
//!
//! The scoring model is a capability injected by the caller: anything that maps
//! `(targets, queries)` to a dense `(queries.len(), targets.len())` matrix where higher means
//! more similar. Matrices are validated (shape, finiteness) before any matching runs.
//!
//! [`HashedNgramSimilarity`] is a model-free provider: lower-cased character trigrams are
//! hashed into a fixed-size vector, L2-normalized, and compared by cosine. It is crude, but
//! deterministic and good enough to line up paraphrases that share vocabulary.

use ndarray::{Array1, Array2, ArrayView2};

/// Errors for similarity providers and matrix validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Matrix shape does not match `(queries, targets)`.
    #[error("similarity matrix has shape ({rows}, {cols}), expected ({expected_rows}, {expected_cols})")]
    ShapeMismatch {
        /// Actual row count.
        rows: usize,
        /// Actual column count.
        cols: usize,
        /// Expected row count (number of queries / summary sentences).
        expected_rows: usize,
        /// Expected column count (number of targets / paragraphs).
        expected_cols: usize,
    },
    /// A matrix entry is NaN or infinite.
    #[error("similarity matrix entry ({row}, {col}) is not finite: {value}")]
    NonFinite {
        /// Row of the offending entry.
        row: usize,
        /// Column of the offending entry.
        col: usize,
        /// The offending value.
        value: f64,
    },
    /// Hash dimension must be positive.
    #[error("embedding dimension must be positive")]
    ZeroDimension,
    /// The provider itself failed (model unavailable, batch too large, ...).
    #[error("similarity provider failed: {0}")]
    Provider(String),
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Scores every query against every target.
pub trait SimilarityProvider {
    /// Returns a `(queries.len(), targets.len())` matrix; entry `(i, j)` scores query `i`
    /// against target `j`, higher is more similar.
    fn similarity(&self, targets: &[String], queries: &[String]) -> Result<Array2<f64>>;
}

impl<F> SimilarityProvider for F
where
    F: Fn(&[String], &[String]) -> Array2<f64>,
{
    fn similarity(&self, targets: &[String], queries: &[String]) -> Result<Array2<f64>> {
        Ok(self(targets, queries))
    }
}

/// Check that `matrix` is `rows × cols` with only finite entries.
pub fn validate_matrix(matrix: ArrayView2<'_, f64>, rows: usize, cols: usize) -> Result<()> {
    let (r, c) = matrix.dim();
    if r != rows || c != cols {
        return Err(Error::ShapeMismatch {
            rows: r,
            cols: c,
            expected_rows: rows,
            expected_cols: cols,
        });
    }
    validate_finite(matrix)
}

/// Check that every entry of `matrix` is finite.
pub fn validate_finite(matrix: ArrayView2<'_, f64>) -> Result<()> {
    for ((row, col), &value) in matrix.indexed_iter() {
        if !value.is_finite() {
            return Err(Error::NonFinite { row, col, value });
        }
    }
    Ok(())
}

/// Run `provider` and validate its output against the input lengths.
pub fn score<P>(provider: &P, targets: &[String], queries: &[String]) -> Result<Array2<f64>>
where
    P: SimilarityProvider + ?Sized,
{
    let m = provider.similarity(targets, queries)?;
    validate_matrix(m.view(), queries.len(), targets.len())?;
    Ok(m)
}

/// Cosine similarity over hashed character trigrams.
#[derive(Debug, Clone, Copy)]
pub struct HashedNgramSimilarity {
    dim: usize,
}

impl Default for HashedNgramSimilarity {
    fn default() -> Self {
        Self { dim: 512 }
    }
}

impl HashedNgramSimilarity {
    /// Provider hashing into `dim` buckets.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::ZeroDimension);
        }
        Ok(Self { dim })
    }

    /// Hash dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Unit-norm trigram vector for `text` (all zeros if `text` has no characters).
    pub fn embed(&self, text: &str) -> Array1<f64> {
        let mut v = Array1::<f64>::zeros(self.dim);
        let chars: Vec<char> = text.to_lowercase().chars().collect();
        if chars.len() >= 3 {
            for w in chars.windows(3) {
                v[fnv1a(w) as usize % self.dim] += 1.0;
            }
        } else {
            for &c in &chars {
                v[fnv1a(&[c]) as usize % self.dim] += 1.0;
            }
        }
        let norm = v.dot(&v).sqrt();
        if norm > 0.0 {
            v /= norm;
        }
        v
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &c in chars {
        h ^= c as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

impl SimilarityProvider for HashedNgramSimilarity {
    fn similarity(&self, targets: &[String], queries: &[String]) -> Result<Array2<f64>> {
        let tv: Vec<Array1<f64>> = targets.iter().map(|t| self.embed(t)).collect();
        let mut m = Array2::<f64>::zeros((queries.len(), targets.len()));
        for (i, q) in queries.iter().enumerate() {
            let qv = self.embed(q);
            for (j, t) in tv.iter().enumerate() {
                m[[i, j]] = qv.dot(t);
            }
        }
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn validate_rejects_wrong_shape() {
        let m = array![[0.1, 0.2], [0.3, 0.4]];
        let err = validate_matrix(m.view(), 2, 3).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { rows: 2, cols: 2, .. }));
    }

    #[test]
    fn validate_rejects_non_finite() {
        let m = array![[0.1, f64::NAN], [0.3, 0.4]];
        let err = validate_matrix(m.view(), 2, 2).unwrap_err();
        assert!(matches!(err, Error::NonFinite { row: 0, col: 1, .. }));
        let m = array![[f64::INFINITY]];
        assert!(validate_finite(m.view()).is_err());
    }

    #[test]
    fn closure_provider_is_validated() {
        let bad = |_: &[String], _: &[String]| Array2::<f64>::zeros((1, 1));
        let err = score(&bad, &strings(&["a", "b"]), &strings(&["q"])).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn hashed_ngrams_prefer_the_matching_paragraph() {
        let p = HashedNgramSimilarity::default();
        let targets = strings(&[
            "The whale surfaced beside the ship and the harpooners readied their lines.",
            "In the drawing room, Elizabeth refused Mr. Darcy's proposal of marriage.",
        ]);
        let queries = strings(&["Elizabeth turns down Darcy's marriage proposal."]);
        let m = score(&p, &targets, &queries).unwrap();
        assert_eq!(m.dim(), (1, 2));
        assert!(m[[0, 1]] > m[[0, 0]], "m={m:?}");
    }

    #[test]
    fn identical_text_has_unit_similarity() {
        let p = HashedNgramSimilarity::new(64).unwrap();
        let s = strings(&["Call me Ishmael."]);
        let m = p.similarity(&s, &s).unwrap();
        assert!((m[[0, 0]] - 1.0).abs() < 1e-12);
        assert!(HashedNgramSimilarity::new(0).is_err());
    }
}
