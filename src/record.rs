//! Chapter input records and aligned output records, as JSON Lines.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

use crate::aggregate::AggregatedAlignment;
use crate::align::AlignMode;

/// Errors for record I/O.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Reading or writing failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A line is not a valid record.
    #[error("line {line}: {source}")]
    Json {
        /// 1-based line number.
        line: usize,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A record could not be serialized.
    #[error("serialize: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// One chapter with its reference summary, as produced by the collection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    /// Book identifier (e.g. `"Pride and Prejudice"`).
    pub book_id: String,
    /// Summary source site (e.g. `"sparknotes"`).
    pub source: String,
    /// Raw chapter text, one entry per block.
    pub text: Vec<String>,
    /// Summary, one entry per sentence.
    pub summary: Vec<String>,
    /// Where the chapter came from, for logging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_path: Option<String>,
}

impl ChapterRecord {
    /// `"<book id, lower-case, spaces as _>.<source, lower-case>-<mode>"`.
    pub fn title(&self, mode: AlignMode) -> String {
        format!(
            "{}.{}-{}",
            self.book_id.to_lowercase().replace(' ', "_"),
            self.source.to_lowercase(),
            mode
        )
    }

    /// Short label for log lines.
    pub fn label(&self) -> &str {
        self.chapter_path.as_deref().unwrap_or(&self.book_id)
    }

    /// Non-empty text blocks.
    pub fn text_blocks(&self) -> Vec<String> {
        non_empty(&self.text)
    }

    /// Non-empty summary sentences.
    pub fn summary_sentences(&self) -> Vec<String> {
        non_empty(&self.summary)
    }
}

fn non_empty(xs: &[String]) -> Vec<String> {
    xs.iter().filter(|s| !s.trim().is_empty()).cloned().collect()
}

/// One aggregated paragraph alignment, ready to write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Paragraph text.
    pub text: String,
    /// Aligned summary sentences.
    pub summary: Vec<String>,
    /// Similarity of each summary sentence to `text`.
    pub alignment_scores: Vec<f64>,
    /// `"<chapter title>-<paragraph index>"`.
    pub title: String,
}

impl OutputRecord {
    /// Label an aggregated alignment with its chapter title.
    pub fn from_aggregated(chapter_title: &str, agg: AggregatedAlignment) -> Self {
        Self {
            title: format!("{chapter_title}-{}", agg.paragraph),
            text: agg.text,
            summary: agg.summary,
            alignment_scores: agg.scores,
        }
    }
}

/// Parse JSON Lines, skipping blank lines.
pub fn read_jsonl<T, R>(reader: R) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: BufRead,
{
    let mut out = Vec::new();
    for (k, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec = serde_json::from_str(&line).map_err(|source| Error::Json { line: k + 1, source })?;
        out.push(rec);
    }
    Ok(out)
}

/// Write one JSON object per line.
pub fn write_jsonl<'a, T, W, I>(mut writer: W, records: I) -> Result<usize>
where
    T: Serialize + 'a,
    W: Write,
    I: IntoIterator<Item = &'a T>,
{
    let mut n = 0;
    for rec in records {
        serde_json::to_writer(&mut writer, rec).map_err(Error::Serialize)?;
        writer.write_all(b"\n")?;
        n += 1;
    }
    writer.flush()?;
    Ok(n)
}
