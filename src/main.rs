//! booksum-align - align summary sentences to chapter paragraphs
//!
//! Usage:
//!   booksum-align --data-path chapters.jsonl --stable --greedy
//!
//! Writes `<input file name>.stable` / `.greedy` (JSON Lines, one aggregated paragraph per
//! line) into `--output-dir`.

use anyhow::{bail, Context, Result};
use booksum_align::record::{read_jsonl, write_jsonl};
use booksum_align::{
    align_batch, AlignConfig, AlignMode, ChapterRecord, HashedNgramSimilarity, Optimality,
    OutputRecord, UnicodeSentenceCounter,
};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OptimalityArg {
    Resident,
    Hospital,
}

impl From<OptimalityArg> for Optimality {
    fn from(o: OptimalityArg) -> Self {
        match o {
            OptimalityArg::Resident => Optimality::Resident,
            OptimalityArg::Hospital => Optimality::Hospital,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "booksum-align", version, about = "Align summary sentences to chapter paragraphs")]
struct Cli {
    /// Gathered chapters (JSON Lines of {book_id, source, text, summary})
    #[arg(long)]
    data_path: PathBuf,

    /// Run capacitated stable matching
    #[arg(long)]
    stable: bool,

    /// Run greedy (argmax) matching
    #[arg(long)]
    greedy: bool,

    /// JSON file with an AlignConfig; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Blocks with more sentences than this are kept as-is
    #[arg(long)]
    merging_min_sents: Option<usize>,

    /// Upper bound on sentences in a merged paragraph
    #[arg(long)]
    merging_max_sents: Option<usize>,

    /// Sentences each paragraph can take in stable matching
    #[arg(long)]
    alignment_capacity: Option<usize>,

    /// Which side stable matching favours
    #[arg(long, value_enum)]
    optimality: Option<OptimalityArg>,

    /// Hash buckets for the built-in trigram similarity
    #[arg(long, default_value_t = 512)]
    dim: usize,

    /// Directory for output files (defaults to the current directory)
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

impl Cli {
    fn config(&self) -> Result<AlignConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open config {}", path.display()))?;
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => AlignConfig::default(),
        };
        if let Some(n) = self.merging_min_sents {
            config.min_sentences = n;
        }
        if let Some(n) = self.merging_max_sents {
            config.max_sentences = n;
        }
        if let Some(n) = self.alignment_capacity {
            config.capacity = n;
        }
        if let Some(o) = self.optimality {
            config.optimality = o.into();
        }
        if self.stable || self.greedy {
            config.modes.clear();
            if self.stable {
                config.modes.push(AlignMode::Stable);
            }
            if self.greedy {
                config.modes.push(AlignMode::Greedy);
            }
        } else if self.config.is_none() {
            bail!("At least one alignment option must be chosen: --stable, --greedy");
        }
        config.validate()?;
        Ok(config)
    }
}

fn output_path(dir: &Path, data_path: &Path, mode: AlignMode) -> Result<PathBuf> {
    let name = data_path
        .file_name()
        .with_context(|| format!("Not a file path: {}", data_path.display()))?;
    let mut name = name.to_os_string();
    name.push(format!(".{mode}"));
    Ok(dir.join(name))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    let file = File::open(&cli.data_path)
        .with_context(|| format!("Failed to open {}", cli.data_path.display()))?;
    let records: Vec<ChapterRecord> = read_jsonl(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", cli.data_path.display()))?;
    tracing::info!(chapters = records.len(), ?config, "loaded chapters");

    let provider = HashedNgramSimilarity::new(cli.dim)?;
    let results = align_batch(&records, &config, &provider, &UnicodeSentenceCounter);

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Failed to create {}", cli.output_dir.display()))?;

    let failed = results.iter().filter(|r| matches!(r, Some(Err(_)))).count();
    let skipped = results.iter().filter(|r| r.is_none()).count();
    for &mode in &config.modes {
        let path = output_path(&cli.output_dir, &cli.data_path, mode)?;
        let mut out: Vec<OutputRecord> = Vec::new();
        for chapter in results.iter().flatten().flatten() {
            if let Some(m) = chapter.mode(mode) {
                out.extend(m.records());
            }
        }
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let n = write_jsonl(BufWriter::new(file), &out)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(%mode, records = n, path = %path.display(), "wrote alignments");
    }

    tracing::info!(chapters = records.len(), failed, skipped, "done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::parse_from([
            "booksum-align",
            "--data-path",
            "chapters.jsonl",
            "--greedy",
            "--alignment-capacity",
            "3",
        ]);
        let config = cli.config().unwrap();
        assert_eq!(config.capacity, 3);
        assert_eq!(config.modes, vec![AlignMode::Greedy]);
    }

    #[test]
    fn requires_a_mode() {
        let cli = Cli::parse_from(["booksum-align", "--data-path", "x.jsonl"]);
        assert!(cli.config().is_err());
    }

    #[test]
    fn output_files_are_named_after_input() {
        let p = output_path(Path::new("out"), Path::new("data/train.jsonl"), AlignMode::Stable)
            .unwrap();
        assert_eq!(p, Path::new("out/train.jsonl.stable"));
    }
}
