//! Text file adapters for corpus, coordinates and results.
//!
//! # Formats
//!
//! | File | One line per | Fields |
//! |------|--------------|--------|
//! | tokens | token | `word_id document_id is_toponym is_stopword` |
//! | coordinates | toponym word | `word_id lon lat [lon lat ...]` |
//! | assignments | token | `word document toponym stopword region coordinate` |
//!
//! Flags are `0`/`1`. Blank lines and lines starting with `#` are skipped.
//! Paths ending in `.gz` are read and written through `flate2`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use toporeg_sphere::{read_coordinates, read_tokens};
//!
//! let corpus = read_tokens(Path::new("tokens.txt.gz"))?;
//! let lexicon = read_coordinates(Path::new("coordinates.txt"))?;
//! ```

use crate::output::{ModelOutput, TokenAssignment};
use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use toporeg_core::{CoordinateLexicon, Corpus, GeoPoint, TokenRecord};
use tracing::info;

const READ_BUFFER: usize = 1 << 20;

fn is_gz(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Buffered reader over a plain or gz-compressed file.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    Ok(if is_gz(path) {
        Box::new(BufReader::with_capacity(READ_BUFFER, GzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(READ_BUFFER, file))
    })
}

fn open_writer(path: &Path) -> Result<Box<dyn Write>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let writer = BufWriter::new(file);
    Ok(if is_gz(path) {
        Box::new(GzEncoder::new(writer, Compression::default()))
    } else {
        Box::new(writer)
    })
}

/// Data lines with their 1-based line numbers.
fn data_lines(reader: impl BufRead) -> impl Iterator<Item = (usize, std::io::Result<String>)> {
    reader
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| {
            line.as_ref()
                .map(|l| {
                    let t = l.trim();
                    !t.is_empty() && !t.starts_with('#')
                })
                .unwrap_or(true)
        })
}

fn field<T: FromStr>(value: Option<&str>, name: &str, line: usize) -> Result<T> {
    let value = value.ok_or_else(|| anyhow!("line {}: missing {}", line, name))?;
    value
        .parse()
        .map_err(|_| anyhow!("line {}: invalid {} {:?}", line, name, value))
}

fn flag(value: Option<&str>, name: &str, line: usize) -> Result<bool> {
    match field::<u8>(value, name, line)? {
        0 => Ok(false),
        1 => Ok(true),
        other => bail!("line {}: {} must be 0 or 1, got {}", line, name, other),
    }
}

/// Parses a token stream.
pub fn parse_tokens(reader: impl BufRead) -> Result<Corpus> {
    let mut records = Vec::new();
    for (line_no, line) in data_lines(reader) {
        let line = line.with_context(|| format!("line {}: read failed", line_no))?;
        let mut fields = line.split_whitespace();
        records.push(TokenRecord {
            word_id: field(fields.next(), "word id", line_no)?,
            document_id: field(fields.next(), "document id", line_no)?,
            is_toponym: flag(fields.next(), "toponym flag", line_no)?,
            is_stopword: flag(fields.next(), "stopword flag", line_no)?,
        });
        if let Some(extra) = fields.next() {
            bail!("line {}: unexpected field {:?}", line_no, extra);
        }
    }
    Corpus::from_records(records).context("Invalid token stream")
}

/// Reads a token stream file into a [`Corpus`].
pub fn read_tokens(path: &Path) -> Result<Corpus> {
    let corpus =
        parse_tokens(open_reader(path)?).with_context(|| format!("In token file {:?}", path))?;
    info!(
        "Loaded {} tokens ({} active) over {} documents, W={} from {:?}",
        corpus.len(),
        corpus.active_len(),
        corpus.document_count(),
        corpus.vocabulary_size(),
        path
    );
    Ok(corpus)
}

/// Parses coordinate records, keeping the last record of a repeated word id.
pub fn parse_coordinate_records(reader: impl BufRead) -> Result<IndexMap<u32, Vec<GeoPoint>>> {
    let mut records = IndexMap::new();
    for (line_no, line) in data_lines(reader) {
        let line = line.with_context(|| format!("line {}: read failed", line_no))?;
        let mut fields = line.split_whitespace();
        let word: u32 = field(fields.next(), "word id", line_no)?;
        let values = fields
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| anyhow!("line {}: invalid coordinate {:?}", line_no, v))
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() % 2 != 0 {
            bail!(
                "line {}: word {} has an odd number of coordinate values ({})",
                line_no,
                word,
                values.len()
            );
        }
        let points = values
            .chunks_exact(2)
            .map(|pair| GeoPoint::new(pair[0], pair[1]))
            .collect();
        records.insert(word, points);
    }
    Ok(records)
}

pub fn parse_coordinates(reader: impl BufRead) -> Result<CoordinateLexicon> {
    let records = parse_coordinate_records(reader)?;
    CoordinateLexicon::from_records(&records).context("Invalid coordinate records")
}

/// Reads a coordinate file into a [`CoordinateLexicon`].
pub fn read_coordinates(path: &Path) -> Result<CoordinateLexicon> {
    let lexicon = parse_coordinates(open_reader(path)?)
        .with_context(|| format!("In coordinate file {:?}", path))?;
    info!(
        "Loaded {} candidates for {} word ids ({} null candidates dropped) from {:?}",
        lexicon.total_candidates(),
        lexicon.word_span(),
        lexicon.filtered_candidates(),
        path
    );
    Ok(lexicon)
}

/// Writes one line per token with its decoded region and coordinate.
pub fn write_assignments(
    writer: &mut dyn Write,
    corpus: &Corpus,
    assignments: &[TokenAssignment],
) -> Result<()> {
    if assignments.len() != corpus.len() {
        bail!(
            "{} assignments for a corpus of {} tokens",
            assignments.len(),
            corpus.len()
        );
    }
    for (record, a) in corpus.records().zip(assignments) {
        writeln!(
            writer,
            "{} {} {} {} {} {}",
            record.word_id,
            record.document_id,
            u8::from(record.is_toponym),
            u8::from(record.is_stopword),
            a.region.map_or(-1, i64::from),
            a.coordinate.map_or(-1, i64::from),
        )?;
    }
    Ok(())
}

pub fn write_assignments_file(
    path: &Path,
    corpus: &Corpus,
    assignments: &[TokenAssignment],
) -> Result<()> {
    let mut writer = open_writer(path)?;
    write_assignments(&mut writer, corpus, assignments)
        .with_context(|| format!("Failed to write assignments to {:?}", path))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {:?}", path))?;
    info!("Wrote {} token assignments to {:?}", assignments.len(), path);
    Ok(())
}

/// Writes the posterior summary as pretty JSON.
pub fn write_output_json(path: &Path, output: &ModelOutput) -> Result<()> {
    let mut writer = open_writer(path)?;
    serde_json::to_writer_pretty(&mut writer, output)
        .with_context(|| format!("Failed to serialize model output to {:?}", path))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {:?}", path))?;
    info!("Wrote {} region summaries to {:?}", output.regions.len(), path);
    Ok(())
}
