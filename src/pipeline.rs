//! Batch orchestration
//!
//! Reads candidate sets from disk, aggregates them on the rayon pool and
//! writes one consensus record per input document. A document that fails is
//! logged and recorded in the [`BatchSummary`]; the rest of the batch carries
//! on.
//!
//! Input layout:
//! - `*.json`: one JSON array of candidate records (one document)
//! - `*.jsonl`: one JSON array of candidate records per non-empty line
//! - a directory: every `*.json` / `*.jsonl` file inside, in name order
//!
//! Output files are named by a content hash of the serialized record, so
//! identical consensus records land in the same file. Their confidence
//! sidecar then lists one report per contributing document.

use anyhow::{anyhow, Context, Result};
use atomicwrites::{AllowOverwrite, AtomicFile};
use chrono::{DateTime, Utc};
use concord_consensus::{Consensus, ConsensusAggregator, FieldReport};
use concord_core::Record;
use concord_similarity::Schema;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hex characters of the blake3 digest used in output file names
pub const HASH_PREFIX_LEN: usize = 16;

/// One input document's candidate set
#[derive(Debug, Clone)]
pub struct CandidateDocument {
    /// `path` or `path:line` the candidates came from
    pub source: String,
    pub candidates: Vec<Record>,
}

/// A consensus record that reached disk
#[derive(Debug, Clone, Serialize)]
pub struct WrittenRecord {
    pub source: String,
    pub path: PathBuf,
    pub low_confidence_fields: Vec<String>,
    /// An earlier document in the batch already produced this record file
    pub duplicate: bool,
}

/// A document that could not be read or aggregated
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub written: Vec<WrittenRecord>,
    pub failures: Vec<DocumentFailure>,
}

impl BatchSummary {
    pub fn documents(&self) -> usize {
        self.written.len() + self.failures.len()
    }

    /// Number of record files on disk
    pub fn distinct_records(&self) -> usize {
        self.written.iter().filter(|w| !w.duplicate).count()
    }

    pub fn low_confidence_count(&self) -> usize {
        self.written
            .iter()
            .filter(|w| !w.low_confidence_fields.is_empty())
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sidecar contents: one report per document that produced the record
#[derive(Serialize)]
struct ConfidenceSidecar<'a> {
    documents: Vec<DocumentReport<'a>>,
}

#[derive(Serialize)]
struct DocumentReport<'a> {
    source: &'a str,
    fields: &'a [FieldReport],
}

/// An aggregated document waiting to be written
struct Resolved<'a> {
    source: &'a str,
    hash: String,
    consensus: Consensus,
}

/// Aggregates candidate-set files into consensus record files.
pub struct BatchAggregator {
    aggregator: ConsensusAggregator,
    schema: Arc<Schema>,
    threshold: usize,
    write_reports: bool,
}

impl BatchAggregator {
    pub fn new(aggregator: ConsensusAggregator, schema: Arc<Schema>, threshold: usize) -> Self {
        Self {
            aggregator,
            schema,
            threshold,
            write_reports: false,
        }
    }

    /// Also write a `<hash>.confidence.json` sidecar per record
    pub fn with_reports(mut self, enabled: bool) -> Self {
        self.write_reports = enabled;
        self
    }

    /// Aggregate every document under `input` and write results to `output`.
    ///
    /// Only failures to set up the batch (unreadable input path, uncreatable
    /// output directory) are errors; per-document failures go to the summary.
    /// Documents that reach the same record share one record file and one
    /// sidecar listing every contributing document.
    pub fn run(&self, input: &Path, output: &Path) -> Result<BatchSummary> {
        let started_at = Utc::now();
        fs::create_dir_all(output)
            .with_context(|| format!("Failed to create output directory {:?}", output))?;

        let (documents, mut failures) = load_documents(input)?;
        info!("Loaded {} documents from {:?}", documents.len(), input);

        let results: Vec<std::result::Result<Resolved<'_>, DocumentFailure>> = documents
            .par_iter()
            .map(|doc| self.resolve(doc).map_err(|e| failure(&doc.source, &e)))
            .collect();

        // Group by output file, keeping input order inside and across groups
        let mut groups: Vec<Vec<Resolved<'_>>> = Vec::new();
        let mut slot_of: HashMap<String, usize> = HashMap::new();
        for result in results {
            match result {
                Ok(resolved) => match slot_of.get(&resolved.hash) {
                    Some(&slot) => groups[slot].push(resolved),
                    None => {
                        slot_of.insert(resolved.hash.clone(), groups.len());
                        groups.push(vec![resolved]);
                    }
                },
                Err(failure) => failures.push(failure),
            }
        }

        let outcomes: Vec<std::result::Result<Vec<WrittenRecord>, Vec<DocumentFailure>>> = groups
            .par_iter()
            .map(|group| self.write_group(group, output))
            .collect();

        let mut written = Vec::with_capacity(documents.len());
        for outcome in outcomes {
            match outcome {
                Ok(records) => written.extend(records),
                Err(errors) => failures.extend(errors),
            }
        }

        let summary = BatchSummary {
            started_at,
            finished_at: Utc::now(),
            written,
            failures,
        };
        info!(
            "Batch finished: {} written ({} distinct), {} failed, {} with low-confidence fields",
            summary.written.len(),
            summary.distinct_records(),
            summary.failures.len(),
            summary.low_confidence_count()
        );
        Ok(summary)
    }

    pub fn aggregate(&self, doc: &CandidateDocument) -> Result<Consensus> {
        self.aggregator
            .aggregate(&self.schema, &doc.candidates, self.threshold)
            .with_context(|| format!("Aggregation failed for {}", doc.source))
    }

    fn resolve<'a>(&self, doc: &'a CandidateDocument) -> Result<Resolved<'a>> {
        let consensus = self.aggregate(doc)?;
        let hash = content_hash(&consensus.record)?;
        Ok(Resolved {
            source: &doc.source,
            hash,
            consensus,
        })
    }

    /// Write one record file, plus the sidecar covering every document in `group`
    fn write_group(
        &self,
        group: &[Resolved<'_>],
        output: &Path,
    ) -> std::result::Result<Vec<WrittenRecord>, Vec<DocumentFailure>> {
        let Some(first) = group.first() else {
            return Ok(Vec::new());
        };
        let path = output.join(format!("{}.json", first.hash));

        self.write_files(group, &path, output).map_err(|e| {
            group
                .iter()
                .map(|doc| failure(doc.source, &e))
                .collect::<Vec<_>>()
        })?;
        debug!("Wrote consensus for {} document(s) to {:?}", group.len(), path);

        if group.len() > 1 {
            info!("{} documents share consensus record {:?}", group.len(), path);
        }

        Ok(group
            .iter()
            .enumerate()
            .map(|(idx, doc)| WrittenRecord {
                source: doc.source.to_string(),
                path: path.clone(),
                low_confidence_fields: doc
                    .consensus
                    .low_confidence_fields()
                    .map(str::to_string)
                    .collect(),
                duplicate: idx > 0,
            })
            .collect())
    }

    fn write_files(&self, group: &[Resolved<'_>], path: &Path, output: &Path) -> Result<()> {
        let first = &group[0];
        let body = serde_json::to_vec_pretty(&first.consensus.record)?;
        write_atomic(path, &body)?;

        if self.write_reports {
            let sidecar = ConfidenceSidecar {
                documents: group
                    .iter()
                    .map(|doc| DocumentReport {
                        source: doc.source,
                        fields: &doc.consensus.fields,
                    })
                    .collect(),
            };
            let report_path = output.join(format!("{}.confidence.json", first.hash));
            write_atomic(&report_path, &serde_json::to_vec_pretty(&sidecar)?)?;
        }
        Ok(())
    }
}

fn failure(source: &str, error: &anyhow::Error) -> DocumentFailure {
    warn!("Failed to process {}: {:#}", source, error);
    DocumentFailure {
        source: source.to_string(),
        error: format!("{:#}", error),
    }
}

/// Hex prefix of the blake3 digest of the record's compact JSON form
pub fn content_hash(record: &Record) -> Result<String> {
    let bytes = serde_json::to_vec(record)?;
    let hash = blake3::hash(&bytes);
    Ok(hash.to_hex().as_str()[..HASH_PREFIX_LEN].to_string())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    AtomicFile::new(path, AllowOverwrite)
        .write(|f| f.write_all(bytes))
        .with_context(|| format!("Failed to write {:?}", path))
}

/// Read every candidate set under `input`.
///
/// Unparseable documents are returned as failures instead of aborting.
pub fn load_documents(input: &Path) -> Result<(Vec<CandidateDocument>, Vec<DocumentFailure>)> {
    let mut documents = Vec::new();
    let mut failures = Vec::new();

    for file in input_files(input)? {
        let raw = match fs::read_to_string(&file) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read {:?}: {}", file, e);
                failures.push(DocumentFailure {
                    source: file.display().to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        if is_jsonl(&file) {
            for (idx, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let source = format!("{}:{}", file.display(), idx + 1);
                push_parsed(&mut documents, &mut failures, source, line);
            }
        } else {
            push_parsed(&mut documents, &mut failures, file.display().to_string(), &raw);
        }
    }

    Ok((documents, failures))
}

fn push_parsed(
    documents: &mut Vec<CandidateDocument>,
    failures: &mut Vec<DocumentFailure>,
    source: String,
    raw: &str,
) {
    match serde_json::from_str::<Vec<Record>>(raw) {
        Ok(candidates) => documents.push(CandidateDocument { source, candidates }),
        Err(e) => {
            warn!("Failed to parse {}: {}", source, e);
            failures.push(DocumentFailure {
                source,
                error: format!("Invalid candidate set: {}", e),
            });
        }
    }
}

fn is_jsonl(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("jsonl")
}

fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(anyhow!("Input path {:?} does not exist", input));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(input).with_context(|| format!("Failed to list {:?}", input))? {
        let path = entry?.path();
        let candidate = path.is_file()
            && matches!(path.extension().and_then(|e| e.to_str()), Some("json") | Some("jsonl"));
        if candidate {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
