// Integration tests for Concord
use concord::config::{load_schema, ConcordConfig};
use concord::pipeline::{content_hash, BatchAggregator};
use concord::prelude::*;
use concord::{AggregationError, CachedEmbedder, EmbeddingError, ScoreError};
use serde_json::{json, Value};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn record(value: Value) -> Record {
    serde_json::from_value(value).unwrap()
}

fn article_schema() -> Schema {
    let def: SchemaDefinition = serde_json::from_value(json!({
        "fields": [
            {"name": "title", "type": "string"},
            {"name": "summary", "type": "long_text"},
            {"name": "sentiment", "type": {"literal": ["positive", "neutral", "negative"]}},
            {"name": "word_count", "type": "integer", "scale": 100.0},
            {"name": "published", "type": "date", "optional": true},
            {"name": "is_opinion", "type": "boolean"},
            {"name": "entities", "type": {"list": "string"}},
            {"name": "raw_html", "type": "object"}
        ]
    }))
    .unwrap();
    Schema::resolve(&def, &["raw_html"]).unwrap()
}

fn article_candidates() -> Vec<Record> {
    let summary = "The city council approved a new transit budget after a long public hearing on Tuesday night.";
    vec![
        record(json!({
            "title": "Council approves transit budget",
            "summary": summary,
            "sentiment": "neutral",
            "word_count": 420,
            "published": "2024-05-07",
            "is_opinion": false,
            "entities": ["City Council", "Transit Authority"],
            "raw_html": {"len": 1}
        })),
        record(json!({
            "title": "Council approves the transit budget",
            "summary": summary,
            "sentiment": "neutral",
            "word_count": 425,
            "published": "2024-05-07",
            "is_opinion": false,
            "entities": ["city council", "Mayor Lee"],
            "raw_html": {"len": 2}
        })),
        record(json!({
            "title": "Stadium plan collapses",
            "summary": "Plans for a downtown stadium were abandoned after investors withdrew their support.",
            "sentiment": "negative",
            "word_count": 900,
            "published": null,
            "is_opinion": true,
            "entities": ["Transit Authority"],
            "raw_html": {"len": 3}
        })),
    ]
}

#[test]
fn test_end_to_end_consensus() {
    let aggregator = ConcordConfig::default().aggregator();
    let consensus = aggregator
        .aggregate(&article_schema(), &article_candidates(), 2)
        .unwrap();
    let r = &consensus.record;

    assert_eq!(r["title"], json!("Council approves transit budget"));
    assert_eq!(r["sentiment"], json!("neutral"));
    assert_eq!(r["word_count"], json!(420));
    assert_eq!(r["published"], json!("2024-05-07"));
    assert_eq!(r["is_opinion"], json!(false));
    assert_eq!(r["entities"], json!(["City Council", "Transit Authority"]));
    assert_eq!(r["raw_html"], json!({"len": 1}));
    assert!(consensus.is_confident());

    let keys: Vec<_> = r.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["title", "summary", "sentiment", "word_count", "published", "is_opinion", "entities", "raw_html"]
    );
}

#[test]
fn test_consensus_scores_well_against_candidates() {
    let config = ConcordConfig::default();
    let schema = Arc::new(article_schema());
    let consensus = config
        .aggregator()
        .aggregate(&schema, &article_candidates(), 2)
        .unwrap();

    let metric = EvaluationMetric::new(schema, config.scorer());
    let candidates = article_candidates();
    let agreeing = metric.score(&consensus.record, &candidates[1]).unwrap();
    let outlier = metric.score(&consensus.record, &candidates[2]).unwrap();

    assert_eq!(metric.score(&consensus.record, &consensus.record).unwrap(), 1.0);
    assert!(agreeing > outlier, "{} <= {}", agreeing, outlier);
}

#[test]
fn test_list_voting_collapses_spellings() {
    let def = SchemaDefinition::new(vec![FieldDefinition::string_list("fruit")]);
    let schema = Schema::resolve::<&str>(&def, &[]).unwrap();
    let candidates = vec![
        record(json!({"fruit": ["apple", "banana"]})),
        record(json!({"fruit": ["Apple"]})),
        record(json!({"fruit": ["banana", "cherry"]})),
    ];

    let consensus = ConcordConfig::default()
        .aggregator()
        .aggregate(&schema, &candidates, 2)
        .unwrap();
    assert_eq!(consensus.record["fruit"], json!(["apple", "banana"]));
}

#[test]
fn test_error_taxonomy() {
    let schema = article_schema();
    let aggregator = ConcordConfig::default().aggregator();

    assert!(matches!(
        aggregator.aggregate(&schema, &[], 1),
        Err(AggregationError::EmptyCandidateSet)
    ));

    let mut candidates = article_candidates();
    candidates[1].remove("entities");
    assert!(matches!(
        aggregator.aggregate(&schema, &candidates, 1),
        Err(AggregationError::MissingField { candidate: 1, .. })
    ));

    let mut candidates = article_candidates();
    candidates[0].insert("word_count".to_string(), json!(420.5));
    assert!(matches!(
        aggregator.aggregate(&schema, &candidates, 1),
        Err(AggregationError::Score(ScoreError::InvalidValue { .. }))
    ));
}

struct FlakyEmbedder;

impl EmbeddingProvider for FlakyEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable {
            reason: "model not loaded".to_string(),
        })
    }

    fn dim(&self) -> usize {
        8
    }
}

#[test]
fn test_embedding_errors_propagate() {
    let scorer = SimilarityScorer::new(Arc::new(FlakyEmbedder));
    let aggregator = ConsensusAggregator::new(scorer);

    let mut candidates = article_candidates();
    // Differing long summaries force an embedding lookup
    candidates[1].insert(
        "summary".to_string(),
        json!("Transit funding passed the council late on Tuesday after hours of public comment."),
    );
    let err = aggregator.aggregate(&article_schema(), &candidates, 1).unwrap_err();
    assert!(matches!(err, AggregationError::Score(ScoreError::Embedding(_))));
}

struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl EmbeddingProvider for CountingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text)
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }
}

#[test]
fn test_embedding_cache_across_calls() {
    let counting = Arc::new(CountingEmbedder {
        inner: HashEmbedder::new(64),
        calls: AtomicUsize::new(0),
    });
    let cached = Arc::new(CachedEmbedder::new(counting.clone()));
    let scorer = SimilarityScorer::new(cached.clone());

    let schema = Arc::new(article_schema());
    let metric = EvaluationMetric::new(schema, scorer);
    let candidates = article_candidates();

    let first = metric.score(&candidates[0], &candidates[2]).unwrap();
    let calls = counting.calls.load(Ordering::SeqCst);
    assert!(calls > 0);

    for _ in 0..5 {
        assert_eq!(metric.score(&candidates[0], &candidates[2]).unwrap(), first);
    }
    assert_eq!(counting.calls.load(Ordering::SeqCst), calls);
    assert_eq!(cached.len(), calls);
}

#[test]
fn test_batch_pipeline_from_files() {
    let dir = TempDir::new().unwrap();
    let schema_path = dir.path().join("schema.json");
    fs::write(
        &schema_path,
        serde_json::to_string(&json!({
            "fields": [
                {"name": "sentiment", "type": {"literal": ["positive", "negative"]}},
                {"name": "topics", "type": {"list": "string"}},
                {"name": "doc_id", "type": "string"}
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    let input = dir.path().join("samples.jsonl");
    let docs = [
        json!([
            {"sentiment": "positive", "topics": ["rust"], "doc_id": "a"},
            {"sentiment": "positive", "topics": ["Rust", "cli"], "doc_id": "a"}
        ]),
        json!([
            {"sentiment": "negative", "topics": ["tax"], "doc_id": "b"},
            {"sentiment": "negative", "topics": ["tax"]}
        ]),
    ];
    let body: Vec<String> = docs.iter().map(|d| d.to_string()).collect();
    fs::write(&input, body.join("\n")).unwrap();

    let schema = Arc::new(load_schema(&schema_path, &["doc_id"]).unwrap());
    let out = dir.path().join("out");
    let summary = BatchAggregator::new(ConcordConfig::default().aggregator(), schema, 2)
        .with_reports(true)
        .run(&input, &out)
        .unwrap();

    assert_eq!(summary.written.len(), 2);
    assert!(summary.is_clean());

    for written in &summary.written {
        let stored: Record = serde_json::from_str(&fs::read_to_string(&written.path).unwrap()).unwrap();
        let expected_name = format!("{}.json", content_hash(&stored).unwrap());
        assert_eq!(written.path.file_name().unwrap().to_str().unwrap(), expected_name);

        let report_path = written.path.with_extension("confidence.json");
        let report: Value = serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
        let documents = report["documents"].as_array().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["fields"].as_array().unwrap().len(), 3);
    }

    let mut sentiments: Vec<String> = summary
        .written
        .iter()
        .map(|w| {
            let stored: Record = serde_json::from_str(&fs::read_to_string(&w.path).unwrap()).unwrap();
            stored["sentiment"].as_str().unwrap().to_string()
        })
        .collect();
    sentiments.sort();
    assert_eq!(sentiments, vec!["negative", "positive"]);
}
