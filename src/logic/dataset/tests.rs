use std::fs;

use chrono::Utc;
use tempfile::tempdir;

use super::writer::ResultWriter;
use crate::logic::features::FeatureVector;
use crate::logic::model::ModelVersionId;
use crate::logic::transaction::{Decision, RiskResult};

fn result(id: &str, score: f64) -> RiskResult {
    RiskResult {
        transaction_id: id.to_string(),
        score,
        decision: Decision::Review,
        features: FeatureVector::new(),
        model_version: ModelVersionId::bootstrap(),
        scored_at: Utc::now(),
        latency_us: 42,
    }
}

#[test]
fn test_result_append_and_read() {
    let dir = tempdir().unwrap();
    let writer = ResultWriter::new(dir.path()).unwrap();

    assert!(writer.append(&result("tx_1", 0.6)).unwrap());

    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap()).collect();
    assert_eq!(entries.len(), 1);
    let path = entries[0].path();
    assert!(path.extension().unwrap() == "jsonl");

    let content = fs::read_to_string(&path).unwrap();
    let back: RiskResult = serde_json::from_str(content.trim()).unwrap();
    assert_eq!(back.transaction_id, "tx_1");
    assert_eq!(back.decision, Decision::Review);
    assert_eq!(back.model_version, ModelVersionId::bootstrap());
    assert!(back.features.is_compatible());
}

#[test]
fn test_rotation_creates_new_file() {
    let dir = tempdir().unwrap();
    let writer = ResultWriter::with_max_size(dir.path(), 1).unwrap();

    for i in 0..3 {
        writer.append(&result(&format!("tx_{i}"), 0.1)).unwrap();
    }

    let status = writer.status().unwrap();
    assert_eq!(status.total_files, 3);
    assert_eq!(status.total_records, 3);
}

#[test]
fn test_reopen_continues_latest_file() {
    let dir = tempdir().unwrap();
    {
        let writer = ResultWriter::new(dir.path()).unwrap();
        writer.append(&result("tx_1", 0.1)).unwrap();
    }
    let writer = ResultWriter::new(dir.path()).unwrap();
    writer.append(&result("tx_2", 0.2)).unwrap();

    assert_eq!(writer.status().unwrap().total_files, 1);
    let path = fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap().path();
    assert_eq!(fs::read_to_string(path).unwrap().lines().count(), 2);
}
