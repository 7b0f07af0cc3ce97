//! Decision Log - append-only record of every guardian decision
//!
//! Log format: JSON Lines (.jsonl)
//! Location: {data_dir}/guardian_decisions.jsonl
//!
//! Rotation renames the full file to `guardian_decisions.<timestamp>.jsonl`;
//! rotated files are never deleted.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::types::{DecisionType, GuardianDecision};
use crate::logic::error::FraudResult;

// ============================================================================
// CONSTANTS
// ============================================================================

const MAX_LOG_ENTRIES: usize = 10_000; // Rotate sau 10k entries
const MAX_IN_MEMORY: usize = 1_000; // Cache 1k entries gần nhất

// ============================================================================
// DECISION LOG
// ============================================================================

pub struct DecisionLog {
    path: Option<PathBuf>,
    cache: RwLock<Vec<GuardianDecision>>,
    write_count: Mutex<usize>,
    total: Mutex<usize>,
    max_in_memory: usize,
    max_file_entries: usize,
}

impl DecisionLog {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cache: RwLock::new(Vec::new()),
            write_count: Mutex::new(0),
            total: Mutex::new(0),
            max_in_memory: MAX_IN_MEMORY,
            max_file_entries: MAX_LOG_ENTRIES,
        }
    }

    /// File-backed log; existing entries are loaded into the cache
    pub fn with_file(path: &Path) -> FraudResult<Self> {
        Self::with_limits(path, MAX_IN_MEMORY, MAX_LOG_ENTRIES)
    }

    pub fn with_limits(path: &Path, max_in_memory: usize, max_file_entries: usize) -> FraudResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                match serde_json::from_str::<GuardianDecision>(&line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => log::warn!("Skipping malformed decision log line: {}", e),
                }
            }
            log::info!("Loaded {} guardian decisions from {:?}", entries.len(), path);
        }

        let on_disk = entries.len();
        trim_front(&mut entries, max_in_memory.max(1));

        Ok(Self {
            path: Some(path.to_path_buf()),
            cache: RwLock::new(entries),
            write_count: Mutex::new(on_disk),
            total: Mutex::new(on_disk),
            max_in_memory: max_in_memory.max(1),
            max_file_entries: max_file_entries.max(1),
        })
    }

    /// Append one decision (memory + disk). Disk errors are logged, never lost
    /// from memory.
    pub fn append(&self, entry: GuardianDecision) {
        log::info!(
            "[Guardian] {} | {} | old={:?} new={:?}",
            entry.decision.as_str(),
            entry.reasoning,
            entry.old_version.map(|v| v.to_string()),
            entry.new_version.map(|v| v.to_string())
        );

        {
            let mut cache = self.cache.write();
            cache.push(entry.clone());
            trim_front(&mut cache, self.max_in_memory);
        }
        *self.total.lock() += 1;

        if let Some(path) = &self.path {
            if let Err(e) = self.write_to_disk(path, &entry) {
                log::error!("Failed to write guardian decision log: {}", e);
            }
        }
    }

    /// N most recent decisions, oldest first
    pub fn recent(&self, limit: usize) -> Vec<GuardianDecision> {
        let cache = self.cache.read();
        let start = cache.len().saturating_sub(limit);
        cache[start..].to_vec()
    }

    /// Most recent decisions of one type, newest first
    pub fn by_type(&self, decision: DecisionType, limit: usize) -> Vec<GuardianDecision> {
        self.cache
            .read()
            .iter()
            .rev()
            .filter(|e| e.decision == decision)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<GuardianDecision> {
        self.cache.read().clone()
    }

    pub fn count(&self, decision: DecisionType) -> usize {
        self.cache.read().iter().filter(|e| e.decision == decision).count()
    }

    /// Entries appended or loaded over the log's lifetime
    pub fn len(&self) -> usize {
        *self.total.lock()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn stats(&self) -> DecisionStats {
        let cache = self.cache.read();
        let mut stats = DecisionStats {
            cached_entries: cache.len(),
            retrains_triggered: 0,
            retrains_skipped: 0,
            models_kept: 0,
            models_rolled_back: 0,
        };
        for entry in cache.iter() {
            match entry.decision {
                DecisionType::RetrainTriggered => stats.retrains_triggered += 1,
                DecisionType::RetrainSkipped => stats.retrains_skipped += 1,
                DecisionType::ModelKept => stats.models_kept += 1,
                DecisionType::ModelRolledBack => stats.models_rolled_back += 1,
            }
        }
        stats
    }

    // ── Internal ───────────────────────────────────────────────

    fn write_to_disk(&self, path: &Path, entry: &GuardianDecision) -> FraudResult<()> {
        let mut count = self.write_count.lock();

        {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let mut writer = BufWriter::new(file);
            let json = serde_json::to_string(entry)?;
            writeln!(writer, "{}", json)?;
            writer.flush()?;
        }
        *count += 1;

        if *count >= self.max_file_entries {
            rotate(path)?;
            *count = 0;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionStats {
    pub cached_entries: usize,
    pub retrains_triggered: usize,
    pub retrains_skipped: usize,
    pub models_kept: usize,
    pub models_rolled_back: usize,
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

fn trim_front<T>(entries: &mut Vec<T>, max: usize) {
    let len = entries.len();
    if len > max {
        entries.drain(0..len - max);
    }
}

fn rotate(path: &Path) -> FraudResult<()> {
    if !path.exists() {
        return Ok(());
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("decisions");
    let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");

    let mut seq = 0u32;
    let mut target = path.with_file_name(format!("{stem}.{stamp}.jsonl"));
    while target.exists() {
        seq += 1;
        target = path.with_file_name(format!("{stem}.{stamp}-{seq}.jsonl"));
    }

    std::fs::rename(path, &target)?;
    log::info!("Rotated guardian decision log to {:?}", target);
    Ok(())
}
