use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;

use crate::logic::config::SafetyConfig;
use crate::logic::error::FraudResult;
use crate::logic::transaction::RiskResult;

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB
const FILE_PREFIX: &str = "results-";

#[derive(Debug, Clone, Serialize)]
pub struct ResultLogStatus {
    pub total_files: usize,
    pub total_size_mb: f32,
    pub current_file: String,
    pub total_records: u64,
}

pub struct ResultWriter {
    file: Mutex<Option<File>>,
    base_dir: PathBuf,
    max_file_size: u64,
    records: AtomicU64,
}

impl ResultWriter {
    pub fn new(base_dir: &Path) -> FraudResult<Self> {
        Self::with_max_size(base_dir, MAX_FILE_SIZE)
    }

    pub fn with_max_size(base_dir: &Path, max_file_size: u64) -> FraudResult<Self> {
        fs::create_dir_all(base_dir)?;
        Ok(Self {
            file: Mutex::new(None),
            base_dir: base_dir.to_path_buf(),
            max_file_size: max_file_size.max(1),
            records: AtomicU64::new(0),
        })
    }

    /// Append one result. Returns false when the log is switched off.
    /// Handles file rotation automatically.
    pub fn append(&self, result: &RiskResult) -> FraudResult<bool> {
        if !SafetyConfig::is_result_log_enabled() {
            return Ok(false);
        }

        let mut file_guard = self.file.lock();

        // If file not open, continue the latest one or create new
        if file_guard.is_none() {
            let reuse = match self.find_latest_log_file()? {
                Some(path) => {
                    let f = OpenOptions::new().create(true).append(true).open(&path)?;
                    if f.metadata()?.len() < self.max_file_size {
                        Some(f)
                    } else {
                        None
                    }
                }
                None => None,
            };
            *file_guard = Some(match reuse {
                Some(f) => f,
                None => self.create_new_file()?,
            });
        }

        let should_rotate = match file_guard.as_ref() {
            Some(f) => f.metadata()?.len() >= self.max_file_size,
            None => false,
        };
        if should_rotate {
            *file_guard = Some(self.create_new_file()?);
        }

        if let Some(file) = file_guard.as_mut() {
            let json = serde_json::to_string(result)?;
            writeln!(file, "{}", json)?;
            self.records.fetch_add(1, Ordering::Relaxed);
        }

        Ok(true)
    }

    pub fn status(&self) -> FraudResult<ResultLogStatus> {
        let mut paths = self.log_files()?;
        let mut size = 0u64;
        for path in &paths {
            if let Ok(meta) = fs::metadata(path) {
                size += meta.len();
            }
        }
        paths.sort();
        let current_file = paths
            .last()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("None")
            .to_string();

        Ok(ResultLogStatus {
            total_files: paths.len(),
            total_size_mb: size as f32 / 1024.0 / 1024.0,
            current_file,
            total_records: self.records.load(Ordering::Relaxed),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn create_new_file(&self) -> FraudResult<File> {
        // timestamp format: YYYY-MM-DD-HHMMSS-NNN (sequence within one second)
        let stamp = Utc::now().format("%Y-%m-%d-%H%M%S").to_string();
        let mut seq = 0u32;
        let mut path = self.base_dir.join(format!("{FILE_PREFIX}{stamp}-{seq:03}.jsonl"));
        while path.exists() {
            seq += 1;
            path = self.base_dir.join(format!("{FILE_PREFIX}{stamp}-{seq:03}.jsonl"));
        }
        Ok(OpenOptions::new().create(true).append(true).open(path)?)
    }

    fn log_files(&self) -> FraudResult<Vec<PathBuf>> {
        Ok(fs::read_dir(&self.base_dir)?
            .filter_map(|res| res.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "jsonl"))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(FILE_PREFIX))
            })
            .collect())
    }

    fn find_latest_log_file(&self) -> FraudResult<Option<PathBuf>> {
        let mut entries = self.log_files()?;
        // Sort by filename (timestamp ensures order)
        entries.sort();
        Ok(entries.pop())
    }
}
