//! Model Registry - append-only version store + atomically swapped active pointer
//!
//! Flow:
//! 1. Bootstrap version (v0.1.0) installed at construction, pointer never empty
//! 2. `register` validates + persists a candidate (never touches the pointer)
//! 3. `activate` swaps the pointer under the write lock; old version retained
//! 4. `quarantine` renames a rejected artifact to `<version>.quarantined.json`
//!
//! Disk layout (`model_dir`): one `<version>.json` per version + `registry.json`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::classifier::LogisticModel;
use super::metrics::EvaluationMetrics;
use super::version::ModelVersionId;
use crate::logic::error::{FraudError, FraudResult};
use crate::logic::features::LayoutInfo;

// ============================================================================
// CONSTANTS
// ============================================================================

const INDEX_FILE: &str = "registry.json";

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Candidate,
    Active,
    Retired,
    Quarantined,
}

/// Immutable, validated model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub version: ModelVersionId,
    pub classifier: LogisticModel,
    pub schema: LayoutInfo,
    pub metrics: EvaluationMetrics,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the classifier parameters
    pub checksum: String,
    /// Labeled samples the classifier was fitted on
    pub trained_on: usize,
}

impl ModelVersion {
    pub fn new(
        version: ModelVersionId,
        classifier: LogisticModel,
        metrics: EvaluationMetrics,
        trained_on: usize,
    ) -> Self {
        let checksum = classifier.checksum();
        Self {
            version,
            classifier,
            schema: LayoutInfo::current(),
            metrics,
            created_at: Utc::now(),
            checksum,
            trained_on,
        }
    }

    pub fn bootstrap() -> Self {
        Self::new(
            ModelVersionId::bootstrap(),
            LogisticModel::bootstrap(),
            EvaluationMetrics::default(),
            0,
        )
    }

    /// Schema, parameters and checksum must all agree with the running engine
    pub fn validate(&self) -> FraudResult<()> {
        self.schema.validate()?;
        self.classifier.validate()?;
        let actual = self.classifier.checksum();
        if actual != self.checksum {
            return Err(FraudError::SchemaMismatch(format!(
                "checksum mismatch for {}: expected {}, computed {}",
                self.version, self.checksum, actual
            )));
        }
        Ok(())
    }
}

/// Metadata view for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: ModelVersionId,
    pub status: VersionStatus,
    pub created_at: DateTime<Utc>,
    pub metrics: EvaluationMetrics,
    pub checksum: String,
    pub trained_on: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryIndex {
    active: ModelVersionId,
    versions: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    version: ModelVersionId,
    status: VersionStatus,
}

struct Entry {
    model: Arc<ModelVersion>,
    status: VersionStatus,
}

// ============================================================================
// REGISTRY
// ============================================================================

pub struct ModelRegistry {
    versions: RwLock<BTreeMap<ModelVersionId, Entry>>,
    active: RwLock<Arc<ModelVersion>>,
    model_dir: Option<PathBuf>,
    /// Index entries whose artifact could not be loaded; kept in the index
    /// and never reissued
    unloaded: Vec<IndexEntry>,
}

impl ModelRegistry {
    /// Registry without persistence, seeded with the bootstrap version
    pub fn in_memory() -> Self {
        Self::with_bootstrap(None)
    }

    fn with_bootstrap(model_dir: Option<PathBuf>) -> Self {
        let bootstrap = Arc::new(ModelVersion::bootstrap());
        let mut versions = BTreeMap::new();
        versions.insert(
            bootstrap.version,
            Entry {
                model: bootstrap.clone(),
                status: VersionStatus::Active,
            },
        );
        Self {
            versions: RwLock::new(versions),
            active: RwLock::new(bootstrap),
            model_dir,
            unloaded: Vec::new(),
        }
    }

    /// Open (or initialize) a registry persisted in `dir`
    pub fn open(dir: &Path) -> FraudResult<Self> {
        fs::create_dir_all(dir)?;
        let index_path = dir.join(INDEX_FILE);

        if !index_path.exists() {
            let registry = Self::with_bootstrap(Some(dir.to_path_buf()));
            {
                let versions = registry.versions.read();
                for entry in versions.values() {
                    write_json(&dir.join(entry.model.version.artifact_name()), entry.model.as_ref())?;
                }
                registry.write_index(&versions, ModelVersionId::bootstrap())?;
            }
            log::info!("Initialized model registry at {:?} with bootstrap model", dir);
            return Ok(registry);
        }

        let index: RegistryIndex = serde_json::from_reader(BufReader::new(File::open(&index_path)?))?;
        let mut versions = BTreeMap::new();
        let mut unloaded = Vec::new();

        for entry in index.versions {
            let name = match entry.status {
                VersionStatus::Quarantined => entry.version.quarantined_name(),
                _ => entry.version.artifact_name(),
            };
            match read_artifact(&dir.join(&name)) {
                Ok(model) if model.version == entry.version => {
                    versions.insert(
                        entry.version,
                        Entry {
                            model: Arc::new(model),
                            status: entry.status,
                        },
                    );
                    continue;
                }
                Ok(model) => log::warn!("Artifact {} declares version {}, skipping", name, model.version),
                Err(e) => log::warn!("Skipping model artifact {}: {}", name, e),
            }
            unloaded.push(IndexEntry {
                version: entry.version,
                status: if entry.status == VersionStatus::Active {
                    VersionStatus::Retired
                } else {
                    entry.status
                },
            });
        }

        let active_id = match versions.get(&index.active) {
            Some(entry) if entry.status != VersionStatus::Quarantined => index.active,
            _ => {
                log::warn!("Active model {} unavailable, falling back", index.active);
                fallback_active(&mut versions)
            }
        };

        for (id, entry) in versions.iter_mut() {
            if *id == active_id {
                entry.status = VersionStatus::Active;
            } else if entry.status == VersionStatus::Active {
                entry.status = VersionStatus::Retired;
            }
        }

        let active = versions
            .get(&active_id)
            .map(|e| e.model.clone())
            .ok_or_else(|| FraudError::NotFound(format!("active model {active_id}")))?;

        let registry = Self {
            versions: RwLock::new(versions),
            active: RwLock::new(active),
            model_dir: Some(dir.to_path_buf()),
            unloaded,
        };
        {
            let versions = registry.versions.read();
            registry.write_index(&versions, active_id)?;
            log::info!(
                "Model registry loaded from {:?}: {} versions, active {}",
                dir,
                versions.len(),
                active_id
            );
        }
        Ok(registry)
    }

    // ── Reads ──────────────────────────────────────────────────

    /// Active model; clone of the Arc, lock held only for the clone
    pub fn active(&self) -> Arc<ModelVersion> {
        self.active.read().clone()
    }

    pub fn active_version(&self) -> ModelVersionId {
        self.active.read().version
    }

    pub fn get(&self, id: ModelVersionId) -> Option<Arc<ModelVersion>> {
        self.versions.read().get(&id).map(|e| e.model.clone())
    }

    pub fn contains(&self, id: ModelVersionId) -> bool {
        self.versions.read().contains_key(&id)
    }

    pub fn status(&self, id: ModelVersionId) -> Option<VersionStatus> {
        self.versions.read().get(&id).map(|e| e.status)
    }

    pub fn len(&self) -> usize {
        self.versions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.read().is_empty()
    }

    /// Next minor after the highest version ever registered, including
    /// index entries whose artifact failed to load
    pub fn next_version(&self) -> ModelVersionId {
        let loaded = self.versions.read().keys().next_back().copied();
        let unloaded = self.unloaded.iter().map(|e| e.version).max();
        loaded
            .max(unloaded)
            .unwrap_or_else(ModelVersionId::bootstrap)
            .next_minor()
    }

    /// Versions listed in the index whose artifact could not be loaded
    pub fn unloaded_versions(&self) -> Vec<ModelVersionId> {
        self.unloaded.iter().map(|e| e.version).collect()
    }

    pub fn list(&self) -> Vec<VersionInfo> {
        self.versions
            .read()
            .values()
            .map(|e| VersionInfo {
                version: e.model.version,
                status: e.status,
                created_at: e.model.created_at,
                metrics: e.model.metrics.clone(),
                checksum: e.model.checksum.clone(),
                trained_on: e.model.trained_on,
            })
            .collect()
    }

    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }

    pub fn artifact_path(&self, id: ModelVersionId) -> Option<PathBuf> {
        self.model_dir.as_ref().map(|d| d.join(id.artifact_name()))
    }

    pub fn quarantined_path(&self, id: ModelVersionId) -> Option<PathBuf> {
        self.model_dir.as_ref().map(|d| d.join(id.quarantined_name()))
    }

    // ── Writes ─────────────────────────────────────────────────

    /// Validate, persist and record a candidate. The active pointer is untouched.
    pub fn register(&self, model: ModelVersion) -> FraudResult<Arc<ModelVersion>> {
        model.validate()?;

        let mut versions = self.versions.write();
        if versions.contains_key(&model.version) || self.unloaded.iter().any(|e| e.version == model.version) {
            return Err(FraudError::InvalidInput(format!(
                "model version {} already registered",
                model.version
            )));
        }

        if let Some(path) = self.artifact_path(model.version) {
            write_json(&path, &model)?;
        }

        let model = Arc::new(model);
        versions.insert(
            model.version,
            Entry {
                model: model.clone(),
                status: VersionStatus::Candidate,
            },
        );
        let active = self.active_version();
        self.write_index(&versions, active)?;

        log::info!("Registered model candidate {}", model.version);
        Ok(model)
    }

    /// Swap the active pointer to `id`. Returns the previously active version.
    pub fn activate(&self, id: ModelVersionId) -> FraudResult<ModelVersionId> {
        let mut versions = self.versions.write();
        let model = match versions.get(&id) {
            None => return Err(FraudError::NotFound(format!("model version {id}"))),
            Some(entry) if entry.status == VersionStatus::Quarantined => {
                return Err(FraudError::InvalidInput(format!("model version {id} is quarantined")))
            }
            Some(entry) => entry.model.clone(),
        };
        model.validate()?;

        let previous = self.active_version();
        if previous == id {
            return Ok(previous);
        }

        set_status(&mut versions, previous, VersionStatus::Retired);
        let prior_status = set_status(&mut versions, id, VersionStatus::Active);
        if let Err(e) = self.write_index(&versions, id) {
            set_status(&mut versions, id, prior_status.unwrap_or(VersionStatus::Candidate));
            set_status(&mut versions, previous, VersionStatus::Active);
            return Err(e);
        }

        *self.active.write() = model;

        log::info!("Active model swapped: {} -> {}", previous, id);
        Ok(previous)
    }

    /// Mark a non-active version as quarantined and rename its artifact
    pub fn quarantine(&self, id: ModelVersionId) -> FraudResult<()> {
        let mut versions = self.versions.write();
        if self.active_version() == id {
            return Err(FraudError::InvalidInput(format!("cannot quarantine active model {id}")));
        }

        let entry = versions
            .get_mut(&id)
            .ok_or_else(|| FraudError::NotFound(format!("model version {id}")))?;
        if entry.status == VersionStatus::Quarantined {
            return Ok(());
        }

        if let Some(dir) = &self.model_dir {
            let from = dir.join(id.artifact_name());
            let to = dir.join(id.quarantined_name());
            if from.exists() {
                fs::rename(&from, &to)?;
            } else {
                write_json(&to, entry.model.as_ref())?;
            }
        }
        entry.status = VersionStatus::Quarantined;

        let active = self.active_version();
        self.write_index(&versions, active)?;

        log::warn!("Model {} quarantined", id);
        Ok(())
    }

    /// Load an artifact from disk, verify it and register it if new
    pub fn load_artifact(&self, path: &Path) -> FraudResult<Arc<ModelVersion>> {
        let model = read_artifact(path)?;

        if let Some(existing) = self.get(model.version) {
            if existing.checksum == model.checksum {
                return Ok(existing);
            }
            return Err(FraudError::InvalidInput(format!(
                "model version {} already registered with a different checksum",
                model.version
            )));
        }

        self.register(model)
    }

    // ── Internal ───────────────────────────────────────────────

    fn write_index(&self, versions: &BTreeMap<ModelVersionId, Entry>, active: ModelVersionId) -> FraudResult<()> {
        let Some(dir) = &self.model_dir else {
            return Ok(());
        };
        let mut entries: Vec<IndexEntry> = versions
            .iter()
            .map(|(id, e)| IndexEntry {
                version: *id,
                status: e.status,
            })
            .chain(self.unloaded.iter().cloned())
            .collect();
        entries.sort_by_key(|e| e.version);
        let index = RegistryIndex {
            active,
            versions: entries,
        };
        write_json(&dir.join(INDEX_FILE), &index)
    }
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

fn set_status(
    versions: &mut BTreeMap<ModelVersionId, Entry>,
    id: ModelVersionId,
    status: VersionStatus,
) -> Option<VersionStatus> {
    versions.get_mut(&id).map(|e| std::mem::replace(&mut e.status, status))
}

/// Newest non-quarantined version, or a freshly inserted bootstrap
fn fallback_active(versions: &mut BTreeMap<ModelVersionId, Entry>) -> ModelVersionId {
    if let Some((id, _)) = versions
        .iter()
        .rev()
        .find(|(_, e)| e.status != VersionStatus::Quarantined)
    {
        return *id;
    }
    let bootstrap = ModelVersion::bootstrap();
    let id = bootstrap.version;
    versions.insert(
        id,
        Entry {
            model: Arc::new(bootstrap),
            status: VersionStatus::Active,
        },
    );
    id
}

fn read_artifact(path: &Path) -> FraudResult<ModelVersion> {
    let file = File::open(path)?;
    let model: ModelVersion = serde_json::from_reader(BufReader::new(file))?;
    model.validate()?;
    Ok(model)
}

/// Write via temp file + rename
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> FraudResult<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
