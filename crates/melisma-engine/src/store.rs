//! Injected persistence for voice profiles and training jobs.
//!
//! The registry and training runner never touch module globals: they hold a
//! store trait object, so tests swap in [`MemoryStore`] and production uses
//! [`JsonFileStore`] (one JSON document per key, atomic replace, advisory
//! write lock). Job writes enforce terminal finality here, at the lowest
//! layer, so no caller can resurrect a finished job.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::RwLock;
use tracing::warn;

use melisma_voice::{TrainingJob, VoiceProfile};

use crate::error::{EngineError, EngineResult};

/// Storage for voice profiles, keyed by voice id.
pub trait VoiceStore: Send + Sync {
    fn get_voice(&self, voice_id: &str) -> EngineResult<Option<VoiceProfile>>;
    fn put_voice(&self, profile: &VoiceProfile) -> EngineResult<()>;
    /// Returns true when an entry was removed.
    fn delete_voice(&self, voice_id: &str) -> EngineResult<bool>;
    fn list_voices(&self) -> EngineResult<Vec<VoiceProfile>>;
}

/// Storage for training job snapshots, keyed by job id.
pub trait JobStore: Send + Sync {
    fn get_job(&self, job_id: &str) -> EngineResult<Option<TrainingJob>>;
    /// Persists a snapshot. Writes against a terminal snapshot are dropped.
    fn put_job(&self, job: &TrainingJob) -> EngineResult<()>;
    fn list_jobs(&self) -> EngineResult<Vec<TrainingJob>>;
}

/// Terminal snapshots are final; only an identical rewrite is allowed.
fn job_write_allowed(existing: Option<&TrainingJob>, incoming: &TrainingJob) -> bool {
    match existing {
        Some(current) if current.is_terminal() => current == incoming,
        _ => true,
    }
}

/// File keys come from ids the engine generates, but uploads can feed into
/// voice names, so squash anything that could escape the directory.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One JSON document per key under `<root>/<kind>/<key>.json`.
///
/// Writes go to a temp file in the target directory and are renamed into
/// place, retried once, so readers only ever observe a complete document.
/// An advisory `fs2` lock on `<root>/.write.lock` serializes writers across
/// processes; reads take no lock at all.
pub struct JsonFileStore {
    root: PathBuf,
}

const VOICES_DIR: &str = "voices";
const JOBS_DIR: &str = "jobs";
const LOCK_FILE: &str = ".write.lock";

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> EngineResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(VOICES_DIR))?;
        fs::create_dir_all(root.join(JOBS_DIR))?;
        Ok(Self { root })
    }

    fn document_path(&self, kind: &str, key: &str) -> PathBuf {
        self.root.join(kind).join(format!("{}.json", sanitize_key(key)))
    }

    fn write_locked(&self, path: &Path, json: &str, context: &str) -> EngineResult<()> {
        let lock = File::create(self.root.join(LOCK_FILE)).map_err(|source| {
            EngineError::Persistence {
                context: format!("{context}: open write lock"),
                source,
            }
        })?;
        lock.lock_exclusive().map_err(|source| EngineError::Persistence {
            context: format!("{context}: acquire write lock"),
            source,
        })?;

        let result = atomic_write(path, json.as_bytes());
        let _ = fs2::FileExt::unlock(&lock);

        result.map_err(|source| EngineError::Persistence {
            context: context.to_string(),
            source,
        })
    }

    fn read_document<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> EngineResult<Option<T>> {
        match fs::read_to_string(path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn read_all<T: serde::de::DeserializeOwned>(&self, kind: &str) -> EngineResult<Vec<T>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(self.root.join(kind))? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(doc) = self.read_document(&path)? {
                    out.push(doc);
                }
            }
        }
        Ok(out)
    }
}

/// Write-temp-then-rename with one retry.
fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let attempt = || -> io::Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let temp = tempfile::NamedTempFile::new_in(dir)?;
        fs::write(temp.path(), bytes)?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    };

    attempt().or_else(|first| {
        warn!(path = %path.display(), error = %first, "atomic write failed, retrying once");
        attempt()
    })
}

impl VoiceStore for JsonFileStore {
    fn get_voice(&self, voice_id: &str) -> EngineResult<Option<VoiceProfile>> {
        self.read_document(&self.document_path(VOICES_DIR, voice_id))
    }

    fn put_voice(&self, profile: &VoiceProfile) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(profile)?;
        let path = self.document_path(VOICES_DIR, &profile.voice_id);
        self.write_locked(&path, &json, "voice profile")
    }

    fn delete_voice(&self, voice_id: &str) -> EngineResult<bool> {
        let path = self.document_path(VOICES_DIR, voice_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn list_voices(&self) -> EngineResult<Vec<VoiceProfile>> {
        self.read_all(VOICES_DIR)
    }
}

impl JobStore for JsonFileStore {
    fn get_job(&self, job_id: &str) -> EngineResult<Option<TrainingJob>> {
        self.read_document(&self.document_path(JOBS_DIR, job_id))
    }

    fn put_job(&self, job: &TrainingJob) -> EngineResult<()> {
        let existing = self.get_job(&job.job_id)?;
        if !job_write_allowed(existing.as_ref(), job) {
            warn!(job_id = %job.job_id, "dropping write against terminal job snapshot");
            return Ok(());
        }
        let json = serde_json::to_string_pretty(job)?;
        let path = self.document_path(JOBS_DIR, &job.job_id);
        self.write_locked(&path, &json, "training job")
    }

    fn list_jobs(&self) -> EngineResult<Vec<TrainingJob>> {
        self.read_all(JOBS_DIR)
    }
}

/// In-memory store double for tests.
#[derive(Default)]
pub struct MemoryStore {
    voices: RwLock<HashMap<String, VoiceProfile>>,
    jobs: RwLock<HashMap<String, TrainingJob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoiceStore for MemoryStore {
    fn get_voice(&self, voice_id: &str) -> EngineResult<Option<VoiceProfile>> {
        Ok(self.voices.read().get(voice_id).cloned())
    }

    fn put_voice(&self, profile: &VoiceProfile) -> EngineResult<()> {
        self.voices
            .write()
            .insert(profile.voice_id.clone(), profile.clone());
        Ok(())
    }

    fn delete_voice(&self, voice_id: &str) -> EngineResult<bool> {
        Ok(self.voices.write().remove(voice_id).is_some())
    }

    fn list_voices(&self) -> EngineResult<Vec<VoiceProfile>> {
        Ok(self.voices.read().values().cloned().collect())
    }
}

impl JobStore for MemoryStore {
    fn get_job(&self, job_id: &str) -> EngineResult<Option<TrainingJob>> {
        Ok(self.jobs.read().get(job_id).cloned())
    }

    fn put_job(&self, job: &TrainingJob) -> EngineResult<()> {
        let mut jobs = self.jobs.write();
        if !job_write_allowed(jobs.get(&job.job_id), job) {
            warn!(job_id = %job.job_id, "dropping write against terminal job snapshot");
            return Ok(());
        }
        jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    fn list_jobs(&self) -> EngineResult<Vec<TrainingJob>> {
        Ok(self.jobs.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use melisma_voice::VoiceCharacteristics;
    use pretty_assertions::assert_eq;

    fn profile(id: &str) -> VoiceProfile {
        VoiceProfile::custom(id, id, VoiceCharacteristics::default(), None, Vec::new())
    }

    #[test]
    fn test_file_store_voice_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let p = profile("voice-1");
        store.put_voice(&p).unwrap();
        assert_eq!(store.get_voice("voice-1").unwrap(), Some(p.clone()));
        assert_eq!(store.list_voices().unwrap(), vec![p]);

        assert!(store.delete_voice("voice-1").unwrap());
        assert!(!store.delete_voice("voice-1").unwrap());
        assert_eq!(store.get_voice("voice-1").unwrap(), None);
    }

    #[test]
    fn test_file_store_job_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let mut job = TrainingJob::pending("job-1", "My Voice", Vec::new());
        store.put_job(&job).unwrap();

        job.mark_processing();
        job.advance_progress(40);
        store.put_job(&job).unwrap();

        assert_eq!(store.get_job("job-1").unwrap(), Some(job));
    }

    #[test]
    fn test_terminal_job_writes_are_dropped() {
        let store = MemoryStore::new();
        let mut job = TrainingJob::pending("job-1", "My Voice", Vec::new());
        job.complete("voice-1");
        store.put_job(&job).unwrap();

        // A stale worker snapshot must not overwrite the terminal state.
        let stale = TrainingJob::pending("job-1", "My Voice", Vec::new());
        store.put_job(&stale).unwrap();

        let stored = store.get_job("job-1").unwrap().unwrap();
        assert_eq!(stored.status, melisma_voice::JobStatus::Completed);
        assert_eq!(stored.progress, 100);
    }

    #[test]
    fn test_terminal_job_writes_dropped_on_disk_too() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let mut job = TrainingJob::pending("job-2", "V", Vec::new());
        job.fail("broken input");
        store.put_job(&job).unwrap();

        let stale = TrainingJob::pending("job-2", "V", Vec::new());
        store.put_job(&stale).unwrap();

        let stored = store.get_job("job-2").unwrap().unwrap();
        assert_eq!(stored.status, melisma_voice::JobStatus::Failed);
    }

    #[test]
    fn test_missing_keys_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.get_voice("nope").unwrap(), None);
        assert_eq!(store.get_job("nope").unwrap(), None);
    }

    #[test]
    fn test_keys_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let p = profile("../escape attempt");
        store.put_voice(&p).unwrap();
        // The document lands inside the voices dir, under a squashed name.
        assert!(dir.path().join("voices/___escape_attempt.json").exists());
        assert_eq!(store.get_voice("../escape attempt").unwrap(), Some(p));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let p = profile("v");
        store.put_voice(&p).unwrap();
        assert_eq!(store.get_voice("v").unwrap(), Some(p));
        assert!(store.delete_voice("v").unwrap());
    }
}
