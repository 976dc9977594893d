//! Background voice training.
//!
//! Each job runs on its own named thread and walks a fixed checkpoint
//! sequence: ingest samples, analyze per file, aggregate, train the
//! embedding, slice the recordings for the sample tier, install the voice.
//! The job snapshot is persisted after every status or progress mutation,
//! so a crash mid-job leaves an accurate record. Cancellation is
//! cooperative: a shared flag checked at every checkpoint (and between
//! training epoch groups); a cancelled job cleans up its files and never
//! installs a voice.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use melisma_dsp::features::f0_track;
use melisma_dsp::wav::WavResult;
use melisma_dsp::CONVERSION_SAMPLE_RATE;
use melisma_voice::{JobStatus, TrainingJob, VoiceCharacteristics, VoiceProfile};

use crate::analyzer::{analyze_recording, AnalyzedRecording};
use crate::embedding::{train_embedding, ModelFile};
use crate::error::{EngineError, EngineResult};
use crate::registry::VoiceRegistry;
use crate::store::JobStore;
use crate::tiers::samples::{write_manifest, SliceEntry, SLICES_DIR};

/// Capacity of the progress event channel. Events are advisory; when a
/// slow consumer fills the buffer, new events are dropped.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Slices shorter than this are discarded.
const MIN_SLICE_SECONDS: f64 = 0.5;
/// Target slice length when cutting recordings.
const SLICE_SECONDS: f64 = 2.0;

/// A progress notification emitted on every persisted job mutation.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
}

/// Spawns and tracks training jobs.
pub struct TrainingRunner {
    job_store: Arc<dyn JobStore>,
    registry: Arc<VoiceRegistry>,
    progress_tx: Sender<ProgressEvent>,
    cancel_flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TrainingRunner {
    /// Creates a runner plus the receiving end of its progress feed.
    pub fn new(
        job_store: Arc<dyn JobStore>,
        registry: Arc<VoiceRegistry>,
    ) -> (Self, Receiver<ProgressEvent>) {
        let (progress_tx, progress_rx) = bounded(PROGRESS_CHANNEL_CAPACITY);
        (
            Self {
                job_store,
                registry,
                progress_tx,
                cancel_flags: Mutex::new(HashMap::new()),
                handles: Mutex::new(HashMap::new()),
            },
            progress_rx,
        )
    }

    /// Starts training a new voice; returns the job id immediately.
    pub fn start(&self, voice_name: &str, input_files: Vec<PathBuf>) -> EngineResult<String> {
        if voice_name.trim().is_empty() {
            return Err(EngineError::InsufficientTrainingData {
                reason: "voice name is empty".into(),
            });
        }
        if input_files.is_empty() {
            return Err(EngineError::InsufficientTrainingData {
                reason: "no input files given".into(),
            });
        }

        let job_id = derive_job_id(voice_name, &input_files);
        let voice_id = derive_voice_id(voice_name, &job_id);

        let job = TrainingJob::pending(&job_id, voice_name, input_files);
        self.job_store.put_job(&job)?;

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flags
            .lock()
            .insert(job_id.clone(), cancel.clone());

        let worker = Worker {
            job_store: self.job_store.clone(),
            registry: self.registry.clone(),
            progress_tx: self.progress_tx.clone(),
            cancel,
            voice_id,
        };
        let thread_job = job.clone();
        let handle = thread::Builder::new()
            .name(format!("melisma-train-{job_id}"))
            .spawn(move || worker.run(thread_job))?;
        self.handles.lock().insert(job_id.clone(), handle);

        info!(job_id, voice_name, "training job started");
        Ok(job_id)
    }

    /// Requests cancellation. Returns false for unknown or already
    /// terminal jobs.
    pub fn cancel(&self, job_id: &str) -> EngineResult<bool> {
        let Some(job) = self.job_store.get_job(job_id)? else {
            return Ok(false);
        };
        if job.is_terminal() {
            return Ok(false);
        }

        if let Some(flag) = self.cancel_flags.lock().get(job_id) {
            flag.store(true, Ordering::SeqCst);
            info!(job_id, "cancellation requested");
            return Ok(true);
        }

        // Non-terminal snapshot with no live worker: a previous process
        // died mid-job. Settle the record directly.
        let mut stale = job;
        stale.cancel();
        self.job_store.put_job(&stale)?;
        warn!(job_id, "cancelled stale job with no running worker");
        Ok(true)
    }

    /// Blocks until the job's worker thread exits. No-op for unknown ids.
    pub fn wait(&self, job_id: &str) {
        let handle = self.handles.lock().remove(job_id);
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn derive_job_id(voice_name: &str, input_files: &[PathBuf]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(voice_name.as_bytes());
    for file in input_files {
        hasher.update(file.to_string_lossy().as_bytes());
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    hasher.update(&nanos.to_le_bytes());
    format!("job-{}", &hasher.finalize().to_hex().as_str()[..12])
}

fn derive_voice_id(voice_name: &str, job_id: &str) -> String {
    let slug: String = voice_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    let suffix = blake3::hash(job_id.as_bytes()).to_hex();
    format!("{}-{}", slug, &suffix.as_str()[..8])
}

/// State carried by one training thread.
struct Worker {
    job_store: Arc<dyn JobStore>,
    registry: Arc<VoiceRegistry>,
    progress_tx: Sender<ProgressEvent>,
    cancel: Arc<AtomicBool>,
    voice_id: String,
}

impl Worker {
    fn run(self, mut job: TrainingJob) {
        match self.run_inner(&mut job) {
            Ok(true) => {}
            Ok(false) => {
                self.cleanup_files();
                job.cancel();
                self.persist(&job);
                info!(job_id = %job.job_id, "training job cancelled");
            }
            Err(err) => {
                self.cleanup_files();
                job.fail(err.to_string());
                self.persist(&job);
                warn!(job_id = %job.job_id, error = %err, "training job failed");
            }
        }
    }

    /// Ok(true) = completed, Ok(false) = cancelled.
    fn run_inner(&self, job: &mut TrainingJob) -> EngineResult<bool> {
        job.mark_processing();
        job.advance_progress(5);
        self.persist(job);
        if self.cancelled() {
            return Ok(false);
        }

        // Ingest: copy every input into the voice's sample directory
        let samples_dir = self.registry.voice_samples_dir(&self.voice_id);
        fs::create_dir_all(&samples_dir)?;
        let mut copied = Vec::with_capacity(job.input_files.len());
        for (i, input) in job.input_files.iter().enumerate() {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("input-{i}.wav"));
            let dest = samples_dir.join(format!("{i:03}-{name}"));
            fs::copy(input, &dest)?;
            copied.push(dest);
        }
        job.advance_progress(30);
        self.persist(job);
        if self.cancelled() {
            return Ok(false);
        }

        // Per-file analysis, 30 -> 50
        let mut ingested: Vec<(PathBuf, AnalyzedRecording)> = Vec::new();
        for (i, path) in copied.iter().enumerate() {
            match analyze_recording(path) {
                Ok(analysis) => ingested.push((path.clone(), analysis)),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unusable training file");
                }
            }
            job.advance_progress(30 + ((i + 1) * 20 / copied.len()) as u8);
            self.persist(job);
            if self.cancelled() {
                return Ok(false);
            }
        }
        if ingested.is_empty() {
            return Err(EngineError::InsufficientTrainingData {
                reason: format!("none of the {} input files were usable", copied.len()),
            });
        }

        // Aggregate characteristics
        let per_file: Vec<VoiceCharacteristics> = ingested
            .iter()
            .map(|(_, analysis)| analysis.characteristics.clone())
            .collect();
        let characteristics = VoiceCharacteristics::mean_of(&per_file);
        job.set_characteristics(characteristics.clone());
        job.advance_progress(55);
        self.persist(job);
        if self.cancelled() {
            return Ok(false);
        }

        // Embedding training, 60 -> 95
        let feature_vectors: Vec<Vec<f64>> = ingested
            .iter()
            .map(|(_, analysis)| analysis.features.clone())
            .collect();
        let mut snapshot = job.clone();
        let this = &*self;
        let outcome = train_embedding(&self.voice_id, &feature_vectors, &mut |fraction| {
            snapshot.advance_progress(60 + (fraction * 35.0) as u8);
            this.persist(&snapshot);
            !this.cancelled()
        })?;
        job.advance_progress(snapshot.progress);
        let Some((model, validation)) = outcome else {
            return Ok(false);
        };

        // Slice the recordings for the sample tier
        let slices_dir = samples_dir.join(SLICES_DIR);
        fs::create_dir_all(&slices_dir)?;
        let mut entries = Vec::new();
        for (_, analysis) in &ingested {
            slice_recording(&analysis.samples, &slices_dir, &mut entries)?;
        }
        write_manifest(&slices_dir, &entries)?;
        debug!(voice_id = %self.voice_id, slices = entries.len(), "wrote sample slices");
        if self.cancelled() {
            return Ok(false);
        }

        // Persist the model and install the voice
        let model_path = self.registry.model_path(&self.voice_id);
        let training_files: Vec<String> = ingested
            .iter()
            .map(|(path, _)| path.to_string_lossy().into_owned())
            .collect();
        ModelFile::from_model(
            &self.voice_id,
            &model,
            validation,
            training_files,
            characteristics.clone(),
        )
        .save(&model_path)?;

        let profile = VoiceProfile::custom(
            &self.voice_id,
            &job.voice_name,
            characteristics,
            Some(model_path),
            ingested.iter().map(|(path, _)| path.clone()).collect(),
        );
        self.registry.install_custom(&profile)?;

        job.complete(&self.voice_id);
        self.persist(job);
        info!(job_id = %job.job_id, voice_id = %self.voice_id, "training job completed");
        Ok(true)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Writes the snapshot and emits a progress event. A full progress
    /// buffer drops the event; a failing store is logged, since there is
    /// nobody on this thread to hand the error to.
    fn persist(&self, job: &TrainingJob) {
        if let Err(err) = self.job_store.put_job(job) {
            warn!(job_id = %job.job_id, error = %err, "failed to persist job snapshot");
        }
        let event = ProgressEvent {
            job_id: job.job_id.clone(),
            status: job.status,
            progress: job.progress,
        };
        if let Err(TrySendError::Full(_)) = self.progress_tx.try_send(event) {
            debug!(job_id = %job.job_id, "progress buffer full, dropping event");
        }
    }

    fn cleanup_files(&self) {
        let samples_dir = self.registry.voice_samples_dir(&self.voice_id);
        if samples_dir.exists() {
            let _ = fs::remove_dir_all(&samples_dir);
        }
        let model_path = self.registry.model_path(&self.voice_id);
        if model_path.exists() {
            let _ = fs::remove_file(&model_path);
        }
    }
}

/// Cuts a recording into voiced slices and appends manifest entries.
///
/// Chunks come out at [`SLICE_SECONDS`]; a trailing remainder shorter than
/// [`MIN_SLICE_SECONDS`] is dropped, as is any chunk that is mostly
/// unvoiced.
fn slice_recording(
    samples: &[f64],
    slices_dir: &Path,
    entries: &mut Vec<SliceEntry>,
) -> EngineResult<()> {
    let rate = CONVERSION_SAMPLE_RATE as f64;
    let chunk_len = (SLICE_SECONDS * rate) as usize;
    let min_len = (MIN_SLICE_SECONDS * rate) as usize;

    for chunk in samples.chunks(chunk_len) {
        if chunk.len() < min_len {
            continue;
        }
        let track = f0_track(chunk, rate);
        let voiced: Vec<f64> = track.iter().filter_map(|f| *f).collect();
        if voiced.len() * 2 < track.len() {
            continue;
        }
        let mut sorted = voiced.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let base_hz = sorted[sorted.len() / 2];

        let file = format!("slice-{:03}.wav", entries.len());
        let wav = WavResult::from_mono(chunk, CONVERSION_SAMPLE_RATE);
        fs::write(slices_dir.join(&file), &wav.wav_data)?;
        entries.push(SliceEntry { file, base_hz });
    }
    Ok(())
}
