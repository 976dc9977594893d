//! The engine facade: one struct tying together registry, tier chain, and
//! training runner.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::Serialize;
use tracing::{debug, info};

use melisma_dsp::mixer::{peak_normalize, TARGET_PEAK};
use melisma_dsp::rng::{derive_component_seed, voice_seed};
use melisma_dsp::wav::WavResult;
use melisma_dsp::{CONVERSION_SAMPLE_RATE, PARAMETRIC_SAMPLE_RATE};
use melisma_voice::{
    extract_syllables, frequency_or_default, plan_segments, SingingRequest, SyllableSegment,
    TrainingJob, VoiceProfile,
};

use crate::error::{EngineError, EngineResult};
use crate::jobs::{ProgressEvent, TrainingRunner};
use crate::orchestrator::{SynthesisPlan, SynthesisTier, TierChain, TierKind};
use crate::registry::VoiceRegistry;
use crate::store::{JobStore, JsonFileStore, VoiceStore};
use crate::tiers::samples::SLICES_DIR;
use crate::tiers::{NeuralTier, ParametricTier, SampleTier};

/// Default-note arc span, in semitones above the voice's fundamental.
const DEFAULT_ARC_SEMITONES: f64 = 3.0;

/// Where the engine keeps everything it persists.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for the registry, models, copied samples, and jobs.
    pub data_root: PathBuf,
}

impl EngineConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }
}

/// One finished synthesis: raw samples plus the encoded WAV and metadata.
pub struct RenderedSong {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub wav: WavResult,
    /// Which tier actually produced the audio.
    pub tier: TierKind,
    pub segments: Vec<SyllableSegment>,
}

/// A started training job, as returned by [`SingingEngine::train_voice`].
#[derive(Debug, Clone, Serialize)]
pub struct JobHandle {
    pub job_id: String,
}

pub struct SingingEngine {
    registry: Arc<VoiceRegistry>,
    job_store: Arc<dyn JobStore>,
    runner: TrainingRunner,
    progress_rx: Receiver<ProgressEvent>,
}

impl SingingEngine {
    /// Opens (or creates) an engine rooted at `config.data_root`.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let store = Arc::new(JsonFileStore::open(config.data_root.join("registry"))?);
        Self::with_stores(
            store.clone(),
            store,
            config.data_root.join("models"),
            config.data_root.join("samples"),
        )
    }

    /// Wires the engine onto injected stores; tests use [`MemoryStore`].
    ///
    /// [`MemoryStore`]: crate::store::MemoryStore
    pub fn with_stores(
        voice_store: Arc<dyn VoiceStore>,
        job_store: Arc<dyn JobStore>,
        models_root: impl Into<PathBuf>,
        samples_root: impl Into<PathBuf>,
    ) -> EngineResult<Self> {
        let registry = Arc::new(VoiceRegistry::new(voice_store, models_root, samples_root)?);
        let (runner, progress_rx) = TrainingRunner::new(job_store.clone(), registry.clone());
        Ok(Self {
            registry,
            job_store,
            runner,
            progress_rx,
        })
    }

    /// Renders a sung phrase for the request's voice.
    pub fn synthesize(&self, request: &SingingRequest) -> EngineResult<RenderedSong> {
        request.validate()?;
        let voice = self.registry.resolve(&request.voice_id)?;
        if let Some(chord) = &request.chord {
            debug!(chord, "chord context noted");
        }

        let syllable_count = extract_syllables(&request.text).len().max(1);
        let note_freqs: Vec<f64> = if request.notes.is_empty() {
            default_note_arc(voice.characteristics.fundamental_hz, syllable_count)
        } else {
            request
                .notes
                .iter()
                .map(|n| frequency_or_default(n))
                .collect()
        };

        let duration = request.resolved_duration(syllable_count);
        let segments = plan_segments(&request.text, &note_freqs, duration);

        let (chain, sample_rate) = self.chain_for(&voice);
        let plan = SynthesisPlan {
            segments: segments.clone(),
            voice,
            sample_rate: sample_rate as f64,
            total_samples: (duration * sample_rate as f64).round() as usize,
            seed: derive_component_seed(
                voice_seed(&request.voice_id),
                &format!("{}|{}", request.text, request.notes.join(",")),
            ),
        };

        let (mut samples, tier) = chain
            .render(&plan)
            .map_err(|err| EngineError::SynthesisFailed { detail: err.0 })?;
        peak_normalize(&mut samples, TARGET_PEAK);

        let wav = WavResult::from_mono(&samples, sample_rate);
        info!(
            voice_id = %request.voice_id,
            %tier,
            seconds = wav.duration_seconds(),
            "synthesized phrase"
        );
        Ok(RenderedSong {
            duration_seconds: wav.duration_seconds(),
            samples,
            sample_rate,
            wav,
            tier,
            segments,
        })
    }

    /// Builds the tier chain a voice is entitled to, and the rate to render
    /// at: voices with conversion assets run at the conversion rate.
    fn chain_for(&self, voice: &VoiceProfile) -> (TierChain, u32) {
        let neural: Option<Box<dyn SynthesisTier>> = voice
            .model_reference
            .as_ref()
            .filter(|path| path.exists())
            .map(|path| Box::new(NeuralTier::new(path)) as Box<dyn SynthesisTier>);

        let slices_dir = self
            .registry
            .voice_samples_dir(&voice.voice_id)
            .join(SLICES_DIR);
        let samples: Option<Box<dyn SynthesisTier>> = slices_dir
            .exists()
            .then(|| Box::new(SampleTier::new(&slices_dir)) as Box<dyn SynthesisTier>);

        let rate = if neural.is_some() || samples.is_some() {
            CONVERSION_SAMPLE_RATE
        } else {
            PARAMETRIC_SAMPLE_RATE
        };
        (TierChain::new(neural, samples, Box::new(ParametricTier)), rate)
    }

    /// Starts a background training job.
    pub fn train_voice(
        &self,
        voice_name: &str,
        input_files: Vec<PathBuf>,
    ) -> EngineResult<JobHandle> {
        let job_id = self.runner.start(voice_name, input_files)?;
        Ok(JobHandle { job_id })
    }

    /// Last persisted snapshot of a job; `None` for unknown ids.
    pub fn get_training_status(&self, job_id: &str) -> EngineResult<Option<TrainingJob>> {
        self.job_store.get_job(job_id)
    }

    /// All persisted job snapshots, newest first.
    pub fn list_jobs(&self) -> EngineResult<Vec<TrainingJob>> {
        let mut jobs = self.job_store.list_jobs()?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Requests cancellation; false for unknown or terminal jobs.
    pub fn cancel_training(&self, job_id: &str) -> EngineResult<bool> {
        self.runner.cancel(job_id)
    }

    /// Blocks until a job's worker thread has exited.
    pub fn wait_for_training(&self, job_id: &str) {
        self.runner.wait(job_id);
    }

    /// Live feed of job progress events (advisory, lossy under backpressure).
    pub fn progress_events(&self) -> &Receiver<ProgressEvent> {
        &self.progress_rx
    }

    pub fn list_voices(&self) -> EngineResult<Vec<VoiceProfile>> {
        self.registry.list()
    }

    pub fn delete_voice(&self, voice_id: &str) -> EngineResult<bool> {
        self.registry.delete(voice_id)
    }
}

/// Default melody when no notes are given: a smooth arc from the voice's
/// fundamental up [`DEFAULT_ARC_SEMITONES`] and back, one note per syllable.
fn default_note_arc(fundamental_hz: f64, count: usize) -> Vec<f64> {
    let fundamental = if fundamental_hz > 0.0 {
        fundamental_hz
    } else {
        melisma_voice::DEFAULT_NOTE_HZ
    };
    (0..count)
        .map(|i| {
            let t = if count > 1 {
                i as f64 / (count - 1) as f64
            } else {
                0.0
            };
            let semitones = DEFAULT_ARC_SEMITONES * (std::f64::consts::PI * t).sin();
            fundamental * 2.0_f64.powf(semitones / 12.0)
        })
        .collect()
}
