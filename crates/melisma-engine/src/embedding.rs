//! Per-voice embedding model: a small autoencoder with a voice-feature
//! predictor head.
//!
//! The architecture is deliberately modest (this is not a production
//! voice-cloning system): encoder 65 -> 512 -> 384 -> 64, predictor
//! 64 -> 128 -> 64 -> 32, decoder mirroring the encoder. Training minimizes
//! reconstruction MSE plus a voice-feature MSE against a target derived
//! from the batch mean, with Adam and train-time dropout. All weights,
//! dropout masks, and initialization come from the voice-seeded PCG32, so
//! retraining the same voice on the same files reproduces the same model.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use melisma_dsp::features::FEATURE_DIM;
use melisma_dsp::rng::{create_component_rng, voice_seed};
use melisma_voice::VoiceCharacteristics;

use crate::error::{EngineError, EngineResult};

/// Input feature dimension (aggregate MFCC + mel + chroma vector).
pub const INPUT_DIM: usize = FEATURE_DIM;
/// Learned embedding dimension.
pub const EMBEDDING_DIM: usize = 64;
/// Predictor head output dimension.
pub const VOICE_VECTOR_DIM: usize = 32;

const EPOCHS: usize = 50;
/// Progress callback cadence, in epochs; also the cancellation granularity.
const EPOCH_GROUP: usize = 5;
const LEARNING_RATE: f64 = 1e-3;
const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;
const DROPOUT_P: f64 = 0.2;
const PREDICTOR_LOSS_WEIGHT: f64 = 0.5;
const MAX_BATCH: usize = 4;

/// Validation summary computed after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationScores {
    /// 1 minus the mean absolute reconstruction error, floored at 0.
    pub reconstruction_accuracy: f64,
    /// Mean pairwise cosine similarity of the training embeddings.
    pub voice_consistency: f64,
    /// Scaled variance of the embeddings across files.
    pub embedding_quality: f64,
    /// 0.4 / 0.4 / 0.2 blend of the above, in [0, 1].
    pub overall_score: f64,
}

impl ValidationScores {
    fn combine(reconstruction: f64, consistency: f64, quality: f64) -> Self {
        let overall =
            (0.4 * reconstruction + 0.4 * consistency + 0.2 * quality).clamp(0.0, 1.0);
        Self {
            reconstruction_accuracy: reconstruction,
            voice_consistency: consistency,
            embedding_quality: quality,
            overall_score: overall,
        }
    }
}

/// One fully-connected layer, weights stored (out, in).
#[derive(Debug, Clone)]
struct Dense {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Dense {
    /// Xavier-uniform initialization.
    fn init(out_dim: usize, in_dim: usize, rng: &mut Pcg32) -> Self {
        let limit = (6.0 / (in_dim + out_dim) as f64).sqrt();
        let weights = Array2::from_shape_fn((out_dim, in_dim), |_| {
            (rng.gen::<f64>() * 2.0 - 1.0) * limit
        });
        Self {
            weights,
            bias: Array1::zeros(out_dim),
        }
    }
}

/// A stack of dense layers with ReLU on every hidden layer and a linear
/// output layer.
#[derive(Debug, Clone)]
struct Mlp {
    layers: Vec<Dense>,
}

/// Forward caches needed by backprop: pre-activations, post-activations
/// (index 0 is the input), and the dropout masks applied to hidden layers.
struct ForwardCache {
    zs: Vec<Array1<f64>>,
    activations: Vec<Array1<f64>>,
    masks: Vec<Option<Array1<f64>>>,
}

/// Per-layer gradient accumulator.
struct Grads {
    dw: Vec<Array2<f64>>,
    db: Vec<Array1<f64>>,
}

impl Mlp {
    fn new(dims: &[usize], rng: &mut Pcg32) -> Self {
        let layers = dims
            .windows(2)
            .map(|pair| Dense::init(pair[1], pair[0], rng))
            .collect();
        Self { layers }
    }

    fn zero_grads(&self) -> Grads {
        Grads {
            dw: self
                .layers
                .iter()
                .map(|l| Array2::zeros(l.weights.raw_dim()))
                .collect(),
            db: self
                .layers
                .iter()
                .map(|l| Array1::zeros(l.bias.raw_dim()))
                .collect(),
        }
    }

    /// Inference forward pass (no dropout).
    fn infer(&self, input: &Array1<f64>) -> Array1<f64> {
        let mut activation = input.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = layer.weights.dot(&activation) + &layer.bias;
            if i + 1 < self.layers.len() {
                z.mapv_inplace(|v| v.max(0.0));
            }
            activation = z;
        }
        activation
    }

    /// Training forward pass; hidden activations get inverted dropout when
    /// `dropout_p > 0`.
    fn forward_train(
        &self,
        input: &Array1<f64>,
        dropout_p: f64,
        rng: &mut Pcg32,
    ) -> ForwardCache {
        let mut zs = Vec::with_capacity(self.layers.len());
        let mut activations = vec![input.clone()];
        let mut masks = Vec::with_capacity(self.layers.len());

        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.weights.dot(activations.last().unwrap()) + &layer.bias;
            zs.push(z.clone());

            let is_hidden = i + 1 < self.layers.len();
            let mut a = if is_hidden {
                z.mapv(|v| v.max(0.0))
            } else {
                z
            };

            let mask = if is_hidden && dropout_p > 0.0 {
                let keep = 1.0 - dropout_p;
                let mask = Array1::from_shape_fn(a.len(), |_| {
                    if rng.gen::<f64>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                });
                a = &a * &mask;
                Some(mask)
            } else {
                None
            };
            masks.push(mask);
            activations.push(a);
        }

        ForwardCache {
            zs,
            activations,
            masks,
        }
    }

    /// Backprop from an output gradient; accumulates into `grads` and
    /// returns the gradient with respect to the input.
    fn backward(
        &self,
        cache: &ForwardCache,
        output_grad: &Array1<f64>,
        grads: &mut Grads,
    ) -> Array1<f64> {
        let mut delta = output_grad.clone();

        for i in (0..self.layers.len()).rev() {
            let input_activation = &cache.activations[i];
            let outer = delta
                .view()
                .insert_axis(Axis(1))
                .dot(&input_activation.view().insert_axis(Axis(0)));
            grads.dw[i] += &outer;
            grads.db[i] += &delta;

            if i > 0 {
                let mut upstream = self.layers[i].weights.t().dot(&delta);
                // Through the previous layer's dropout, then its ReLU
                if let Some(mask) = &cache.masks[i - 1] {
                    upstream = &upstream * mask;
                }
                let z_prev = &cache.zs[i - 1];
                delta = Array1::from_shape_fn(upstream.len(), |j| {
                    if z_prev[j] > 0.0 {
                        upstream[j]
                    } else {
                        0.0
                    }
                });
            } else {
                delta = self.layers[i].weights.t().dot(&delta);
            }
        }

        delta
    }
}

/// Adam optimizer state for one MLP.
struct Adam {
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
}

impl Adam {
    fn new(mlp: &Mlp) -> Self {
        Self {
            m_w: mlp
                .layers
                .iter()
                .map(|l| Array2::zeros(l.weights.raw_dim()))
                .collect(),
            v_w: mlp
                .layers
                .iter()
                .map(|l| Array2::zeros(l.weights.raw_dim()))
                .collect(),
            m_b: mlp
                .layers
                .iter()
                .map(|l| Array1::zeros(l.bias.raw_dim()))
                .collect(),
            v_b: mlp
                .layers
                .iter()
                .map(|l| Array1::zeros(l.bias.raw_dim()))
                .collect(),
        }
    }

    fn step(&mut self, mlp: &mut Mlp, grads: &Grads, t: usize) {
        let t = t as i32;
        let correction1 = 1.0 - ADAM_BETA1.powi(t);
        let correction2 = 1.0 - ADAM_BETA2.powi(t);

        for i in 0..mlp.layers.len() {
            self.m_w[i] = &self.m_w[i] * ADAM_BETA1 + &(&grads.dw[i] * (1.0 - ADAM_BETA1));
            self.v_w[i] =
                &self.v_w[i] * ADAM_BETA2 + &grads.dw[i].mapv(|g| g * g * (1.0 - ADAM_BETA2));
            self.m_b[i] = &self.m_b[i] * ADAM_BETA1 + &(&grads.db[i] * (1.0 - ADAM_BETA1));
            self.v_b[i] =
                &self.v_b[i] * ADAM_BETA2 + &grads.db[i].mapv(|g| g * g * (1.0 - ADAM_BETA2));

            let m_hat_w = &self.m_w[i] / correction1;
            let v_hat_w = &self.v_w[i] / correction2;
            let m_hat_b = &self.m_b[i] / correction1;
            let v_hat_b = &self.v_b[i] / correction2;

            let layer = &mut mlp.layers[i];
            layer.weights = &layer.weights
                - &(m_hat_w / (v_hat_w.mapv(f64::sqrt) + ADAM_EPS) * LEARNING_RATE);
            layer.bias =
                &layer.bias - &(m_hat_b / (v_hat_b.mapv(f64::sqrt) + ADAM_EPS) * LEARNING_RATE);
        }
    }
}

/// The trained networks plus the feature normalization captured from the
/// training set.
#[derive(Debug, Clone)]
pub struct EmbeddingModel {
    pub input_dim: usize,
    pub embedding_dim: usize,
    encoder: Mlp,
    predictor: Mlp,
    decoder: Mlp,
    feature_mean: Array1<f64>,
    feature_std: Array1<f64>,
}

impl EmbeddingModel {
    fn normalize(&self, features: &[f64]) -> Array1<f64> {
        let x = Array1::from_vec(features.to_vec());
        (&x - &self.feature_mean) / &self.feature_std
    }

    /// Embeds an aggregate feature vector.
    pub fn embed(&self, features: &[f64]) -> Array1<f64> {
        self.encoder.infer(&self.normalize(features))
    }

    /// Predicted voice-feature vector, [`VOICE_VECTOR_DIM`] long.
    pub fn predict_voice(&self, features: &[f64]) -> Vec<f64> {
        self.predictor.infer(&self.embed(features)).to_vec()
    }

    /// Reconstruction of a (normalized) input, for validation.
    fn reconstruct_normalized(&self, normalized: &Array1<f64>) -> Array1<f64> {
        self.decoder.infer(&self.encoder.infer(normalized))
    }
}

/// Voice-feature target for a batch: the normalized batch mean, compressed
/// to [`VOICE_VECTOR_DIM`] by averaging adjacent dimension pairs. Purely a
/// deterministic function of the data, so the predictor head learns a
/// stable per-voice summary.
fn voice_target(batch_mean: &Array1<f64>) -> Array1<f64> {
    Array1::from_shape_fn(VOICE_VECTOR_DIM, |i| {
        let a = batch_mean[(2 * i) % batch_mean.len()];
        let b = batch_mean[(2 * i + 1) % batch_mean.len()];
        (a + b) / 2.0
    })
}

/// Trains a voice embedding model.
///
/// `progress` is called after every [`EPOCH_GROUP`] epochs with the
/// completed fraction; returning false aborts training and yields
/// `Ok(None)` (cooperative cancellation, not an error). Errors are reserved
/// for unusable input.
pub fn train_embedding(
    voice_id: &str,
    feature_vectors: &[Vec<f64>],
    progress: &mut dyn FnMut(f64) -> bool,
) -> EngineResult<Option<(EmbeddingModel, ValidationScores)>> {
    if feature_vectors.is_empty() {
        return Err(EngineError::InsufficientTrainingData {
            reason: "no feature vectors to train on".into(),
        });
    }
    for (i, v) in feature_vectors.iter().enumerate() {
        if v.len() != INPUT_DIM {
            return Err(EngineError::InsufficientTrainingData {
                reason: format!("feature vector {i} has length {}, expected {INPUT_DIM}", v.len()),
            });
        }
    }

    let mut rng = create_component_rng(voice_seed(voice_id), "embedding-trainer");

    // Per-dimension standardization over the training set; a floor on the
    // std keeps constant dimensions from dividing by zero.
    let n = feature_vectors.len();
    let mut mean = Array1::<f64>::zeros(INPUT_DIM);
    for v in feature_vectors {
        mean += &Array1::from_vec(v.clone());
    }
    mean /= n as f64;
    let mut std = Array1::<f64>::zeros(INPUT_DIM);
    for v in feature_vectors {
        let d = &Array1::from_vec(v.clone()) - &mean;
        std += &d.mapv(|x| x * x);
    }
    std = (std / n as f64).mapv(|x| x.sqrt().max(1e-6));

    let inputs: Vec<Array1<f64>> = feature_vectors
        .iter()
        .map(|v| (&Array1::from_vec(v.clone()) - &mean) / &std)
        .collect();

    let mut encoder = Mlp::new(&[INPUT_DIM, 512, 384, EMBEDDING_DIM], &mut rng);
    let mut predictor = Mlp::new(&[EMBEDDING_DIM, 128, 64, VOICE_VECTOR_DIM], &mut rng);
    let mut decoder = Mlp::new(&[EMBEDDING_DIM, 384, 512, INPUT_DIM], &mut rng);

    let mut adam_encoder = Adam::new(&encoder);
    let mut adam_predictor = Adam::new(&predictor);
    let mut adam_decoder = Adam::new(&decoder);

    let batch_size = n.min(MAX_BATCH);
    let indices: Vec<usize> = (0..n).collect();
    let mut step = 0usize;

    for epoch in 0..EPOCHS {
        let mut epoch_loss = 0.0;

        for chunk in indices.chunks(batch_size) {
            let mut batch_mean = Array1::<f64>::zeros(INPUT_DIM);
            for &i in chunk {
                batch_mean += &inputs[i];
            }
            batch_mean /= chunk.len() as f64;
            let target = voice_target(&batch_mean);

            let mut grads_encoder = encoder.zero_grads();
            let mut grads_predictor = predictor.zero_grads();
            let mut grads_decoder = decoder.zero_grads();

            for &i in chunk {
                let x = &inputs[i];

                let enc_cache = encoder.forward_train(x, DROPOUT_P, &mut rng);
                let embedding = enc_cache.activations.last().unwrap().clone();
                let dec_cache = decoder.forward_train(&embedding, 0.0, &mut rng);
                let pred_cache = predictor.forward_train(&embedding, 0.0, &mut rng);

                let reconstruction = dec_cache.activations.last().unwrap();
                let prediction = pred_cache.activations.last().unwrap();

                let recon_err = reconstruction - x;
                let pred_err = prediction - &target;
                epoch_loss += recon_err.mapv(|e| e * e).mean().unwrap_or(0.0)
                    + PREDICTOR_LOSS_WEIGHT * pred_err.mapv(|e| e * e).mean().unwrap_or(0.0);

                let recon_grad = recon_err.mapv(|e| 2.0 * e / INPUT_DIM as f64);
                let pred_grad = pred_err
                    .mapv(|e| 2.0 * e * PREDICTOR_LOSS_WEIGHT / VOICE_VECTOR_DIM as f64);

                let embedding_grad = decoder.backward(&dec_cache, &recon_grad, &mut grads_decoder)
                    + predictor.backward(&pred_cache, &pred_grad, &mut grads_predictor);
                encoder.backward(&enc_cache, &embedding_grad, &mut grads_encoder);
            }

            let scale = 1.0 / chunk.len() as f64;
            for g in grads_encoder
                .dw
                .iter_mut()
                .chain(grads_decoder.dw.iter_mut())
                .chain(grads_predictor.dw.iter_mut())
            {
                *g *= scale;
            }
            for g in grads_encoder
                .db
                .iter_mut()
                .chain(grads_decoder.db.iter_mut())
                .chain(grads_predictor.db.iter_mut())
            {
                *g *= scale;
            }

            step += 1;
            adam_encoder.step(&mut encoder, &grads_encoder, step);
            adam_predictor.step(&mut predictor, &grads_predictor, step);
            adam_decoder.step(&mut decoder, &grads_decoder, step);
        }

        if (epoch + 1) % EPOCH_GROUP == 0 {
            debug!(voice_id, epoch, epoch_loss, "embedding training checkpoint");
            if !progress((epoch + 1) as f64 / EPOCHS as f64) {
                info!(voice_id, epoch, "embedding training cancelled");
                return Ok(None);
            }
        }
    }

    let model = EmbeddingModel {
        input_dim: INPUT_DIM,
        embedding_dim: EMBEDDING_DIM,
        encoder,
        predictor,
        decoder,
        feature_mean: mean,
        feature_std: std,
    };
    let validation = validate(&model, &inputs);
    info!(
        voice_id,
        overall = validation.overall_score,
        "embedding training complete"
    );
    Ok(Some((model, validation)))
}

/// Post-training validation over the (normalized) training inputs.
fn validate(model: &EmbeddingModel, inputs: &[Array1<f64>]) -> ValidationScores {
    let embeddings: Vec<Array1<f64>> =
        inputs.iter().map(|x| model.encoder.infer(x)).collect();

    // Reconstruction accuracy
    let mut total_abs_err = 0.0;
    let mut count = 0usize;
    for x in inputs {
        let reconstruction = model.reconstruct_normalized(x);
        total_abs_err += (&reconstruction - x).mapv(f64::abs).sum();
        count += x.len();
    }
    let reconstruction = (1.0 - total_abs_err / count.max(1) as f64).max(0.0);

    // Voice consistency: pairwise cosine similarity (1.0 for a single file)
    let consistency = if embeddings.len() < 2 {
        1.0
    } else {
        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..embeddings.len() {
            for j in (i + 1)..embeddings.len() {
                total += cosine_similarity(&embeddings[i], &embeddings[j]);
                pairs += 1;
            }
        }
        (total / pairs as f64).clamp(0.0, 1.0)
    };

    // Embedding quality: scaled mean per-dimension variance
    let quality = if embeddings.len() < 2 {
        0.0
    } else {
        let dim = embeddings[0].len();
        let mut mean = Array1::<f64>::zeros(dim);
        for e in &embeddings {
            mean += e;
        }
        mean /= embeddings.len() as f64;
        let mut variance = 0.0;
        for e in &embeddings {
            variance += (e - &mean).mapv(|d| d * d).mean().unwrap_or(0.0);
        }
        (variance / embeddings.len() as f64 * 10.0).clamp(0.0, 1.0)
    };

    ValidationScores::combine(reconstruction, consistency, quality)
}

fn cosine_similarity(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let dot = a.dot(b);
    let norm = a.dot(a).sqrt() * b.dot(b).sqrt();
    if norm > 0.0 {
        dot / norm
    } else {
        0.0
    }
}

/// Serialized layer weights, row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerData {
    pub rows: usize,
    pub cols: usize,
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl LayerData {
    fn from_dense(dense: &Dense) -> Self {
        let (rows, cols) = dense.weights.dim();
        Self {
            rows,
            cols,
            weights: dense.weights.iter().copied().collect(),
            bias: dense.bias.to_vec(),
        }
    }

    fn to_dense(&self) -> EngineResult<Dense> {
        let weights = Array2::from_shape_vec((self.rows, self.cols), self.weights.clone())
            .map_err(|_| EngineError::Json(serde::de::Error::custom("bad weight shape")))?;
        if self.bias.len() != self.rows {
            return Err(EngineError::Json(serde::de::Error::custom(
                "bias length does not match rows",
            )));
        }
        Ok(Dense {
            weights,
            bias: Array1::from_vec(self.bias.clone()),
        })
    }
}

fn mlp_to_layers(mlp: &Mlp) -> Vec<LayerData> {
    mlp.layers.iter().map(LayerData::from_dense).collect()
}

fn layers_to_mlp(layers: &[LayerData]) -> EngineResult<Mlp> {
    Ok(Mlp {
        layers: layers
            .iter()
            .map(LayerData::to_dense)
            .collect::<EngineResult<Vec<_>>>()?,
    })
}

/// The persisted model document for one voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub voice_id: String,
    pub input_dim: usize,
    pub embedding_dim: usize,
    pub encoder: Vec<LayerData>,
    pub predictor: Vec<LayerData>,
    pub decoder: Vec<LayerData>,
    pub feature_mean: Vec<f64>,
    pub feature_std: Vec<f64>,
    pub validation: ValidationScores,
    pub training_files: Vec<String>,
    pub characteristics: VoiceCharacteristics,
}

impl ModelFile {
    pub fn from_model(
        voice_id: &str,
        model: &EmbeddingModel,
        validation: ValidationScores,
        training_files: Vec<String>,
        characteristics: VoiceCharacteristics,
    ) -> Self {
        Self {
            voice_id: voice_id.to_string(),
            input_dim: model.input_dim,
            embedding_dim: model.embedding_dim,
            encoder: mlp_to_layers(&model.encoder),
            predictor: mlp_to_layers(&model.predictor),
            decoder: mlp_to_layers(&model.decoder),
            feature_mean: model.feature_mean.to_vec(),
            feature_std: model.feature_std.to_vec(),
            validation,
            training_files,
            characteristics,
        }
    }

    /// Atomic save (temp file + rename).
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string(self)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let temp = tempfile::NamedTempFile::new_in(dir)?;
        fs::write(temp.path(), json.as_bytes())?;
        temp.persist(path)
            .map_err(|e| EngineError::Persistence {
                context: "model file".into(),
                source: e.error,
            })?;
        Ok(())
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Rehydrates the runtime model, validating dimensions.
    pub fn to_model(&self) -> EngineResult<EmbeddingModel> {
        if self.feature_mean.len() != self.input_dim || self.feature_std.len() != self.input_dim {
            return Err(EngineError::Json(serde::de::Error::custom(
                "normalization vectors do not match input dim",
            )));
        }
        Ok(EmbeddingModel {
            input_dim: self.input_dim,
            embedding_dim: self.embedding_dim,
            encoder: layers_to_mlp(&self.encoder)?,
            predictor: layers_to_mlp(&self.predictor)?,
            decoder: layers_to_mlp(&self.decoder)?,
            feature_mean: Array1::from_vec(self.feature_mean.clone()),
            feature_std: Array1::from_vec(self.feature_std.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Small deterministic synthetic dataset around a voice-like mean.
    fn dataset(files: usize) -> Vec<Vec<f64>> {
        (0..files)
            .map(|f| {
                (0..INPUT_DIM)
                    .map(|d| ((d as f64 * 0.37 + f as f64 * 1.3).sin() + 1.5) * 0.5)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_training_on_one_file_scores_in_range() {
        let (model, validation) = train_embedding("voice-a", &dataset(1), &mut |_| true)
            .unwrap()
            .unwrap();
        assert!((0.0..=1.0).contains(&validation.overall_score));
        assert_eq!(validation.voice_consistency, 1.0);
        assert_eq!(validation.embedding_quality, 0.0);
        assert_eq!(model.embed(&dataset(1)[0]).len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_training_on_several_files() {
        let data = dataset(5);
        let (model, validation) = train_embedding("voice-b", &data, &mut |_| true)
            .unwrap()
            .unwrap();
        assert!((0.0..=1.0).contains(&validation.overall_score));
        assert!((0.0..=1.0).contains(&validation.voice_consistency));
        assert!((0.0..=1.0).contains(&validation.embedding_quality));

        let voice_vector = model.predict_voice(&data[0]);
        assert_eq!(voice_vector.len(), VOICE_VECTOR_DIM);
        assert!(voice_vector.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_training_is_deterministic_per_voice() {
        let data = dataset(2);
        let (a, _) = train_embedding("same-voice", &data, &mut |_| true)
            .unwrap()
            .unwrap();
        let (b, _) = train_embedding("same-voice", &data, &mut |_| true)
            .unwrap()
            .unwrap();
        assert_eq!(a.embed(&data[0]), b.embed(&data[0]));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            train_embedding("v", &[], &mut |_| true),
            Err(EngineError::InsufficientTrainingData { .. })
        ));
    }

    #[test]
    fn test_wrong_dimension_is_rejected() {
        assert!(matches!(
            train_embedding("v", &[vec![1.0; 7]], &mut |_| true),
            Err(EngineError::InsufficientTrainingData { .. })
        ));
    }

    #[test]
    fn test_cancellation_mid_training() {
        let mut calls = 0;
        let outcome = train_embedding("v", &dataset(2), &mut |_| {
            calls += 1;
            calls < 3
        })
        .unwrap();
        assert!(outcome.is_none());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_progress_fractions_are_increasing() {
        let mut seen = Vec::new();
        train_embedding("v", &dataset(1), &mut |fraction| {
            seen.push(fraction);
            true
        })
        .unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!((seen.last().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_model_file_round_trip() {
        let data = dataset(2);
        let (model, validation) = train_embedding("voice-rt", &data, &mut |_| true)
            .unwrap()
            .unwrap();

        let file = ModelFile::from_model(
            "voice-rt",
            &model,
            validation.clone(),
            vec!["take1.wav".into()],
            VoiceCharacteristics::default(),
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice-rt.json");
        file.save(&path).unwrap();

        let loaded = ModelFile::load(&path).unwrap();
        assert_eq!(loaded.validation, validation);
        assert_eq!(loaded.input_dim, INPUT_DIM);

        let restored = loaded.to_model().unwrap();
        assert_eq!(restored.embed(&data[0]), model.embed(&data[0]));
        assert_eq!(restored.predict_voice(&data[1]), model.predict_voice(&data[1]));
    }

    #[test]
    fn test_corrupt_model_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(ModelFile::load(&path).is_err());
    }

    #[test]
    fn test_voice_target_is_compressed_mean() {
        let mean = Array1::from_vec((0..INPUT_DIM).map(|i| i as f64).collect());
        let target = voice_target(&mean);
        assert_eq!(target.len(), VOICE_VECTOR_DIM);
        assert_eq!(target[0], 0.5);
        assert_eq!(target[1], 2.5);
    }
}
