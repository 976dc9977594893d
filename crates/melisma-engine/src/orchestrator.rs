//! Tiered synthesis orchestration.
//!
//! Rendering walks a fixed fallback chain: neural conversion, then real
//! sample pitch shifting, then parametric synthesis. Each attempt gets a
//! fresh buffer; a tier that errors or produces unusable audio (empty,
//! silent, or non-finite) just moves the chain along. Only the final
//! parametric tier failing is an error for the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use melisma_voice::{SyllableSegment, VoiceProfile};

/// Which tier produced (or is producing) audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierKind {
    NeuralConversion,
    RealSamplePitchShift,
    ParametricSynthesis,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TierKind::NeuralConversion => "neural-conversion",
            TierKind::RealSamplePitchShift => "real-sample-pitch-shift",
            TierKind::ParametricSynthesis => "parametric-synthesis",
        })
    }
}

/// A tier-level failure. Carries only a human-readable reason; the chain
/// decides what happens next.
#[derive(Debug, Clone)]
pub struct TierError(pub String);

impl fmt::Display for TierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TierError {}

/// Everything a tier needs to render one phrase.
pub struct SynthesisPlan {
    pub voice: VoiceProfile,
    pub segments: Vec<SyllableSegment>,
    pub sample_rate: f64,
    pub total_samples: usize,
    /// Deterministic seed for the whole render.
    pub seed: u32,
}

/// One synthesis strategy.
pub trait SynthesisTier: Send + Sync {
    fn kind(&self) -> TierKind;
    fn render(&self, plan: &SynthesisPlan) -> Result<Vec<f64>, TierError>;
}

/// Explicit progress through the fallback chain.
enum ChainState {
    NotAttempted,
    TryingNeuralConversion,
    TryingRealSamplePitchShift,
    TryingParametricSynthesis,
    Succeeded(Vec<f64>, TierKind),
    Failed(String),
}

/// The fallback chain. Upper tiers are optional (a builtin voice has no
/// model and no samples); the parametric tier is always present.
pub struct TierChain {
    neural: Option<Box<dyn SynthesisTier>>,
    samples: Option<Box<dyn SynthesisTier>>,
    parametric: Box<dyn SynthesisTier>,
}

impl TierChain {
    pub fn new(
        neural: Option<Box<dyn SynthesisTier>>,
        samples: Option<Box<dyn SynthesisTier>>,
        parametric: Box<dyn SynthesisTier>,
    ) -> Self {
        Self {
            neural,
            samples,
            parametric,
        }
    }

    /// Walks the chain until a tier yields usable audio.
    pub fn render(&self, plan: &SynthesisPlan) -> Result<(Vec<f64>, TierKind), TierError> {
        let mut state = ChainState::NotAttempted;

        loop {
            state = match state {
                ChainState::NotAttempted => ChainState::TryingNeuralConversion,

                ChainState::TryingNeuralConversion => {
                    match self.attempt(self.neural.as_deref(), plan) {
                        Some(Ok(samples)) => {
                            ChainState::Succeeded(samples, TierKind::NeuralConversion)
                        }
                        Some(Err(err)) => {
                            warn!(tier = %TierKind::NeuralConversion, reason = %err, "tier failed, falling back");
                            ChainState::TryingRealSamplePitchShift
                        }
                        None => {
                            debug!(tier = %TierKind::NeuralConversion, "tier unavailable");
                            ChainState::TryingRealSamplePitchShift
                        }
                    }
                }

                ChainState::TryingRealSamplePitchShift => {
                    match self.attempt(self.samples.as_deref(), plan) {
                        Some(Ok(samples)) => {
                            ChainState::Succeeded(samples, TierKind::RealSamplePitchShift)
                        }
                        Some(Err(err)) => {
                            warn!(tier = %TierKind::RealSamplePitchShift, reason = %err, "tier failed, falling back");
                            ChainState::TryingParametricSynthesis
                        }
                        None => {
                            debug!(tier = %TierKind::RealSamplePitchShift, "tier unavailable");
                            ChainState::TryingParametricSynthesis
                        }
                    }
                }

                ChainState::TryingParametricSynthesis => {
                    match self.attempt(Some(self.parametric.as_ref()), plan) {
                        Some(Ok(samples)) => {
                            ChainState::Succeeded(samples, TierKind::ParametricSynthesis)
                        }
                        Some(Err(err)) => ChainState::Failed(err.0),
                        None => unreachable!("parametric tier is always present"),
                    }
                }

                ChainState::Succeeded(samples, tier) => {
                    debug!(%tier, "tier produced usable audio");
                    return Ok((samples, tier));
                }

                ChainState::Failed(reason) => {
                    warn!(reason = %reason, "every synthesis tier failed");
                    return Err(TierError(reason));
                }
            };
        }
    }

    /// Runs one tier if present, checking its output for usability.
    fn attempt(
        &self,
        tier: Option<&dyn SynthesisTier>,
        plan: &SynthesisPlan,
    ) -> Option<Result<Vec<f64>, TierError>> {
        let tier = tier?;
        Some(tier.render(plan).and_then(|samples| {
            if let Err(reason) = usable(&samples) {
                Err(TierError(format!("{} produced {reason}", tier.kind())))
            } else {
                Ok(samples)
            }
        }))
    }
}

/// A buffer is usable when it is non-empty, contains signal, and every
/// sample is finite.
fn usable(samples: &[f64]) -> Result<(), &'static str> {
    if samples.is_empty() {
        return Err("an empty buffer");
    }
    if samples.iter().any(|s| !s.is_finite()) {
        return Err("non-finite samples");
    }
    if samples.iter().all(|s| *s == 0.0) {
        return Err("pure silence");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use melisma_voice::{VoiceCharacteristics, VoiceProfile};
    use pretty_assertions::assert_eq;

    struct FixedTier {
        kind: TierKind,
        output: Result<Vec<f64>, String>,
    }

    impl SynthesisTier for FixedTier {
        fn kind(&self) -> TierKind {
            self.kind
        }
        fn render(&self, _plan: &SynthesisPlan) -> Result<Vec<f64>, TierError> {
            self.output.clone().map_err(TierError)
        }
    }

    fn ok_tier(kind: TierKind) -> Box<dyn SynthesisTier> {
        Box::new(FixedTier {
            kind,
            output: Ok(vec![0.1, -0.2, 0.3]),
        })
    }

    fn failing_tier(kind: TierKind, reason: &str) -> Box<dyn SynthesisTier> {
        Box::new(FixedTier {
            kind,
            output: Err(reason.to_string()),
        })
    }

    fn silent_tier(kind: TierKind) -> Box<dyn SynthesisTier> {
        Box::new(FixedTier {
            kind,
            output: Ok(vec![0.0; 64]),
        })
    }

    fn plan() -> SynthesisPlan {
        SynthesisPlan {
            voice: VoiceProfile::builtin("default", "Default", VoiceCharacteristics::default()),
            segments: Vec::new(),
            sample_rate: 22_050.0,
            total_samples: 3,
            seed: 7,
        }
    }

    #[test]
    fn test_first_tier_wins_when_usable() {
        let chain = TierChain::new(
            Some(ok_tier(TierKind::NeuralConversion)),
            Some(ok_tier(TierKind::RealSamplePitchShift)),
            ok_tier(TierKind::ParametricSynthesis),
        );
        let (_, tier) = chain.render(&plan()).unwrap();
        assert_eq!(tier, TierKind::NeuralConversion);
    }

    #[test]
    fn test_missing_tiers_are_skipped() {
        let chain = TierChain::new(None, None, ok_tier(TierKind::ParametricSynthesis));
        let (samples, tier) = chain.render(&plan()).unwrap();
        assert_eq!(tier, TierKind::ParametricSynthesis);
        assert_eq!(samples, vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_erroring_tier_falls_through() {
        let chain = TierChain::new(
            Some(failing_tier(TierKind::NeuralConversion, "no model")),
            Some(ok_tier(TierKind::RealSamplePitchShift)),
            ok_tier(TierKind::ParametricSynthesis),
        );
        let (_, tier) = chain.render(&plan()).unwrap();
        assert_eq!(tier, TierKind::RealSamplePitchShift);
    }

    #[test]
    fn test_silent_output_counts_as_failure() {
        let chain = TierChain::new(
            Some(silent_tier(TierKind::NeuralConversion)),
            Some(silent_tier(TierKind::RealSamplePitchShift)),
            ok_tier(TierKind::ParametricSynthesis),
        );
        let (_, tier) = chain.render(&plan()).unwrap();
        assert_eq!(tier, TierKind::ParametricSynthesis);
    }

    #[test]
    fn test_non_finite_output_counts_as_failure() {
        let chain = TierChain::new(
            Some(Box::new(FixedTier {
                kind: TierKind::NeuralConversion,
                output: Ok(vec![f64::NAN; 16]),
            })),
            None,
            ok_tier(TierKind::ParametricSynthesis),
        );
        let (_, tier) = chain.render(&plan()).unwrap();
        assert_eq!(tier, TierKind::ParametricSynthesis);
    }

    #[test]
    fn test_final_tier_failure_surfaces_its_reason() {
        let chain = TierChain::new(
            None,
            None,
            failing_tier(TierKind::ParametricSynthesis, "oscillator bank on fire"),
        );
        let err = chain.render(&plan()).unwrap_err();
        assert!(err.to_string().contains("oscillator bank on fire"));
    }

    #[test]
    fn test_usable_checks() {
        assert!(usable(&[]).is_err());
        assert!(usable(&[0.0, 0.0]).is_err());
        assert!(usable(&[0.1, f64::INFINITY]).is_err());
        assert!(usable(&[0.0, 0.1]).is_ok());
    }
}
